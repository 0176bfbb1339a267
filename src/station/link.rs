use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::config::LinkSettings;
use crate::transport::{Command, LINE_END};

/// Write half of the serial link. Commands are fire-and-forget; replies
/// arrive through the reader as free text.
pub struct SerialLink {
    writer: Box<dyn Write + Send>,
    name: String,
}

impl SerialLink {
    /// Open the configured device node read/write. Returns the link and a
    /// buffered reader over the same node for the background reader.
    pub fn open(settings: &LinkSettings) -> Result<(Self, BufReader<File>)> {
        let path = settings
            .device
            .as_deref()
            .ok_or_else(|| anyhow!("no serial device configured"))?;
        Self::open_path(path, settings)
    }

    pub fn open_path(path: &Path, settings: &LinkSettings) -> Result<(Self, BufReader<File>)> {
        settings.validate()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open serial device {}", path.display()))?;
        let read_half = file
            .try_clone()
            .with_context(|| format!("failed to clone handle for {}", path.display()))?;
        log::info!("connected to {} at {}", path.display(), settings.describe());
        let link = Self {
            writer: Box::new(file),
            name: path.display().to_string(),
        };
        Ok((link, BufReader::new(read_half)))
    }

    pub fn from_writer<W: Write + Send + 'static>(name: &str, writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one raw line, terminated with CR LF.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.contains(['\r', '\n']) {
            return Err(anyhow!("command must be a single line"));
        }
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(LINE_END.as_bytes()))
            .and_then(|_| self.writer.flush())
            .with_context(|| format!("failed to write to {}", self.name))?;
        log::debug!("tx: {}", line);
        Ok(())
    }

    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.send_line(&command.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn commands_are_crlf_terminated() {
        let sink = Shared::default();
        let mut link = SerialLink::from_writer("test", sink.clone());
        link.send_command(&Command::SetConfidence(0.5)).unwrap();
        link.send_line("status").unwrap();
        assert_eq!(&*sink.0.lock().unwrap(), b"conf=0.5\r\nstatus\r\n");
    }

    #[test]
    fn opens_device_node_as_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let settings = LinkSettings::default();
        let (mut link, _reader) = SerialLink::open_path(file.path(), &settings).unwrap();
        link.send_line("start").unwrap();

        let mut written = String::new();
        File::open(file.path()).unwrap().read_to_string(&mut written).unwrap();
        assert_eq!(written, "start\r\n");
    }

    #[test]
    fn missing_device_is_an_error() {
        assert!(SerialLink::open(&LinkSettings::default()).is_err());
    }
}
