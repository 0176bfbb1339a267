//! Operator console commands for the checkout station.

use anyhow::{anyhow, Result};

use crate::transport::Command;

pub const HELP: &str = "commands: add <item> [qty], clear, items, verify, \
start, stop, status, conf=<0..1>, delay=<ms>, send <raw>, quit";

#[derive(Clone, Debug, PartialEq)]
pub enum OperatorCommand {
    Add { name: String, quantity: u32 },
    Clear,
    Items,
    Verify,
    /// A counter command, already validated.
    Device(Command),
    /// Raw line passed to the counter unchanged.
    Send(String),
    Help,
    Quit,
}

impl OperatorCommand {
    /// Parse one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let cmd = match head {
            "add" => parse_add(rest)?,
            "clear" => OperatorCommand::Clear,
            "items" => OperatorCommand::Items,
            "verify" => OperatorCommand::Verify,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" => OperatorCommand::Quit,
            "send" => {
                if rest.is_empty() {
                    return Err(anyhow!("usage: send <raw>"));
                }
                OperatorCommand::Send(rest.to_string())
            }
            _ => match Command::parse(line) {
                Ok(Command::Unknown(_)) => {
                    return Err(anyhow!("unknown command '{}'; {}", line, HELP));
                }
                Ok(cmd) => OperatorCommand::Device(cmd),
                Err(err) => return Err(anyhow!(err)),
            },
        };
        Ok(Some(cmd))
    }
}

fn parse_add(rest: &str) -> Result<OperatorCommand> {
    if rest.is_empty() {
        return Err(anyhow!("usage: add <item> [qty]"));
    }
    let (name, quantity) = match rest.rsplit_once(char::is_whitespace) {
        Some((name, qty)) if qty.parse::<i64>().is_ok() => {
            let qty: i64 = qty.parse()?;
            if qty <= 0 || qty > i64::from(u32::MAX) {
                return Err(anyhow!("quantity must be a positive integer"));
            }
            (name.trim(), qty as u32)
        }
        _ => (rest, 1),
    };
    Ok(OperatorCommand::Add {
        name: name.to_string(),
        quantity,
    })
}
