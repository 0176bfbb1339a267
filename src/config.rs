use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DistanceThresholds, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_NMS_IOU};
use crate::device::{DEFAULT_FRAME_DELAY, DEFAULT_MIN_CONFIDENCE};
use crate::station::Catalog;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const ALLOWED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115_200, 230_400];
const DEFAULT_DATA_BITS: u8 = 8;
const DEFAULT_STOP_BITS: u8 = 1;
const DEFAULT_READER_JOIN_TIMEOUT_MS: u64 = 1000;

/// Merge radii for the products the counter model was tuned on.
pub const DEFAULT_CLASS_THRESHOLDS: &[(&str, u32)] = &[
    ("Unibic", 80),
    ("KitKat", 40),
    ("goodday", 80),
    ("HidenSeek", 80),
    ("bird", 20),
];

#[derive(Debug, Deserialize, Default)]
struct RetailConfigFile {
    serial: Option<SerialConfigFile>,
    device: Option<DeviceConfigFile>,
    station: Option<StationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    device: Option<PathBuf>,
    baud_rate: Option<u32>,
    data_bits: Option<u8>,
    parity: Option<Parity>,
    stop_bits: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    min_confidence: Option<f32>,
    delay_ms: Option<u64>,
    nms_iou: Option<f32>,
    scene_path: Option<PathBuf>,
    thresholds: Option<ThresholdConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    default: Option<u32>,
    classes: Option<HashMap<String, u32>>,
}

#[derive(Debug, Deserialize, Default)]
struct StationConfigFile {
    reader_join_timeout_ms: Option<u64>,
    catalog: Option<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Serial line parameters. Recorded and logged; the device node itself is
/// opened as a plain file.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    pub device: Option<PathBuf>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: DEFAULT_STOP_BITS,
        }
    }
}

impl LinkSettings {
    fn from_file(file: Option<SerialConfigFile>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            device: file.device,
            baud_rate: file.baud_rate.unwrap_or(defaults.baud_rate),
            data_bits: file.data_bits.unwrap_or(defaults.data_bits),
            parity: file.parity.unwrap_or(defaults.parity),
            stop_bits: file.stop_bits.unwrap_or(defaults.stop_bits),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("RETAIL_SERIAL_DEVICE") {
            if !device.trim().is_empty() {
                self.device = Some(PathBuf::from(device.trim()));
            }
        }
        if let Ok(baud) = std::env::var("RETAIL_BAUD_RATE") {
            self.baud_rate = baud
                .trim()
                .parse()
                .map_err(|_| anyhow!("RETAIL_BAUD_RATE must be an integer baud rate"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(anyhow!(
                "baud rate {} is not one of {:?}",
                self.baud_rate,
                ALLOWED_BAUD_RATES
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(anyhow!("data bits must be between 5 and 8"));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(anyhow!("stop bits must be 1 or 2"));
        }
        Ok(())
    }

    /// Short form such as `115200 8N1`.
    pub fn describe(&self) -> String {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        format!("{} {}{}{}", self.baud_rate, self.data_bits, parity, self.stop_bits)
    }
}

/// Settings for the `edge_counter` binary.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub min_confidence: f32,
    pub delay: Duration,
    pub nms_iou: f32,
    pub thresholds: DistanceThresholds,
    pub scene_path: Option<PathBuf>,
    pub link: LinkSettings,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            delay: DEFAULT_FRAME_DELAY,
            nms_iou: DEFAULT_NMS_IOU,
            thresholds: default_thresholds(),
            scene_path: None,
            link: LinkSettings::default(),
        }
    }
}

impl DeviceConfig {
    pub fn load() -> Result<Self> {
        let file_cfg = load_config_file()?;
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RetailConfigFile) -> Self {
        let link = LinkSettings::from_file(file.serial);
        let device = file.device.unwrap_or_default();
        let thresholds = match device.thresholds {
            Some(t) => {
                let mut table =
                    DistanceThresholds::new(t.default.unwrap_or(DEFAULT_DISTANCE_THRESHOLD));
                for (label, threshold) in t.classes.unwrap_or_default() {
                    table.insert(&label, threshold);
                }
                table
            }
            None => default_thresholds(),
        };
        Self {
            min_confidence: device.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            delay: device
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FRAME_DELAY),
            nms_iou: device.nms_iou.unwrap_or(DEFAULT_NMS_IOU),
            thresholds,
            scene_path: device.scene_path,
            link,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        self.link.apply_env()?;
        if let Ok(conf) = std::env::var("RETAIL_MIN_CONFIDENCE") {
            self.min_confidence = conf
                .trim()
                .parse()
                .map_err(|_| anyhow!("RETAIL_MIN_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Ok(delay) = std::env::var("RETAIL_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("RETAIL_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.delay = Duration::from_millis(millis);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;
        if !self.min_confidence.is_finite() || !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!("min_confidence must be within [0, 1]"));
        }
        if !self.nms_iou.is_finite() || self.nms_iou <= 0.0 || self.nms_iou > 1.0 {
            return Err(anyhow!("nms_iou must be within (0, 1]"));
        }
        for (label, _) in self.thresholds.classes() {
            crate::validate_label(label)?;
        }
        Ok(())
    }
}

/// Settings for the `checkout_station` binary.
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub link: LinkSettings,
    pub catalog: Catalog,
    pub reader_join_timeout: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            link: LinkSettings::default(),
            catalog: Catalog::with_defaults(),
            reader_join_timeout: Duration::from_millis(DEFAULT_READER_JOIN_TIMEOUT_MS),
        }
    }
}

impl StationConfig {
    pub fn load() -> Result<Self> {
        let file_cfg = load_config_file()?;
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.link.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RetailConfigFile) -> Result<Self> {
        let link = LinkSettings::from_file(file.serial);
        let station = file.station.unwrap_or_default();
        let catalog = match station.catalog {
            Some(entries) => {
                let mut catalog = Catalog::new();
                for (name, price) in entries {
                    catalog.insert(&name, price)?;
                }
                catalog
            }
            None => Catalog::with_defaults(),
        };
        Ok(Self {
            link,
            catalog,
            reader_join_timeout: Duration::from_millis(
                station
                    .reader_join_timeout_ms
                    .unwrap_or(DEFAULT_READER_JOIN_TIMEOUT_MS),
            ),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;
        if self.reader_join_timeout.is_zero() {
            return Err(anyhow!("reader_join_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

pub fn default_thresholds() -> DistanceThresholds {
    let mut table = DistanceThresholds::new(DEFAULT_DISTANCE_THRESHOLD);
    for (label, threshold) in DEFAULT_CLASS_THRESHOLDS {
        table.insert(label, *threshold);
    }
    table
}

fn load_config_file() -> Result<Option<RetailConfigFile>> {
    match std::env::var("RETAIL_CONFIG").ok() {
        Some(path) if !path.trim().is_empty() => Ok(Some(read_config_file(Path::new(&path))?)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<RetailConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
