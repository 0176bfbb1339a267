use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use retail_verify::config::{DeviceConfig, Parity, StationConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RETAIL_CONFIG",
        "RETAIL_SERIAL_DEVICE",
        "RETAIL_BAUD_RATE",
        "RETAIL_MIN_CONFIDENCE",
        "RETAIL_DELAY_MS",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_device_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "serial": {
                "device": "/dev/ttyACM0",
                "baud_rate": 57600,
                "parity": "even"
            },
            "device": {
                "min_confidence": 0.7,
                "delay_ms": 500,
                "nms_iou": 0.2,
                "scene_path": "scenes/counter.json",
                "thresholds": {
                    "default": 25,
                    "classes": { "KitKat": 45 }
                }
            }
        }"#,
    );

    std::env::set_var("RETAIL_CONFIG", file.path());
    std::env::set_var("RETAIL_SERIAL_DEVICE", "/dev/ttyUSB1");
    std::env::set_var("RETAIL_DELAY_MS", "250");

    let cfg = DeviceConfig::load().expect("load config");

    assert_eq!(cfg.link.device.as_deref(), Some(std::path::Path::new("/dev/ttyUSB1")));
    assert_eq!(cfg.link.baud_rate, 57600);
    assert_eq!(cfg.link.parity, Parity::Even);
    assert_eq!(cfg.link.describe(), "57600 8E1");
    assert_eq!(cfg.min_confidence, 0.7);
    assert_eq!(cfg.delay, Duration::from_millis(250));
    assert_eq!(cfg.nms_iou, 0.2);
    assert_eq!(cfg.thresholds.threshold_for("KitKat"), 45);
    assert_eq!(cfg.thresholds.threshold_for("Unibic"), 25);

    clear_env();
}

#[test]
fn station_config_uses_file_catalog() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "station": {
                "reader_join_timeout_ms": 250,
                "catalog": { "Tea": 12.5, "KitKat": 20.0 }
            }
        }"#,
    );
    std::env::set_var("RETAIL_CONFIG", file.path());
    std::env::set_var("RETAIL_BAUD_RATE", "9600");

    let cfg = StationConfig::load().expect("load config");
    assert_eq!(cfg.catalog.len(), 2);
    assert_eq!(cfg.catalog.price_of("Tea"), 12.5);
    assert_eq!(cfg.catalog.price_of("Apple"), 0.0);
    assert_eq!(cfg.link.baud_rate, 9600);
    assert_eq!(cfg.reader_join_timeout, Duration::from_millis(250));

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = StationConfig::load().expect("defaults");
    assert_eq!(cfg.link.baud_rate, 115_200);
    assert_eq!(cfg.catalog.price_of("HidenSeek"), 30.0);
    assert!(cfg.link.device.is_none());
}

#[test]
fn invalid_overrides_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RETAIL_BAUD_RATE", "12345");
    assert!(StationConfig::load().is_err());
    clear_env();

    std::env::set_var("RETAIL_MIN_CONFIDENCE", "1.2");
    assert!(DeviceConfig::load().is_err());
    clear_env();

    std::env::set_var("RETAIL_DELAY_MS", "-5");
    assert!(DeviceConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{ "station": { "catalog": { "Bad|Name": 1.0 } } }"#);
    std::env::set_var("RETAIL_CONFIG", file.path());
    assert!(StationConfig::load().is_err());
    clear_env();
}
