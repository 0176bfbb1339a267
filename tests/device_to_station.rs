use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use retail_verify::config::default_thresholds;
use retail_verify::detect::backends::{HotSpot, SceneBackend, SceneFrame};
use retail_verify::device::{CycleOutcome, DeviceRuntime, SessionConfig};
use retail_verify::station::{Catalog, SerialReader, Station, StationEvent};
use retail_verify::transport::LineEvent;

fn spot(label: &str, x: usize, y: usize, value: f32) -> HotSpot {
    HotSpot {
        label: label.to_string(),
        x,
        y,
        w: 1,
        h: 1,
        value,
    }
}

fn scene() -> SceneBackend {
    let labels = vec!["background".into(), "Apple".into(), "KitKat".into()];
    let frames = vec![
        SceneFrame {
            hot: vec![
                spot("KitKat", 1, 1, 0.9),
                spot("KitKat", 2, 2, 0.8),
                spot("Apple", 9, 9, 0.95),
            ],
        },
        SceneFrame::default(),
    ];
    SceneBackend::new(labels, frames).unwrap()
}

/// Feed captured link bytes through the background reader and collect events.
fn read_back(bytes: Vec<u8>) -> Vec<StationEvent> {
    let (tx, rx) = mpsc::channel();
    let mut reader = SerialReader::spawn(Cursor::new(bytes), tx, Duration::from_secs(1)).unwrap();
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(Duration::from_secs(2)) {
        let done = event == StationEvent::LinkClosed;
        events.push(event);
        if done {
            break;
        }
    }
    reader.stop();
    events
}

#[test]
fn counter_output_drives_station_state() {
    let mut runtime = DeviceRuntime::new(scene(), default_thresholds());
    let mut session = SessionConfig::default();
    let mut commands: VecDeque<String> = VecDeque::from(vec!["status\r".to_string()]);
    let mut link = Vec::new();

    runtime.start(&mut link).unwrap();
    for _ in 0..2 {
        let outcome = runtime.run_cycle(&mut session, &mut commands, &mut link).unwrap();
        assert!(matches!(outcome, CycleOutcome::Frame(_)));
    }

    let events = read_back(link);
    let mut station = Station::new(Catalog::with_defaults());
    let mut seen_detection = false;
    for event in events {
        if matches!(event, StationEvent::Wire(LineEvent::Detections(_))) {
            station.handle(event);
            seen_detection = true;
            // Adjacent KitKat blobs fall inside the 40px radius and merge.
            let kitkat = station.detected().get("KitKat").unwrap();
            assert_eq!(kitkat.count, 2);
            assert_eq!(kitkat.unit_price, 25.0);
            assert_eq!(station.detected().get("Apple").unwrap().count, 1);
            continue;
        }
        station.handle(event);
    }

    assert!(seen_detection);
    // The second frame was empty, so the station was cleared again.
    assert!(station.detected().is_empty());
    assert!(station.last_latency_ms().is_some());
    assert!(!station.link_open());
}

#[test]
fn stop_and_start_gate_frame_output() {
    let mut runtime = DeviceRuntime::new(scene(), default_thresholds());
    let mut session = SessionConfig::default();
    let mut commands: VecDeque<String> = VecDeque::from(vec!["stop".to_string()]);
    let mut link = Vec::new();

    let outcome = runtime.run_cycle(&mut session, &mut commands, &mut link).unwrap();
    assert!(matches!(outcome, CycleOutcome::Idle));
    let outcome = runtime.run_cycle(&mut session, &mut commands, &mut link).unwrap();
    assert!(matches!(outcome, CycleOutcome::Idle));
    assert_eq!(String::from_utf8(link.clone()).unwrap(), "Detection stopped\r\n");

    commands.push_back("start".to_string());
    let outcome = runtime.run_cycle(&mut session, &mut commands, &mut link).unwrap();
    match outcome {
        CycleOutcome::Frame(report) => {
            assert_eq!(report.line.as_deref(), Some("DETECTION|Apple:1:0.95|KitKat:2:0.90"));
        }
        CycleOutcome::Idle => panic!("expected a frame after start"),
    }
    assert_eq!(runtime.frames_processed(), 1);
}

#[test]
fn separate_clusters_report_only_the_best_one() {
    // Two Apple blobs far apart form two clusters; the line carries the
    // top cluster's size, not the sum.
    let labels = vec!["background".into(), "Apple".into()];
    let frame = SceneFrame {
        hot: vec![spot("Apple", 0, 0, 0.9), spot("Apple", 10, 10, 0.7)],
    };
    let backend = SceneBackend::new(labels, vec![frame]).unwrap();
    let mut runtime = DeviceRuntime::new(backend, default_thresholds());
    let report = runtime.process_frame(&SessionConfig::default()).unwrap();

    assert_eq!(report.summary.get("Apple").unwrap().total_count(), 2);
    assert_eq!(report.line.as_deref(), Some("DETECTION|Apple:1:0.90"));
}
