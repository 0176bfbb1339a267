//! Checkout station: the cashier's bill, the counter's latest report and
//! the comparison between them.
//!
//! Only the thread that owns a [`Station`] mutates it. The serial reader and
//! the operator console feed it through one [`StationEvent`] queue.

mod billing;
mod catalog;
pub mod console;
mod link;
mod reader;
mod verify;

use std::sync::mpsc::{Receiver, TryRecvError};

use anyhow::Result;

pub use billing::{Bill, BilledItem, DetectedItem, DetectedItems};
pub use catalog::{Catalog, DEFAULT_PRODUCTS};
pub use console::OperatorCommand;
pub use link::SerialLink;
pub use reader::{SerialReader, READ_ERROR_BACKOFF};
pub use verify::{verify, Mismatch};

use crate::transport::LineEvent;

/// Everything that can reach the station from another thread.
#[derive(Clone, Debug, PartialEq)]
pub enum StationEvent {
    Wire(LineEvent),
    LinkClosed,
    Operator(String),
}

#[derive(Debug)]
pub struct Station {
    catalog: Catalog,
    bill: Bill,
    detected: DetectedItems,
    last_latency_ms: Option<u64>,
    last_message: Option<String>,
    link_open: bool,
}

impl Station {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            bill: Bill::new(),
            detected: DetectedItems::default(),
            last_latency_ms: None,
            last_message: None,
            link_open: true,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bill(&self) -> &Bill {
        &self.bill
    }

    pub fn detected(&self) -> &DetectedItems {
        &self.detected
    }

    pub fn last_latency_ms(&self) -> Option<u64> {
        self.last_latency_ms
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn link_open(&self) -> bool {
        self.link_open
    }

    /// Fold one decoded line into the station state.
    pub fn apply(&mut self, event: LineEvent) {
        match event {
            LineEvent::Blank => {}
            LineEvent::Detections(records) => {
                self.detected = DetectedItems::from_records(&records, &self.catalog);
                log::info!(
                    "detected: {}",
                    self.detected
                        .items()
                        .iter()
                        .map(|i| format!("{} x{} ({:.2})", i.name, i.count, i.confidence))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            LineEvent::Cleared(reason) => {
                if !self.detected.is_empty() {
                    log::info!("detected items cleared ({:?})", reason);
                }
                self.detected.clear();
            }
            LineEvent::Latency(ms) => {
                log::debug!("counter latency {} ms", ms);
                self.last_latency_ms = Some(ms);
            }
            LineEvent::Message(text) => {
                log::info!("counter: {}", text);
                self.last_message = Some(text);
            }
        }
    }

    /// Apply one queued event. Operator lines are handed back to the caller.
    pub fn handle(&mut self, event: StationEvent) -> Option<String> {
        match event {
            StationEvent::Wire(line) => {
                self.apply(line);
                None
            }
            StationEvent::LinkClosed => {
                log::warn!("serial link closed");
                self.link_open = false;
                None
            }
            StationEvent::Operator(line) => Some(line),
        }
    }

    /// Apply every event already queued, returning operator lines in order.
    pub fn drain(&mut self, events: &Receiver<StationEvent>) -> Vec<String> {
        let mut operator = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => operator.extend(self.handle(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.link_open = false;
                    break;
                }
            }
        }
        operator
    }

    pub fn add_billed(&mut self, name: &str, quantity: u32) -> Result<&BilledItem> {
        self.bill.add(name, quantity, &self.catalog)
    }

    /// Empty both the bill and the detected set.
    pub fn clear_all(&mut self) {
        self.bill.clear();
        self.detected.clear();
        log::info!("cleared bill and detected items");
    }

    pub fn verify(&self) -> Vec<Mismatch> {
        let mismatches = verify(&self.bill.quantities(), &self.detected.counts());
        if mismatches.is_empty() {
            log::info!("verification passed");
        } else {
            log::info!("verification failed: {} mismatch(es)", mismatches.len());
        }
        mismatches
    }
}
