use anyhow::{anyhow, Result};
use super::catalog::Catalog;
use crate::transport::WireRecord;

/// A line the cashier entered.
#[derive(Clone, Debug, PartialEq)]
pub struct BilledItem {
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl BilledItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Cashier's bill. Lines are only ever appended until the bill is cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bill {
    items: Vec<BilledItem>,
}

impl Bill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, quantity: u32, catalog: &Catalog) -> Result<&BilledItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("item name must not be empty"));
        }
        if quantity == 0 {
            return Err(anyhow!("quantity must be positive"));
        }
        if !catalog.contains(name) {
            log::warn!("'{}' is not in the catalog, billing at 0.00", name);
        }
        self.items.push(BilledItem {
            name: name.to_string(),
            unit_price: catalog.price_of(name),
            quantity,
        });
        log::info!("billed {} x {}", quantity, name);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[BilledItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(BilledItem::line_total).sum()
    }

    /// Quantity per name, summed, in first-billed order.
    pub fn quantities(&self) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = Vec::new();
        for item in &self.items {
            match out.iter_mut().find(|(n, _)| *n == item.name) {
                Some(entry) => entry.1 = entry.1.saturating_add(item.quantity),
                None => out.push((item.name.clone(), item.quantity)),
            }
        }
        out
    }
}

/// One product as last reported by the counter.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedItem {
    pub name: String,
    pub count: u32,
    pub unit_price: f64,
    pub confidence: f32,
}

/// The counter's latest view of the checkout area.
///
/// Replaced wholesale by every DETECTION line and emptied by a clear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectedItems {
    items: Vec<DetectedItem>,
}

impl DetectedItems {
    /// Aggregate wire records by name: quantities are summed and the
    /// confidence is the mean over the records for that name.
    ///
    /// The mean is taken per record, not per unit. Dividing the confidence
    /// sum by the summed quantity would pull a single `KitKat:4:0.90` record
    /// down to 0.225; here it stays at 0.90.
    pub fn from_records(records: &[WireRecord], catalog: &Catalog) -> Self {
        let mut sums: Vec<(String, u32, f32, u32)> = Vec::new();
        for rec in records {
            match sums.iter_mut().find(|(n, ..)| *n == rec.name) {
                Some(entry) => {
                    entry.1 = entry.1.saturating_add(rec.quantity);
                    entry.2 += rec.confidence;
                    entry.3 += 1;
                }
                None => sums.push((rec.name.clone(), rec.quantity, rec.confidence, 1)),
            }
        }
        let items = sums
            .into_iter()
            .map(|(name, count, conf_sum, n)| DetectedItem {
                unit_price: catalog.price_of(&name),
                confidence: conf_sum / n as f32,
                name,
                count,
            })
            .collect();
        Self { items }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[DetectedItem] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&DetectedItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_price(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.unit_price * f64::from(item.count))
            .sum()
    }

    pub fn counts(&self) -> Vec<(String, u32)> {
        self.items
            .iter()
            .map(|item| (item.name.clone(), item.count))
            .collect()
    }
}
