use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

/// Unit prices keyed by exact product label.
///
/// Labels the catalog does not know are priced at zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    prices: BTreeMap<String, f64>,
}

/// Products the counter model ships with.
pub const DEFAULT_PRODUCTS: &[(&str, f64)] = &[
    ("Apple", 0.0),
    ("Banana", 0.0),
    ("Orange", 0.0),
    ("Water", 0.0),
    ("Soda", 0.0),
    ("Chips", 0.0),
    ("KitKat", 25.0),
    ("goodday", 25.0),
    ("HidenSeek", 30.0),
    ("Unibic", 30.0),
];

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for (name, price) in DEFAULT_PRODUCTS {
            catalog.prices.insert((*name).to_string(), *price);
        }
        catalog
    }

    pub fn with_item(mut self, name: &str, price: f64) -> Result<Self> {
        self.insert(name, price)?;
        Ok(self)
    }

    pub fn insert(&mut self, name: &str, price: f64) -> Result<()> {
        crate::validate_label(name)?;
        if !price.is_finite() || price < 0.0 {
            return Err(anyhow!("price for '{}' must be a non-negative number", name));
        }
        self.prices.insert(name.to_string(), price);
        Ok(())
    }

    pub fn price_of(&self, name: &str) -> f64 {
        self.prices.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prices.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.prices.iter().map(|(name, price)| (name.as_str(), *price))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact() {
        let catalog = Catalog::with_defaults();
        assert_eq!(catalog.price_of("KitKat"), 25.0);
        assert_eq!(catalog.price_of("kitkat"), 0.0);
        assert_eq!(catalog.price_of("Durian"), 0.0);
        assert!(!catalog.contains("Durian"));
    }

    #[test]
    fn bad_entries_are_rejected() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert("Tea", -1.0).is_err());
        assert!(catalog.insert("Tea", f64::NAN).is_err());
        assert!(catalog.insert("Te|a", 1.0).is_err());
        assert!(catalog.is_empty());
    }
}
