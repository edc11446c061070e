use anyhow::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Accessory designs grouped by category, e.g. `gold_earrings`, in display
/// order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Catalog(BTreeMap<String, Vec<String>>);

impl Catalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn options(&self, category: &str) -> Result<&[String]> {
        match self.0.get(category) {
            Some(options) if !options.is_empty() => Ok(options),
            _ => Err(Error::msg(format!("No designs available for {category}"))),
        }
    }
}

#[test]
fn lookup() -> Result<()> {
    let catalog = Catalog::from_json(
        r#"{"gold_necklaces": ["n1.png"], "gold_earrings": ["e1.png", "e2.png"], "silver_earrings": []}"#,
    )?;

    assert_eq!(
        catalog.categories().collect::<Vec<_>>(),
        vec!["gold_earrings", "gold_necklaces", "silver_earrings"]
    );
    assert_eq!(catalog.options("gold_earrings")?, ["e1.png", "e2.png"]);
    assert!(catalog.options("silver_earrings").is_err());
    assert!(catalog.options("rings").is_err());
    Ok(())
}

#[test]
fn malformed_catalog() {
    assert!(Catalog::from_json(r#"{"gold_earrings": "e1.png"}"#).is_err());
}
