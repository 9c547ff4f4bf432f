//! Built-in resource catalog embedded in the binary
//!
//! The DEAR Inventory resources are described in `connectors/dear-inventory.yaml`,
//! which is compiled in so the binary needs no external definition files.

use crate::config::{CatalogConfig, SourceConfig};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Built-in catalog YAML
pub const BUILTIN_CATALOG: &str = include_str!("../connectors/dear-inventory.yaml");

/// Load the built-in catalog
pub fn load_catalog() -> Result<CatalogConfig> {
    load_catalog_from_str(BUILTIN_CATALOG)
}

/// Parse a catalog from a YAML string
pub fn load_catalog_from_str(yaml: &str) -> Result<CatalogConfig> {
    let catalog: CatalogConfig = serde_yaml::from_str(yaml)?;

    let mut seen = HashSet::new();
    for stream in &catalog.streams {
        if !seen.insert(stream.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate stream '{}' in catalog",
                stream.name
            )));
        }
    }

    Ok(catalog)
}

/// Apply user overrides (base URL, page size) to a catalog
pub fn apply_overrides(mut catalog: CatalogConfig, config: &SourceConfig) -> CatalogConfig {
    if let Some(base_url) = &config.base_url {
        catalog.base_url.clone_from(base_url);
    }

    if let Some(size) = config.page_size {
        catalog.streams = catalog
            .streams
            .into_iter()
            .map(|s| s.with_page_size(size))
            .collect();
    }

    catalog
}
