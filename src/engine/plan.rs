//! Extraction plan: which streams a sync runs, and in what order

use crate::config::{CatalogConfig, StreamConfig};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// How a planned stream is extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// Every record on every sync
    FullRefresh,
    /// Records updated since the saved watermark
    Incremental {
        /// Record field holding the cursor
        cursor_field: String,
    },
    /// One child request per record of `parent`
    Dependent {
        /// Parent stream name
        parent: String,
    },
}

/// One stream of a sync
#[derive(Debug, Clone)]
pub struct PlannedStream {
    /// Stream name
    pub name: String,
    /// Extraction kind
    pub kind: StreamKind,
    /// Streams this one reads from
    pub dependencies: Vec<String>,
    /// Definition of the stream
    pub config: StreamConfig,
    /// Definition of the parent, for dependent streams
    pub parent_config: Option<StreamConfig>,
}

/// Ordered list of streams for one sync
#[derive(Debug, Clone, Default)]
pub struct ExtractionPlan {
    streams: Vec<PlannedStream>,
}

impl ExtractionPlan {
    /// Resolve the selected streams (all when `None`) against the catalog.
    ///
    /// Streams keep catalog order except that a selected parent is always
    /// placed before its dependents. A dependent's parent does not need to
    /// be selected.
    pub fn build(catalog: &CatalogConfig, selected: Option<&[String]>) -> Result<Self> {
        let wanted: HashSet<&str> = match selected {
            Some(names) => {
                for name in names {
                    if catalog.get(name).is_none() {
                        return Err(Error::StreamNotFound {
                            stream: name.clone(),
                        });
                    }
                }
                names.iter().map(String::as_str).collect()
            }
            None => catalog.streams.iter().map(|s| s.name.as_str()).collect(),
        };

        let mut placed: HashSet<&str> = HashSet::new();
        let mut streams = Vec::with_capacity(wanted.len());

        for config in catalog.streams.iter().filter(|s| wanted.contains(s.name.as_str())) {
            if placed.contains(config.name.as_str()) {
                continue;
            }

            let planned = plan_stream(catalog, config)?;
            if let StreamKind::Dependent { parent } = &planned.kind {
                if wanted.contains(parent.as_str()) && !placed.contains(parent.as_str()) {
                    if let Some(parent_config) = catalog.get(parent) {
                        streams.push(plan_stream(catalog, parent_config)?);
                        placed.insert(parent_config.name.as_str());
                    }
                }
            }

            placed.insert(config.name.as_str());
            streams.push(planned);
        }

        Ok(Self { streams })
    }

    /// Planned streams, in run order
    pub fn streams(&self) -> &[PlannedStream] {
        &self.streams
    }

    /// Stream names, in run order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of planned streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether nothing is planned
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn plan_stream(catalog: &CatalogConfig, config: &StreamConfig) -> Result<PlannedStream> {
    let Some(binding) = &config.parent else {
        let kind = match &config.incremental {
            Some(incremental) => StreamKind::Incremental {
                cursor_field: incremental.cursor_field.clone(),
            },
            None => StreamKind::FullRefresh,
        };
        return Ok(PlannedStream {
            name: config.name.clone(),
            kind,
            dependencies: Vec::new(),
            config: config.clone(),
            parent_config: None,
        });
    };

    let parent = catalog.get(&binding.stream).ok_or_else(|| {
        Error::config(format!(
            "Stream '{}' depends on unknown stream '{}'",
            config.name, binding.stream
        ))
    })?;

    if parent.parent.is_some() {
        return Err(Error::config(format!(
            "Stream '{}' depends on '{}', which is itself a dependent stream",
            config.name, parent.name
        )));
    }

    Ok(PlannedStream {
        name: config.name.clone(),
        kind: StreamKind::Dependent {
            parent: parent.name.clone(),
        },
        dependencies: vec![parent.name.clone()],
        config: config.clone(),
        parent_config: Some(parent.clone()),
    })
}
