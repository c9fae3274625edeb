//! Catalog of well-known upstream registries

use crate::descriptor::UpstreamDescriptor;
use crate::error::{Result, TopologyError};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("known_registries.json");

/// Upstream descriptors keyed by name, in file order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    upstreams: IndexMap<String, UpstreamDescriptor>,
}

impl Catalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Parse a JSON array of descriptor records
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<UpstreamDescriptor> = serde_json::from_str(json)?;
        let mut upstreams = IndexMap::new();

        for record in records {
            let name = record.name().to_string();
            if upstreams.insert(name.clone(), record).is_some() {
                return Err(TopologyError::Config(format!(
                    "Catalog lists upstream {} more than once",
                    name
                )));
            }
        }

        Ok(Self { upstreams })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, name: &str) -> Result<&UpstreamDescriptor> {
        self.upstreams
            .get(name)
            .ok_or_else(|| TopologyError::UnknownUpstream {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.upstreams.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpstreamDescriptor> {
        self.upstreams.values()
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }
}
