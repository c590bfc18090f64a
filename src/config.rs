//! Build configuration, loaded from JSON

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::DEFAULT_META_PREFIX;
use crate::middle::{AsAnyScope, RemoteAsAny, ResolverConfig, DEFAULT_COMBINATION_LIMIT};
use crate::utils::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cap on the combinations one container type may expand to
    pub combination_limit: usize,
    /// Fields starting with this prefix are meta fields
    pub meta_prefix: String,
    /// Where generated validator listings go; none skips writing them
    pub output_dir: Option<PathBuf>,
    /// Global "treat as any" overrides: module -> type names
    pub remote_as_any: IndexMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            combination_limit: DEFAULT_COMBINATION_LIMIT,
            meta_prefix: DEFAULT_META_PREFIX.to_string(),
            output_dir: None,
            remote_as_any: IndexMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::malformed(path, e))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            combination_limit: self.combination_limit,
        }
    }

    pub fn remote_as_any(&self) -> RemoteAsAny {
        let mut overrides = RemoteAsAny::new();
        for (module, names) in &self.remote_as_any {
            overrides.add(&AsAnyScope::Global, module, names.iter().cloned());
        }
        overrides
    }
}
