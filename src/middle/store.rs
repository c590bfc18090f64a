//! Durable plan storage: atomic snapshots per plan directory
//!
//! One directory per build-plan identity holds three bincode snapshots:
//! the merged plan, the precondition description map and the resolved output.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::plan::Plan;
use super::resolver::Resolution;
use crate::utils::{Error, Result};

pub const PLAN_FILE: &str = "plan.bin";
pub const PRECONDITIONS_FILE: &str = "preconditions.bin";
pub const RESOLVED_FILE: &str = "resolved.bin";

/// Owner module -> type name -> precondition description
pub type PreconditionDescriptions = IndexMap<String, IndexMap<String, String>>;

/// Storage rooted at one plan directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn plan_path(&self) -> PathBuf {
        self.dir.join(PLAN_FILE)
    }

    pub fn preconditions_path(&self) -> PathBuf {
        self.dir.join(PRECONDITIONS_FILE)
    }

    pub fn resolved_path(&self) -> PathBuf {
        self.dir.join(RESOLVED_FILE)
    }

    /// Load the persisted plan. Returns None if none was flushed.
    pub fn load_plan(&self) -> Result<Option<Plan>> {
        load_snapshot(&self.plan_path())
    }

    /// Persist the plan and its precondition descriptions
    pub fn save_plan(&self, plan: &Plan) -> Result<()> {
        save_snapshot(&self.plan_path(), plan)?;
        let descriptions: PreconditionDescriptions = plan.precondition_registry().descriptions();
        save_snapshot(&self.preconditions_path(), &descriptions)
    }

    pub fn load_preconditions(&self) -> Result<Option<PreconditionDescriptions>> {
        load_snapshot(&self.preconditions_path())
    }

    /// Remove the plan once it has been consumed by a successful resolve
    pub fn discard_plan(&self) -> Result<()> {
        let path = self.plan_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
        Ok(())
    }

    pub fn save_resolution(&self, resolution: &Resolution) -> Result<()> {
        save_snapshot(&self.resolved_path(), resolution)
    }

    pub fn load_resolution(&self) -> Result<Option<Resolution>> {
        load_snapshot(&self.resolved_path())
    }
}

fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let value = bincode::deserialize(&bytes).map_err(|e| Error::malformed(path, e))?;
    Ok(Some(value))
}

fn save_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| Error::io(path, e))?;
    write_atomic(path, &bytes)
}

/// Write a file atomically (write to temp, then rename)
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = fs::File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
    file.write_all(bytes).map_err(|e| Error::io(&tmp_path, e))?;
    // Contents must be on disk before the rename makes them visible
    file.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    sync_dir(path.parent())
}

/// Persist the rename itself
#[cfg(unix)]
fn sync_dir(dir: Option<&Path>) -> Result<()> {
    let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: Option<&Path>) -> Result<()> {
    Ok(())
}
