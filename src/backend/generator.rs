//! Generator - turns resolved field specs into validator units

use indexmap::IndexMap;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::codegen::UnitEmitter;
use super::source::unit_file_stem;
use super::validator::{FieldRoutine, ValidatorSet, ValidatorUnit};
use crate::middle::store::write_atomic;
use crate::types::FieldSpec;
use crate::utils::{Error, Result};

pub const DEFAULT_META_PREFIX: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    meta_prefix: String,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(DEFAULT_META_PREFIX)
    }
}

impl Generator {
    pub fn new(meta_prefix: &str) -> Self {
        Self {
            meta_prefix: meta_prefix.to_string(),
        }
    }

    /// One unit per resolved record module
    pub fn generate(&self, specs: &IndexMap<String, FieldSpec>) -> ValidatorSet {
        let mut set = ValidatorSet::new();
        for (module, spec) in specs {
            set.insert(self.generate_unit(module, spec));
        }
        info!("generated {} validator unit(s)", set.len());
        set
    }

    pub fn generate_unit(&self, module: &str, spec: &FieldSpec) -> ValidatorUnit {
        let routines: IndexMap<String, FieldRoutine> = spec
            .fields
            .iter()
            .map(|(field, shapes)| (field.clone(), FieldRoutine::for_shapes(shapes)))
            .collect();
        let skipped = routines.values().filter(|r| r.is_open()).count();
        debug!("{}: {} field routine(s), {} skipped", module, routines.len(), skipped);

        ValidatorUnit {
            module: module.to_string(),
            file: spec.file.clone(),
            meta_prefix: self.meta_prefix.clone(),
            routines,
            precondition: spec.precondition.clone(),
        }
    }
}

/// Emit every unit into `dir`, one file per unit. Any I/O failure aborts.
pub fn write_units(set: &ValidatorSet, emitter: &mut dyn UnitEmitter, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut written = Vec::with_capacity(set.len());
    for unit in set.iter() {
        let source = emitter.emit(unit)?;
        let path = dir.join(format!("{}.{}", unit_file_stem(&unit.module), emitter.extension()));
        write_atomic(&path, source.as_bytes())?;
        debug!("wrote {} unit for {} to {}", emitter.name(), unit.module, path.display());
        written.push(path);
    }
    Ok(written)
}
