//! Build driver: flushed plan -> resolver -> generator -> deferred checks
//!
//! A failed resolution publishes nothing: the plan stays on disk for the next
//! build to merge against, and no resolved output or validator is written.

use indexmap::IndexSet;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::backend::{write_units, Generator, SourceEmitter, ValidatorSet};
use crate::config::Config;
use crate::feedback::{BuildFeedback, ErrorReport};
use crate::frontend::ModuleTable;
use crate::middle::{resolve, Plan, PlanRegistry, PlanStore, Resolution};
use crate::runtime::{run_request, PredicateTable, ValidationContext};
use crate::utils::Result;

/// Everything one run produced
#[derive(Debug)]
pub struct BuildOutput {
    pub resolution: Resolution,
    /// None when resolution failed
    pub validators: Option<ValidatorSet>,
    pub written: Vec<PathBuf>,
    pub feedback: BuildFeedback,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    store: PlanStore,
    table: &'a dyn ModuleTable,
    /// Without predicates, deferred checks are skipped
    predicates: Option<&'a PredicateTable>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, plan_dir: &Path, table: &'a dyn ModuleTable) -> Self {
        Self {
            config,
            store: PlanStore::new(plan_dir),
            table,
            predicates: None,
        }
    }

    pub fn with_predicates(mut self, predicates: &'a PredicateTable) -> Self {
        self.predicates = Some(predicates);
        self
    }

    /// Flush and stop the live accumulator for this plan, then run
    pub fn finish(&self, registry: &PlanRegistry) -> Result<BuildOutput> {
        registry.ensure_flushed_and_stopped(self.store.dir())?;
        self.run()
    }

    pub fn run(&self) -> Result<BuildOutput> {
        let started = Instant::now();
        let mut feedback = BuildFeedback::new(&self.store.dir().display().to_string());

        let plan = match self.store.load_plan()? {
            Some(plan) => plan,
            None => {
                warn!("no plan in {}", self.store.dir().display());
                feedback.push(ErrorReport::warning("W0001", "no flushed plan to resolve", None));
                Plan::new()
            }
        };

        // Modules absent from this plan fall back to the table's descriptors
        let preconditions = plan.precondition_registry();
        let mut overrides = plan.remote_as_any.clone();
        overrides.merge(&self.config.remote_as_any());
        let resolvable: IndexSet<String> = plan.record_modules().cloned().collect();
        let resolution = resolve(
            self.config.resolver_config(),
            &plan,
            self.table,
            &preconditions,
            &overrides,
            &resolvable,
        );

        feedback.stats.records = resolution.specs.len();
        feedback.stats.fields = resolution.specs.values().map(|s| s.fields.len()).sum();

        if !resolution.is_ok() {
            for error in &resolution.errors {
                feedback.push_error(error);
            }
            warn!("resolution failed with {} error(s); plan kept", resolution.errors.len());
            feedback.stats.total_time_ms = started.elapsed().as_millis() as u64;
            return Ok(BuildOutput {
                resolution,
                validators: None,
                written: Vec::new(),
                feedback,
            });
        }

        self.store.save_resolution(&resolution)?;
        let validators = Generator::new(&self.config.meta_prefix).generate(&resolution.specs);
        let written = match &self.config.output_dir {
            Some(dir) => write_units(&validators, &mut SourceEmitter::default(), dir)?,
            None => Vec::new(),
        };
        feedback.stats.units_written = written.len();

        self.check_deferred(&plan, &validators, &mut feedback);
        self.store.discard_plan()?;

        feedback.stats.total_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "build finished: {} unit(s), {} diagnostic(s)",
            validators.len(),
            feedback.diagnostics.len()
        );
        Ok(BuildOutput {
            resolution,
            validators: Some(validators),
            written,
            feedback,
        })
    }

    fn check_deferred(&self, plan: &Plan, validators: &ValidatorSet, feedback: &mut BuildFeedback) {
        let requests: Vec<_> = plan
            .structs_to_ensure
            .iter()
            .chain(&plan.struct_defaults_to_ensure)
            .collect();
        if requests.is_empty() {
            return;
        }
        let Some(predicates) = self.predicates else {
            feedback.push(ErrorReport::warning(
                "W0002",
                &format!("{} deferred check(s) skipped: no predicate table", requests.len()),
                None,
            ));
            return;
        };

        let ctx = ValidationContext::new(predicates, validators);
        for request in &requests {
            if let Err(errors) = run_request(&ctx, request) {
                for error in &errors {
                    feedback.push(ErrorReport::from_validation(&request.module, error, &request.location));
                }
            }
        }
        feedback.stats.deferred_checks = requests.len();
    }
}
