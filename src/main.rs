//! shapec - plan inspection and resolution driver

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use shapecheck::feedback::BuildFeedback;
use shapecheck::frontend::StaticModuleTable;
use shapecheck::middle::PlanStore;
use shapecheck::{Config, Pipeline};

/// shapecheck driver
#[derive(Parser, Debug)]
#[command(name = "shapec")]
#[command(version = "0.1.0")]
#[command(about = "Resolve record field types and generate validators")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a flushed plan
    Inspect {
        /// Plan directory
        plan: PathBuf,

        /// Print the whole plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a flushed plan and generate validators
    Resolve {
        /// Plan directory
        plan: PathBuf,

        /// Module type tables (JSON list)
        #[arg(long, value_name = "FILE")]
        tables: PathBuf,

        /// Output directory for generated validators
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Configuration file (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the combination limit
        #[arg(long)]
        combination_limit: Option<usize>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Inspect { plan, json } => inspect(plan, *json),
        Commands::Resolve {
            plan,
            tables,
            out,
            config,
            combination_limit,
            json,
        } => resolve(plan, tables, out.as_deref(), config.as_deref(), *combination_limit, *json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(2);
        }
    }
}

fn inspect(dir: &Path, json: bool) -> Result<bool> {
    let store = PlanStore::new(dir);
    let Some(plan) = store.load_plan()? else {
        println!("No plan in {}", dir.display());
        return Ok(true);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(true);
    }

    println!("Plan {}", dir.display());
    for (module, fields) in &plan.pending_field_types {
        match plan.file_of(module) {
            Some(file) => println!("  {} ({})", module, file),
            None => println!("  {}", module),
        }
        for (field, decl) in fields {
            println!("    {} :: {}", field, decl.ty);
        }
    }
    println!("  declaration contexts: {}", plan.environments.len());
    let preconditions: usize = plan.preconditions.values().map(Vec::len).sum();
    println!("  preconditions: {}", preconditions);
    println!("  deferred struct checks: {}", plan.structs_to_ensure.len());
    println!("  deferred default checks: {}", plan.struct_defaults_to_ensure.len());
    if let Some(descriptions) = store.load_preconditions()? {
        for (owner, types) in &descriptions {
            for (name, description) in types {
                println!("    {}.{}: {}", owner, name, description);
            }
        }
    }
    Ok(true)
}

fn resolve(
    dir: &Path,
    tables: &Path,
    out: Option<&Path>,
    config_path: Option<&Path>,
    combination_limit: Option<usize>,
    json: bool,
) -> Result<bool> {
    let mut config = match config_path {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(limit) = combination_limit {
        config.combination_limit = limit;
    }
    if let Some(out) = out {
        config.output_dir = Some(out.to_path_buf());
    }

    let table = StaticModuleTable::load(tables).with_context(|| format!("loading tables {}", tables.display()))?;
    let output = Pipeline::new(&config, dir, &table).run()?;

    if json {
        println!("{}", output.feedback.to_json());
    } else {
        print_feedback(&output.feedback);
        for path in &output.written {
            println!("wrote {}", path.display());
        }
    }
    Ok(output.feedback.success)
}

fn print_feedback(feedback: &BuildFeedback) {
    for report in &feedback.diagnostics {
        println!("[{}] {}", report.code, report.message);
        for suggestion in &report.suggestions {
            println!("    help: {}", suggestion.message);
        }
    }
    println!(
        "{} record(s), {} field(s), {} error(s) in {}ms",
        feedback.stats.records,
        feedback.stats.fields,
        feedback.error_count(),
        feedback.stats.total_time_ms
    );
}
