//! Tabcraft CLI - run filter, sort and group-by pipelines over JSON datasets
//!
//! # Main Commands
//!
//! ```bash
//! tabcraft run data.json stages.json -o out.json   # Apply a pipeline
//! tabcraft check data.json stages.json             # Validate every stage
//! tabcraft type records.json --types sales=number  # Type raw string records
//! ```
//!
//! # Reference Commands
//!
//! ```bash
//! tabcraft describe stages.json    # One line per stage
//! tabcraft operators               # Filter operators per column type
//! tabcraft example-stages          # Example stages file
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tabcraft::logs;
use tabcraft::transform::{example_stages, operators_description};
use tabcraft::{
    invalid_rows, parse_type_assignments, type_table, CliError, CliResult, Dataset, EngineConfig,
    Pipeline, PipelineError, RawTable, Session, Stage,
};

#[derive(Parser)]
#[command(name = "tabcraft")]
#[command(about = "Filter, sort and group typed tables through a stage pipeline", long_about = None)]
struct Cli {
    /// Engine configuration (JSON). Defaults come from TABCRAFT_* variables.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Do not echo pipeline logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a stages file to a dataset and output the transformed dataset
    Run {
        /// Dataset JSON file ({ headers, rows })
        dataset: PathBuf,

        /// Stages JSON file (array of stages)
        stages: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate each stage against the output of the stage before it
    Check {
        /// Dataset JSON file
        dataset: PathBuf,

        /// Stages JSON file
        stages: PathBuf,
    },

    /// Type raw string records into a dataset
    Type {
        /// Records JSON file (array of objects, or { headers, rows })
        records: PathBuf,

        /// Column types, e.g. "sales=number,day=date" (others are strings)
        #[arg(short, long, default_value = "")]
        types: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe each stage of a stages file
    Describe {
        /// Stages JSON file
        stages: PathBuf,
    },

    /// Show filter operators per column type and aggregate functions
    Operators,

    /// Show an example stages file
    ExampleStages,
}

fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        logs::set_echo(false);
    }

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Run {
            dataset,
            stages,
            output,
        } => cmd_run(&dataset, &stages, output.as_deref(), config),

        Commands::Check { dataset, stages } => cmd_check(&dataset, &stages, config),

        Commands::Type {
            records,
            types,
            output,
        } => cmd_type(&records, &types, output.as_deref(), &config),

        Commands::Describe { stages } => cmd_describe(&stages),

        Commands::Operators => cmd_operators(),

        Commands::ExampleStages => cmd_example_stages(),
    });

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    dataset: &Path,
    stages: &Path,
    output: Option<&Path>,
    config: EngineConfig,
) -> CliResult<()> {
    eprintln!("📄 Dataset: {}", dataset.display());
    let data = load_dataset(dataset)?;
    let stages = load_stages(stages)?;
    eprintln!("   {} rows, {} columns", data.row_count(), data.column_count());
    eprintln!("   {} stage(s)", stages.len());

    let transformed = run_stages(data, stages, config)?;
    eprintln!("✓ Transformed: {} rows", transformed.row_count());

    let json = serde_json::to_string_pretty(&*transformed)?;
    write_output(&json, output)
}

fn cmd_check(dataset: &Path, stages: &Path, config: EngineConfig) -> CliResult<()> {
    eprintln!("✔ Checking: {}", stages.display());
    let data = load_dataset(dataset)?;
    let stages = load_stages(stages)?;
    if stages.is_empty() {
        return Err(CliError::BadArgument("the stages file has no stages".to_string()));
    }

    let report = check_stages(data, &stages, config);
    for line in &report.lines {
        println!("{}", line);
    }
    match report.failure {
        Some(err) => Err(err.into()),
        None => {
            eprintln!("\n✓ All {} stage(s) valid", stages.len());
            Ok(())
        }
    }
}

fn cmd_type(
    records: &Path,
    types: &str,
    output: Option<&Path>,
    config: &EngineConfig,
) -> CliResult<()> {
    eprintln!("📄 Typing: {}", records.display());
    let raw = RawTable::from_json(&fs::read_to_string(records)?)?;
    let types = parse_type_assignments(types)?;
    eprintln!("   {} rows, columns: {}", raw.row_count(), raw.headers.join(", "));

    let invalid = invalid_rows(&raw, &types, config)?;
    if !invalid.is_empty() {
        eprintln!("   ✗ {} line(s) do not fit their column types", invalid.len());
    }

    let data = type_table(&raw, &types, config)?;
    eprintln!("✓ Typed {} rows", data.row_count());

    let json = serde_json::to_string_pretty(&data)?;
    write_output(&json, output)
}

fn cmd_describe(stages: &Path) -> CliResult<()> {
    for (i, stage) in load_stages(stages)?.iter().enumerate() {
        println!("{}. {}", i + 1, stage);
    }
    Ok(())
}

fn cmd_operators() -> CliResult<()> {
    print!("{}", operators_description());
    Ok(())
}

fn cmd_example_stages() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&example_stages())?);
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    match path {
        Some(p) => Ok(serde_json::from_str(&fs::read_to_string(p)?)?),
        None => Ok(EngineConfig::from_env()),
    }
}

fn load_dataset(path: &Path) -> CliResult<Dataset> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn load_stages(path: &Path) -> CliResult<Vec<Stage>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Build the pipeline stage by stage and apply it. No stages leaves the
/// dataset as it is.
fn run_stages(data: Dataset, stages: Vec<Stage>, config: EngineConfig) -> CliResult<Arc<Dataset>> {
    let mut session = Session::with_config(data, config);
    for (index, stage) in stages.into_iter().enumerate() {
        if index > 0 {
            session.append(index - 1)?;
        }
        session.edit(index, stage)?;
    }
    if session.pipeline().stages().is_empty() {
        return Ok(Arc::clone(session.transformed()));
    }
    Ok(session.apply()?)
}

struct CheckReport {
    lines: Vec<String>,
    failure: Option<PipelineError>,
}

/// One line per stage. Stages after the first failure have no input and
/// are reported as not checked.
fn check_stages(data: Dataset, stages: &[Stage], config: EngineConfig) -> CheckReport {
    let mut pipeline = Pipeline::with_config(data, config);
    let mut lines = Vec::with_capacity(stages.len());
    let mut failure = None;

    for (index, stage) in stages.iter().enumerate() {
        if failure.is_some() {
            lines.push(format!("  - stage {}: not checked ({})", index + 1, stage));
            continue;
        }
        let result = if index > 0 {
            pipeline.append().and_then(|_| pipeline.edit(index, stage.clone()))
        } else {
            pipeline.edit(index, stage.clone())
        };
        match result {
            Ok(out) => lines.push(format!("  ✓ stage {}: {} ({} rows)", index + 1, stage, out.row_count())),
            Err(err) => {
                lines.push(format!("  ✗ stage {}: {}", index + 1, err));
                failure = Some(err);
            }
        }
    }
    CheckReport { lines, failure }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
