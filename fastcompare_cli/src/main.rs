use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fastcompare_common::{
    ensure_config, load_config, save_config, CompareConfig, CompareStrategy, DiffEntry, DiffResult,
};
use fastcompare_core::{DiffEngine, PatchBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CLEAN: u8 = 0;
const EXIT_FAILURE: u8 = 1;
/// The comparison succeeded and found differences
const EXIT_DIFFERENCES: u8 = 2;

#[derive(Parser)]
#[command(name = "fastcompare")]
#[command(author = "FastCompare Contributors")]
#[command(version)]
#[command(about = "Find files that are new or changed in one directory tree relative to another", long_about = None)]
struct Cli {
    /// Keep the settings file next to the executable
    #[arg(long, global = true)]
    portable: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare RIGHT against LEFT and list what is new or changed on the right
    Compare {
        #[command(flatten)]
        run: RunArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare, then copy the differences into a fresh patch directory
    Patch {
        #[command(flatten)]
        run: RunArgs,

        /// Directory the patch is created in
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Label appended to the patch name
        #[arg(short, long, default_value = "patch")]
        label: String,

        /// Keep the patch as a plain directory instead of a zip archive
        #[arg(long)]
        no_compress: bool,
    },

    /// Show the settings file, optionally creating it with defaults
    Config {
        /// Write the default settings if no file exists yet
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Baseline directory (defaults to the saved left path)
    left: Option<PathBuf>,

    /// Directory checked for differences (defaults to the saved right path)
    right: Option<PathBuf>,

    /// Excluded suffixes, separated by '|'
    #[arg(short, long)]
    exclude: Option<String>,

    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Maximum directories compared at once with the bounded-flat strategy
    #[arg(short = 't', long)]
    thread_limit: Option<usize>,

    /// Always compare content, even when modification times match
    #[arg(long)]
    no_date: bool,

    /// After a content match, copy the left modification time to the right file
    #[arg(long, conflicts_with = "no_date")]
    sync_date: bool,

    /// Keep discovery order instead of sorting newest first
    #[arg(long)]
    no_sort: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Persist these settings as the new defaults
    #[arg(long)]
    save: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Normal,
    BoundedFlat,
}

impl From<StrategyArg> for CompareStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Normal => CompareStrategy::Normal,
            StrategyArg::BoundedFlat => CompareStrategy::BoundedFlat,
        }
    }
}

impl RunArgs {
    fn apply(&self, config: &mut CompareConfig) {
        if let Some(left) = &self.left {
            config.left_path = Some(left.clone());
        }
        if let Some(right) = &self.right {
            config.right_path = Some(right.clone());
        }
        if let Some(exclude) = &self.exclude {
            config.set_exclude_suffix_string(exclude);
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if let Some(limit) = self.thread_limit {
            config.thread_limit = limit;
        }
        if self.no_date {
            config.compare_by_date = false;
        }
        if self.sync_date {
            config.compare_by_date = true;
            config.sync_date_on_match = true;
        }
        if self.no_sort {
            config.sort_by_date = false;
        }
        if self.no_progress {
            config.show_progress = false;
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Compare { run, json } => run_compare(&run, json, cli.portable),
        Commands::Patch {
            run,
            out,
            label,
            no_compress,
        } => run_patch(&run, out, &label, no_compress, cli.portable),
        Commands::Config { init } => run_config(init, cli.portable),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Load the saved settings, apply command-line overrides and persist them
/// when `--save` is given.
fn prepare_config(run: &RunArgs, portable: bool) -> Result<CompareConfig> {
    let loaded = load_config(portable).context("failed to load settings")?;
    let mut config = loaded.config.clone();
    run.apply(&mut config);

    if run.save {
        config.last_version = Some(env!("CARGO_PKG_VERSION").to_string());
        save_config(&loaded.path, &config)
            .with_context(|| format!("failed to save settings to {}", loaded.path.display()))?;
        info!("Saved settings to {}", loaded.path.display());
    }

    Ok(config)
}

fn progress_bar(enabled: bool, message: &'static str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message);
    Some(bar)
}

fn compare(config: CompareConfig, show_bar: bool) -> DiffResult {
    let bar = progress_bar(show_bar, "Comparing");
    let mut engine = DiffEngine::new(config);

    if let Some(bar) = bar.clone() {
        engine = engine.with_progress(move |current, total| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        });
    }

    info!("Run {}", engine.run_id());
    let result = engine.compare();

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result
}

fn run_compare(run: &RunArgs, json: bool, portable: bool) -> Result<u8> {
    let config = prepare_config(run, portable)?;
    let report_config = config.clone();
    let result = compare(config, !run.no_progress && !json);

    if json {
        let report = build_json_report(&report_config, &result);
        let output = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{output}");
    } else {
        print_result(&result);
    }

    Ok(exit_code(&result))
}

fn run_patch(
    run: &RunArgs,
    out: Option<PathBuf>,
    label: &str,
    no_compress: bool,
    portable: bool,
) -> Result<u8> {
    let mut config = prepare_config(run, portable)?;
    if let Some(out) = out {
        config.patch_path = Some(out);
    }
    if no_compress {
        config.compress_patch = false;
    }
    if config.patch_path.is_none() {
        bail!("no patch directory given; pass --out or save one in the settings");
    }

    let result = compare(config.clone(), !run.no_progress);
    if !result.is_success() {
        print_result(&result);
        return Ok(EXIT_FAILURE);
    }

    let paths = result.paths();
    if paths.is_empty() {
        info!("No differences, nothing to patch");
        return Ok(EXIT_CLEAN);
    }

    let bar = progress_bar(!run.no_progress, "Copying");
    let mut builder = PatchBuilder::new(&config);
    if let Some(bar) = bar.clone() {
        builder = builder.with_progress(move |index, total| {
            bar.set_length(total as u64);
            bar.set_position(index as u64);
        });
    }

    let outcome = builder
        .create_patch(&paths, label)
        .context("failed to build patch")?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    info!("Patch holds {} entries", outcome.copied.len());
    if let Some(archive) = &outcome.archived {
        info!("Archive: {}", archive.display());
    }
    println!("{}", outcome.final_path_string());
    Ok(EXIT_CLEAN)
}

fn run_config(init: bool, portable: bool) -> Result<u8> {
    let loaded = if init {
        ensure_config(portable).context("failed to create settings file")?
    } else {
        load_config(portable).context("failed to load settings")?
    };

    println!("{}", loaded.path.display());
    if loaded.exists {
        let contents = fs::read_to_string(&loaded.path)
            .with_context(|| format!("failed to read {}", loaded.path.display()))?;
        print!("{contents}");
    } else {
        println!("(not created yet, defaults in use)");
    }
    Ok(EXIT_CLEAN)
}

fn print_result(result: &DiffResult) {
    for entry in result.entries() {
        match entry {
            DiffEntry::Path(path) => println!("{}", path.display()),
            DiffEntry::Error(message) => eprintln!("error: {message}"),
        }
    }

    if result.is_success() {
        info!("{} differences", result.len());
    }
}

fn exit_code(result: &DiffResult) -> u8 {
    if !result.is_success() {
        EXIT_FAILURE
    } else if result.is_empty() {
        EXIT_CLEAN
    } else {
        EXIT_DIFFERENCES
    }
}

#[derive(Serialize)]
struct JsonReport {
    left: Option<String>,
    right: Option<String>,
    strategy: CompareStrategy,
    success: bool,
    summary: JsonSummary,
    paths: Vec<String>,
    diagnostics: Vec<String>,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    paths: usize,
    diagnostics: usize,
}

fn build_json_report(config: &CompareConfig, result: &DiffResult) -> JsonReport {
    let paths: Vec<String> = result
        .paths()
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    let diagnostics: Vec<String> = result.diagnostics().iter().map(|d| d.to_string()).collect();

    JsonReport {
        left: config
            .left_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        right: config
            .right_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        strategy: config.strategy,
        success: result.is_success(),
        summary: JsonSummary {
            total: result.len(),
            paths: paths.len(),
            diagnostics: diagnostics.len(),
        },
        paths,
        diagnostics,
    }
}
