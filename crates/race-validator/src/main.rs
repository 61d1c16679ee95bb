use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use race_validator::config::FileErrorPolicy;
use race_validator::{Pipeline, RaceConfig, ValidationMode};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Planar,
    #[value(name = "adjusted-3d")]
    Adjusted3d,
}

impl From<Mode> for ValidationMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Planar => ValidationMode::Planar,
            Mode::Adjusted3d => ValidationMode::Adjusted3d,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate race tracks against category minimum distances")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the validation mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Keep going past unreadable track files and report them at the end
    #[arg(long)]
    collect_errors: bool,

    /// Reject competitors with no registry entry or no reference category
    #[arg(long)]
    strict: bool,

    /// Number of validation worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Override the output folder
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut RaceConfig) {
        let validation = &mut config.validation;
        if let Some(mode) = self.mode {
            validation.mode = mode.into();
        }
        if self.collect_errors {
            validation.on_file_error = FileErrorPolicy::Collect;
        }
        if self.strict {
            validation.strictness.unknown_category = true;
            validation.strictness.unknown_competitor = true;
        }
        if self.workers.is_some() {
            validation.workers = self.workers;
        }
        if let Some(output) = &self.output {
            config.folders.output_file_folder = output.clone();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = RaceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config);

    tracing::info!(
        "Validating {} against references in {} ({:?})",
        config.folders.input_files_folder.display(),
        config.folders.reference_distance_folder.display(),
        config.validation.mode
    );

    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run()?;

    tracing::info!("Results written to {}", report.output.display());

    if !report.is_clean() {
        for failure in &report.failures {
            tracing::error!("{}: {}", failure.path.display(), failure.error);
        }
        anyhow::bail!(
            "{} track files could not be validated",
            report.failures.len()
        );
    }

    Ok(())
}
