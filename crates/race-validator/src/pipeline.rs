//! Batch run: build the index and registry, validate every competitor file
//! on a worker pool, then hand the ordered records to the aggregator.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::{FileErrorPolicy, RaceConfig};
use crate::discovery;
use crate::errors::{FileFailure, PipelineError, ValidationError};
use crate::export::{CsvExporter, ResultAggregator};
use crate::geometry;
use crate::models::ResultRecord;
use crate::reference::ReferenceDistanceIndex;
use crate::registry::CompetitorRegistry;
use crate::validation::ValidationEngine;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport<O> {
    pub records: Vec<ResultRecord>,
    pub failures: Vec<FileFailure>,
    pub output: O,
}

impl<O> RunReport<O> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline {
    config: RaceConfig,
    index: ReferenceDistanceIndex,
    registry: CompetitorRegistry,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Loads the reference index and the registry. Both are read-only
    /// once this returns.
    pub fn new(config: RaceConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let validation = &config.validation;

        let index = ReferenceDistanceIndex::from_folder(
            &config.folders.reference_distance_folder,
            validation.reference_key,
            validation.mode.distance_metric(),
        )?;

        let registry = match &config.folders.competitors_db {
            Some(db) if validation.mode.uses_registry() => {
                if db.competitors_sheet.is_some() || db.competitors_table.is_some() {
                    tracing::debug!("Registry sheet/table names do not apply to CSV registries");
                }
                CompetitorRegistry::load(&db.competitors_file)?
            }
            Some(_) => {
                tracing::info!("Planar mode: competitor registry not loaded");
                CompetitorRegistry::empty()
            }
            None => {
                tracing::warn!("No competitor registry configured, all competitors are unknown");
                CompetitorRegistry::empty()
            }
        };

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = validation.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;

        Ok(Self {
            config,
            index,
            registry,
            pool,
        })
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn index(&self) -> &ReferenceDistanceIndex {
        &self.index
    }

    pub fn registry(&self) -> &CompetitorRegistry {
        &self.registry
    }

    pub fn engine(&self) -> ValidationEngine<'_> {
        ValidationEngine::new(
            &self.index,
            &self.registry,
            &self.config.folders.input_files_folder,
            &self.config.validation,
        )
    }

    /// Validates every competitor file and returns records sorted by
    /// competitor id, plus the files that failed when failures are collected.
    pub fn validate_all(&self) -> Result<(Vec<ResultRecord>, Vec<FileFailure>), PipelineError> {
        let input_root = &self.config.folders.input_files_folder;
        let files = discovery::discover_track_files(input_root)?;
        tracing::info!(
            "Validating {} competitor files from {}",
            files.len(),
            input_root.display()
        );

        let engine = self.engine();
        let outcomes: Vec<(PathBuf, Result<Vec<ResultRecord>, ValidationError>)> =
            self.pool.install(|| {
                files
                    .par_iter()
                    .map(|path| (path.clone(), validate_one(&engine, path)))
                    .collect()
            });

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(mut file_records) => records.append(&mut file_records),
                Err(error) => match self.config.validation.on_file_error {
                    FileErrorPolicy::Abort => return Err(error.into()),
                    FileErrorPolicy::Collect => {
                        tracing::error!("Skipping {}: {error}", path.display());
                        failures.push(FileFailure { path, error });
                    }
                },
            }
        }

        records.sort_by(|a, b| {
            a.competitor_id
                .cmp(&b.competitor_id)
                .then_with(|| a.source.cmp(&b.source))
        });

        let short = records.iter().filter(|r| !r.distance_ok).count();
        let untimed = records.iter().filter(|r| r.no_time).count();
        tracing::info!(
            "Validated {} records: {} short of the minimum distance, {} without usable time",
            records.len(),
            short,
            untimed
        );

        Ok((records, failures))
    }

    /// Validates everything and passes the records to `aggregator`. Nothing
    /// reaches the aggregator when the run aborts.
    pub fn run_with<A: ResultAggregator>(
        &self,
        aggregator: &mut A,
    ) -> Result<RunReport<A::Output>, PipelineError> {
        let (records, failures) = self.validate_all()?;
        let output = aggregator.aggregate(&records)?;
        Ok(RunReport {
            records,
            failures,
            output,
        })
    }

    /// Validates everything into a timestamped CSV in the output folder.
    pub fn run(&self) -> Result<RunReport<PathBuf>, PipelineError> {
        let mut exporter = CsvExporter::new(
            &self.config.folders.output_file_folder,
            self.config.validation.mode,
            self.config.excel_params.clone(),
            geometry::local_now(),
        );
        self.run_with(&mut exporter)
    }
}

fn validate_one(engine: &ValidationEngine<'_>, path: &Path) -> Result<Vec<ResultRecord>, ValidationError> {
    engine.validate_file(path)?.collect()
}
