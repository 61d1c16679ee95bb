//! Per-competitor validation: geometry, metadata and reference distance
//! combined into one [`ResultRecord`].

use std::path::{Path, PathBuf};

use crate::config::{Adjustments, RecordGranularity, Strictness, ValidationConfig, ValidationMode};
use crate::discovery;
use crate::errors::ValidationError;
use crate::geometry::{self, TrackGeometry};
use crate::models::{CompetitorMetadata, ResultRecord, Track};
use crate::reference::ReferenceDistanceIndex;
use crate::registry::CompetitorRegistry;
use crate::track_files;

/// Outcome of applying the adjustments to a measured distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scoring {
    pub gas_compensation_km: f64,
    pub chicken_way_penalty_km: f64,
    pub adjusted_distance: f64,
    pub distance_difference: f64,
    pub distance_ok: bool,
}

impl Adjustments {
    /// `distance - gas + chicken`, compared inclusively against `min_distance`.
    pub fn score(
        &self,
        distance: f64,
        gas_compensation: bool,
        chicken_way_penalty: bool,
        min_distance: f64,
    ) -> Scoring {
        let gas_compensation_km = if gas_compensation {
            self.gas_compensation_km
        } else {
            0.0
        };
        let chicken_way_penalty_km = if chicken_way_penalty {
            self.chicken_way_penalty_km
        } else {
            0.0
        };
        let adjusted_distance = distance - gas_compensation_km + chicken_way_penalty_km;
        Scoring {
            gas_compensation_km,
            chicken_way_penalty_km,
            adjusted_distance,
            distance_difference: adjusted_distance - min_distance,
            distance_ok: adjusted_distance >= min_distance,
        }
    }
}

/// Validates competitor tracks against a fully built index and registry.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'a> {
    index: &'a ReferenceDistanceIndex,
    registry: &'a CompetitorRegistry,
    input_root: &'a Path,
    mode: ValidationMode,
    granularity: RecordGranularity,
    adjustments: Adjustments,
    strictness: Strictness,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(
        index: &'a ReferenceDistanceIndex,
        registry: &'a CompetitorRegistry,
        input_root: &'a Path,
        config: &ValidationConfig,
    ) -> Self {
        Self {
            index,
            registry,
            input_root,
            mode: config.mode,
            granularity: config.record_granularity,
            adjustments: config.adjustments,
            strictness: config.strictness,
        }
    }

    /// Parses `path` and returns its records lazily, one per file or one per
    /// track depending on the configured granularity.
    pub fn validate_file(&self, path: &Path) -> Result<FileValidation<'a>, ValidationError> {
        let parsed = track_files::read_track_file(path).map_err(|source| {
            ValidationError::MalformedTrackFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let tracks = match self.granularity {
            RecordGranularity::PerFile => vec![parsed.into_single_track()],
            RecordGranularity::PerSegment if parsed.tracks.is_empty() => vec![Track::default()],
            RecordGranularity::PerSegment => parsed.tracks,
        };
        tracing::debug!("Validating {} ({} tracks)", path.display(), tracks.len());

        Ok(FileValidation {
            engine: *self,
            competitor_id: competitor_id(path),
            path: path.to_path_buf(),
            tracks: tracks.into_iter(),
        })
    }

    /// Validates one track using the current wall clock for untimed tracks.
    pub fn validate_track(
        &self,
        competitor_id: &str,
        path: &Path,
        track: &Track,
    ) -> Result<ResultRecord, ValidationError> {
        self.validate_geometry(competitor_id, path, geometry::extract(track))
    }

    /// Builds the record for an already measured track.
    pub fn validate_geometry(
        &self,
        competitor_id: &str,
        path: &Path,
        geometry: TrackGeometry,
    ) -> Result<ResultRecord, ValidationError> {
        let metadata = self.resolve_metadata(competitor_id)?;
        let category = metadata
            .category
            .clone()
            .or_else(|| discovery::category_dir(self.input_root, path));

        if self.strictness.unknown_category && !self.index.contains(category.as_deref()) {
            return Err(ValidationError::UnknownCategory {
                competitor_id: competitor_id.to_string(),
                category,
            });
        }
        let min_distance = self.index.lookup(category.as_deref());

        let scoring = match self.mode {
            ValidationMode::Planar => {
                self.adjustments
                    .score(geometry.distance2d, false, false, min_distance)
            }
            ValidationMode::Adjusted3d => self.adjustments.score(
                geometry.distance3d,
                metadata.gas_compensation,
                metadata.chicken_way_penalty,
                min_distance,
            ),
        };

        Ok(ResultRecord {
            competitor_id: competitor_id.to_string(),
            team: metadata.team,
            name: metadata.name,
            surname: metadata.surname,
            bike_brand: metadata.bike_brand,
            bike_model: metadata.bike_model,
            category,
            start_time: geometry.start_time,
            finish_time: geometry.finish_time,
            elapsed_seconds: geometry.elapsed_seconds,
            distance2d: geometry.distance2d,
            distance3d: geometry.distance3d,
            min_distance,
            gas_compensation: metadata.gas_compensation,
            chicken_way_penalty: metadata.chicken_way_penalty,
            gas_compensation_km: scoring.gas_compensation_km,
            chicken_way_penalty_km: scoring.chicken_way_penalty_km,
            adjusted_distance: scoring.adjusted_distance,
            distance_difference: scoring.distance_difference,
            distance_ok: scoring.distance_ok,
            no_time: geometry.no_time,
            source: path.to_path_buf(),
        })
    }

    fn resolve_metadata(&self, competitor_id: &str) -> Result<CompetitorMetadata, ValidationError> {
        if !self.mode.uses_registry() {
            return Ok(CompetitorMetadata::unknown());
        }
        match self.registry.get(competitor_id) {
            Some(metadata) => Ok(metadata.clone()),
            None if self.strictness.unknown_competitor => Err(ValidationError::UnknownCompetitor {
                competitor_id: competitor_id.to_string(),
            }),
            None => {
                tracing::warn!("Competitor {competitor_id} not found in registry");
                Ok(CompetitorMetadata::unknown())
            }
        }
    }
}

/// Competitor id for a track file: its name without extension.
pub fn competitor_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lazily validated records for one competitor file.
///
/// Each track is measured only when the iterator reaches it.
#[derive(Debug)]
pub struct FileValidation<'a> {
    engine: ValidationEngine<'a>,
    competitor_id: String,
    path: PathBuf,
    tracks: std::vec::IntoIter<Track>,
}

impl Iterator for FileValidation<'_> {
    type Item = Result<ResultRecord, ValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let track = self.tracks.next()?;
        Some(
            self.engine
                .validate_track(&self.competitor_id, &self.path, &track),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tracks.size_hint()
    }
}
