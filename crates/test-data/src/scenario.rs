//! Fluent builder for writing complete race folders to disk.
//!
//! A race folder holds competitor tracks (optionally grouped into category
//! subfolders), one reference track per category, a competitor registry and
//! a `config.json` pointing at all of them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use thiserror::Error;

use crate::gpx::{TrackPointData, generate_gpx};
use crate::registry::{CompetitorRow, write_registry};
use crate::tracks::{ElevationProfile, TrackGenerator};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A reference track defining a category's minimum distance.
#[derive(Debug, Clone)]
pub struct ReferenceFixture {
    pub category: String,
    pub track: TrackGenerator,
}

/// Where a competitor's track comes from.
#[derive(Debug, Clone)]
pub enum TrackSource {
    Generated(TrackGenerator),
    /// Several generated tracks written as separate segments.
    Segments(Vec<TrackGenerator>),
    /// Raw file contents, for malformed inputs.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct CompetitorFixture {
    pub id: String,
    /// Registry row; `None` leaves the competitor out of the registry.
    pub row: Option<CompetitorRow>,
    /// Subfolder of the input folder the track is written to.
    pub folder: Option<String>,
    pub extension: String,
    pub source: TrackSource,
}

impl CompetitorFixture {
    /// A registered competitor riding `distance_m` on a flat course.
    pub fn new(id: impl Into<String>, category: impl Into<String>, distance_m: f64) -> Self {
        let id = id.into();
        Self {
            row: Some(CompetitorRow::new(id.clone(), category)),
            id,
            folder: None,
            extension: "gpx".to_string(),
            source: TrackSource::Generated(TrackGenerator::new().with_distance(distance_m)),
        }
    }

    pub fn team(mut self, team: &str, name: &str, surname: &str) -> Self {
        if let Some(row) = &mut self.row {
            row.team = team.to_string();
            row.name = name.to_string();
            row.surname = surname.to_string();
        }
        self
    }

    pub fn bike(mut self, brand: &str, model: &str) -> Self {
        if let Some(row) = &mut self.row {
            row.bike_brand = brand.to_string();
            row.bike_model = model.to_string();
        }
        self
    }

    pub fn gas_compensation(mut self) -> Self {
        if let Some(row) = &mut self.row {
            row.gas_compensation = true;
        }
        self
    }

    pub fn chicken_way_penalty(mut self) -> Self {
        if let Some(row) = &mut self.row {
            row.chicken_way_penalty = true;
        }
        self
    }

    /// Leaves the registry category blank.
    pub fn without_registry_category(mut self) -> Self {
        if let Some(row) = &mut self.row {
            row.category.clear();
        }
        self
    }

    pub fn unregistered(mut self) -> Self {
        self.row = None;
        self
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn track(mut self, track: TrackGenerator) -> Self {
        self.source = TrackSource::Generated(track);
        self
    }

    pub fn segments(mut self, segments: Vec<TrackGenerator>) -> Self {
        self.source = TrackSource::Segments(segments);
        self
    }

    pub fn raw(mut self, extension: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.extension = extension.to_string();
        self.source = TrackSource::Raw(contents.into());
        self
    }

    /// Applies `f` to the generated track.
    pub fn with_track(mut self, f: impl FnOnce(TrackGenerator) -> TrackGenerator) -> Self {
        if let TrackSource::Generated(track) = self.source {
            self.source = TrackSource::Generated(f(track));
        }
        self
    }
}

/// Paths of a race folder written by [`RaceBuilder::write`].
#[derive(Debug, Clone)]
pub struct RaceFolder {
    pub root: PathBuf,
    pub input_dir: PathBuf,
    pub reference_dir: PathBuf,
    pub output_dir: PathBuf,
    pub competitors_file: PathBuf,
    pub config_file: PathBuf,
}

impl RaceFolder {
    /// Removes the whole folder. Errors are ignored.
    pub fn cleanup(&self) {
        std::fs::remove_dir_all(&self.root).ok();
    }

    /// Every file currently in the output folder, sorted.
    pub fn outputs(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.output_dir)
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default();
        files.sort();
        files
    }
}

/// Builder for race folders.
///
/// # Example
///
/// ```rust,ignore
/// let race = RaceBuilder::new("scenario-a")
///     .reference("Elite", TrackGenerator::new().with_distance(40_000.0))
///     .competitor(CompetitorFixture::new("C1", "Elite", 42_000.0).gas_compensation())
///     .write()?;
/// ```
#[derive(Debug, Clone)]
pub struct RaceBuilder {
    root: PathBuf,
    references: Vec<ReferenceFixture>,
    competitors: Vec<CompetitorFixture>,
    validation: serde_json::Value,
    seed: Option<u64>,
}

static FIXTURE_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl RaceBuilder {
    /// A builder writing into a fresh folder under the system temp dir.
    pub fn new(name: &str) -> Self {
        let unique = FIXTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "race-validator-{name}-{}-{unique}",
            std::process::id()
        ));
        Self::at(root)
    }

    /// A builder writing into `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            references: Vec::new(),
            competitors: Vec::new(),
            validation: json!({}),
            seed: None,
        }
    }

    /// Generates tracks with elevation jitter drawn from a seeded RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn reference(mut self, category: &str, track: TrackGenerator) -> Self {
        self.references.push(ReferenceFixture {
            category: category.to_string(),
            track,
        });
        self
    }

    /// A flat reference track of `distance_m`.
    pub fn reference_distance(self, category: &str, distance_m: f64) -> Self {
        self.reference(category, TrackGenerator::new().with_distance(distance_m))
    }

    pub fn competitor(mut self, competitor: CompetitorFixture) -> Self {
        self.competitors.push(competitor);
        self
    }

    /// Sets a key of the `validation` block of the generated config.
    pub fn validation(mut self, key: &str, value: serde_json::Value) -> Self {
        self.validation[key] = value;
        self
    }

    pub fn write(&self) -> Result<RaceFolder, FixtureError> {
        let folder = RaceFolder {
            root: self.root.clone(),
            input_dir: self.root.join("input"),
            reference_dir: self.root.join("reference"),
            output_dir: self.root.join("results"),
            competitors_file: self.root.join("competitors.csv"),
            config_file: self.root.join("config.json"),
        };

        if folder.root.exists() {
            std::fs::remove_dir_all(&folder.root)?;
        }
        std::fs::create_dir_all(&folder.input_dir)?;
        std::fs::create_dir_all(&folder.reference_dir)?;

        let mut rng = self.seed.map(StdRng::seed_from_u64);
        let mut generate = |track: &TrackGenerator| match rng.as_mut() {
            Some(rng) => track.generate_with(rng),
            None => track.generate(),
        };

        for reference in &self.references {
            let path = folder.reference_dir.join(format!("{}.gpx", reference.category));
            write_track(&path, &[generate(&reference.track)], &reference.category)?;
        }

        let mut rows = Vec::new();
        for competitor in &self.competitors {
            let dir = match &competitor.folder {
                Some(sub) => folder.input_dir.join(sub),
                None => folder.input_dir.clone(),
            };
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.{}", competitor.id, competitor.extension));

            match &competitor.source {
                TrackSource::Generated(track) => {
                    write_track(&path, &[generate(track)], &competitor.id)?
                }
                TrackSource::Segments(tracks) => {
                    let segments: Vec<_> = tracks.iter().map(&mut generate).collect();
                    write_track(&path, &segments, &competitor.id)?
                }
                TrackSource::Raw(contents) => std::fs::write(&path, contents)?,
            }

            if let Some(row) = &competitor.row {
                rows.push(row.clone());
            }
        }
        write_registry(&folder.competitors_file, &rows)?;

        let config = json!({
            "folders": {
                "input_files_folder": folder.input_dir,
                "reference_distance_folder": folder.reference_dir,
                "competitors_db": {
                    "competitors_file": folder.competitors_file,
                    "competitors_sheet": "Competitors",
                    "competitors_table": "CompetitorsList"
                },
                "output_file_folder": folder.output_dir
            },
            "excel_params": {
                "table_name": "RaceResults",
                "sheet_name": "Race Data",
                "table_style_name": "TableStyleMedium9"
            },
            "validation": self.validation,
        });
        std::fs::write(&folder.config_file, serde_json::to_vec_pretty(&config)?)?;

        tracing::debug!(
            "Wrote race folder {} ({} references, {} competitors)",
            folder.root.display(),
            self.references.len(),
            self.competitors.len()
        );
        Ok(folder)
    }
}

fn write_track(
    path: &Path,
    segments: &[Vec<TrackPointData>],
    name: &str,
) -> Result<(), FixtureError> {
    std::fs::write(path, generate_gpx(segments, name))?;
    Ok(())
}

/// A climb profile gaining `gain_m` over `distance_m`.
pub fn steady_climb(distance_m: f64, gain_m: f64) -> ElevationProfile {
    ElevationProfile::Climb {
        base_m: 300.0,
        gain_per_km: gain_m / (distance_m / 1000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_race_folder() {
        let race = RaceBuilder::new("scenario-unit")
            .reference_distance("Elite", 2_000.0)
            .competitor(CompetitorFixture::new("C1", "Elite", 2_100.0).in_folder("Elite"))
            .competitor(CompetitorFixture::new("C2", "Hobby", 1_000.0).unregistered())
            .competitor(CompetitorFixture::new("C3", "Hobby", 0.0).raw("gpx", "not a track"))
            .validation("on_file_error", json!("collect"))
            .write()
            .unwrap();

        assert!(race.reference_dir.join("Elite.gpx").exists());
        assert!(race.input_dir.join("Elite/C1.gpx").exists());
        assert!(race.input_dir.join("C2.gpx").exists());
        assert_eq!(
            std::fs::read_to_string(race.input_dir.join("C3.gpx")).unwrap(),
            "not a track"
        );

        let registry = std::fs::read_to_string(&race.competitors_file).unwrap();
        assert_eq!(registry.lines().count(), 3);
        assert!(!registry.contains("C2"));

        let config: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&race.config_file).unwrap()).unwrap();
        assert_eq!(config["validation"]["on_file_error"], "collect");
        assert!(race.outputs().is_empty());

        race.cleanup();
        assert!(!race.root.exists());
    }
}
