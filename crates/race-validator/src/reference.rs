//! Category minimum distances measured from reference tracks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discovery;
use crate::errors::PipelineError;
use crate::geometry;
use crate::models::{ReferenceEntry, Track};
use crate::track_files;

/// Where a reference file's category key comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKey {
    /// `Elite.gpx` -> `Elite`
    #[default]
    FileStem,
    /// `Elite/route.gpx` -> `Elite`
    ParentDir,
}

impl ReferenceKey {
    pub fn category_for(self, path: &Path) -> Option<String> {
        let component = match self {
            ReferenceKey::FileStem => path.file_stem(),
            ReferenceKey::ParentDir => path.parent().and_then(Path::file_name),
        };
        component.and_then(|c| c.to_str()).map(str::to_string)
    }
}

/// Which distance a reference track contributes as the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Planar,
    Spatial,
}

#[derive(Debug, Clone)]
pub struct ReferenceDistanceIndex {
    metric: DistanceMetric,
    entries: HashMap<String, ReferenceEntry>,
}

impl ReferenceDistanceIndex {
    pub fn empty(metric: DistanceMetric) -> Self {
        Self {
            metric,
            entries: HashMap::new(),
        }
    }

    /// Builds the index from already-parsed reference tracks. A category
    /// seen twice keeps the later track.
    pub fn build(
        references: impl IntoIterator<Item = (String, PathBuf, Track)>,
        metric: DistanceMetric,
    ) -> Self {
        let mut index = Self::empty(metric);
        for (category, source, track) in references {
            index.insert(category, source, &track);
        }
        index
    }

    /// Discovers, parses and measures every reference track under `root`,
    /// in sorted path order.
    pub fn from_folder(
        root: &Path,
        key: ReferenceKey,
        metric: DistanceMetric,
    ) -> Result<Self, PipelineError> {
        let files = discovery::discover_track_files(root)?;
        let mut index = Self::empty(metric);

        for path in files {
            let Some(category) = key.category_for(&path) else {
                tracing::warn!("Cannot derive a category from {}, skipping", path.display());
                continue;
            };
            let parsed = track_files::read_track_file(&path).map_err(|source| {
                PipelineError::Reference {
                    path: path.clone(),
                    source,
                }
            })?;
            index.insert(category, path, &parsed.into_single_track());
        }

        tracing::info!(
            "Indexed {} reference categories from {}",
            index.len(),
            root.display()
        );
        Ok(index)
    }

    fn insert(&mut self, category: String, source: PathBuf, track: &Track) {
        let measured = geometry::extract(track);
        let entry = ReferenceEntry {
            category: category.clone(),
            min_distance2d: measured.distance2d,
            min_distance3d: measured.distance3d,
            source,
        };
        tracing::debug!(
            "Reference {category}: {:.3} km 2d, {:.3} km 3d",
            entry.min_distance2d,
            entry.min_distance3d
        );
        if let Some(previous) = self.entries.insert(category.clone(), entry) {
            tracing::warn!(
                "Category {category} defined by both {} and a later reference, keeping the later one",
                previous.source.display()
            );
        }
    }

    pub fn get(&self, category: &str) -> Option<&ReferenceEntry> {
        self.entries.get(category)
    }

    /// Minimum distance for `category`; 0 when the category is unknown.
    pub fn lookup(&self, category: Option<&str>) -> f64 {
        category
            .and_then(|c| self.get(c))
            .map_or(0.0, |entry| match self.metric {
                DistanceMetric::Planar => entry.min_distance2d,
                DistanceMetric::Spatial => entry.min_distance3d,
            })
    }

    pub fn contains(&self, category: Option<&str>) -> bool {
        category.is_some_and(|c| self.entries.contains_key(c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
