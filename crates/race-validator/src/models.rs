use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime};

/// A single recorded position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub timestamp: Option<OffsetDateTime>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            timestamp: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn point(&self) -> geo::Point {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Ordered points recorded during one run. May be empty.
///
/// A track joined from several segments remembers where each later segment
/// starts, so distances are not measured across the gap between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub points: Vec<GeoPoint>,
    /// Indices into `points` where a new segment begins, ascending, never 0.
    segment_starts: Vec<usize>,
}

impl Track {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self {
            points,
            segment_starts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Joins tracks end to end, keeping document order and segment
    /// boundaries.
    pub fn concat(tracks: impl IntoIterator<Item = Track>) -> Track {
        let mut joined = Track::default();
        for track in tracks {
            if track.is_empty() {
                continue;
            }
            let offset = joined.points.len();
            if offset > 0 {
                joined.segment_starts.push(offset);
            }
            joined
                .segment_starts
                .extend(track.segment_starts.iter().map(|start| start + offset));
            joined.points.extend(track.points);
        }
        joined
    }

    /// The contiguous runs of points, one per joined segment.
    pub fn segments(&self) -> impl Iterator<Item = &[GeoPoint]> {
        let starts = std::iter::once(0).chain(self.segment_starts.iter().copied());
        let ends = self
            .segment_starts
            .iter()
            .copied()
            .chain(std::iter::once(self.points.len()));
        starts.zip(ends).map(|(start, end)| &self.points[start..end])
    }
}

/// Registry entry for one competitor.
///
/// Unknown competitors resolve to [`CompetitorMetadata::unknown`], where
/// every descriptive field is `None` and both flags are off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorMetadata {
    pub competitor_id: Option<String>,
    pub team: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub bike_brand: Option<String>,
    pub bike_model: Option<String>,
    pub category: Option<String>,
    pub gas_compensation: bool,
    pub chicken_way_penalty: bool,
}

impl CompetitorMetadata {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.competitor_id.is_none()
    }
}

/// Minimum distances derived from one category's reference track.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub category: String,
    pub min_distance2d: f64,
    pub min_distance3d: f64,
    pub source: PathBuf,
}

/// One validated line of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub competitor_id: String,
    pub team: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub bike_brand: Option<String>,
    pub bike_model: Option<String>,
    pub category: Option<String>,
    pub start_time: PrimitiveDateTime,
    pub finish_time: PrimitiveDateTime,
    pub elapsed_seconds: f64,
    pub distance2d: f64,
    pub distance3d: f64,
    pub min_distance: f64,
    pub gas_compensation: bool,
    pub chicken_way_penalty: bool,
    /// Kilometres actually subtracted for gas compensation (0 when off).
    pub gas_compensation_km: f64,
    /// Kilometres actually added for the chicken-way penalty (0 when off).
    pub chicken_way_penalty_km: f64,
    pub adjusted_distance: f64,
    pub distance_difference: f64,
    pub distance_ok: bool,
    pub no_time: bool,
    pub source: PathBuf,
}
