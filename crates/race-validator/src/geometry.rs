//! Distance and timing extraction for a single [`Track`].
//!
//! Distances are summed per segment. Timing spans the whole track, from the
//! first point to the last timestamped one.

use geo::{Distance as _, Haversine};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::models::{GeoPoint, Track};

const METERS_PER_KM: f64 = 1000.0;

/// Elapsed times below this many seconds are flagged as "no time".
pub const NO_TIME_THRESHOLD_SECONDS: f64 = 1.0;

/// Distances (km) and timing measured over one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGeometry {
    pub distance2d: f64,
    pub distance3d: f64,
    pub start_time: PrimitiveDateTime,
    pub finish_time: PrimitiveDateTime,
    pub elapsed_seconds: f64,
    pub no_time: bool,
}

pub trait TrackMetric {
    type Score;
    fn next_point(&mut self, point: &GeoPoint);
    /// Called between segments. The next point starts a new run.
    fn end_segment(&mut self) {}
    fn finish(&mut self) -> Self::Score;
}

/// Measures a track using the local wall clock for untimed tracks.
pub fn extract(track: &Track) -> TrackGeometry {
    extract_at(track, local_now())
}

/// Measures a track, using `now` as start and finish when the track has no
/// usable timing.
pub fn extract_at(track: &Track, now: PrimitiveDateTime) -> TrackGeometry {
    let mut planar = PlanarDistanceMetric::default();
    let mut spatial = SpatialDistanceMetric::default();
    for segment in track.segments() {
        for point in segment {
            planar.next_point(point);
            spatial.next_point(point);
        }
        planar.end_segment();
        spatial.end_segment();
    }

    let (start_time, finish_time) = track_times(track).unwrap_or((now, now));
    let elapsed_seconds = (finish_time - start_time).as_seconds_f64();

    TrackGeometry {
        distance2d: planar.finish() / METERS_PER_KM,
        distance3d: spatial.finish() / METERS_PER_KM,
        start_time,
        finish_time,
        elapsed_seconds,
        no_time: elapsed_seconds < NO_TIME_THRESHOLD_SECONDS,
    }
}

/// Start and finish for a track with at least two points whose first point
/// is timestamped.
fn track_times(track: &Track) -> Option<(PrimitiveDateTime, PrimitiveDateTime)> {
    if track.len() < 2 {
        return None;
    }
    let start = track.points.first()?.timestamp?;
    let finish = track
        .points
        .iter()
        .rev()
        .find_map(|p| p.timestamp)
        .unwrap_or(start);
    Some((naive(start), naive(finish)))
}

/// Drops the UTC offset, keeping the wall-clock reading.
pub fn naive(dt: OffsetDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(dt.date(), dt.time())
}

pub fn local_now() -> PrimitiveDateTime {
    naive(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
}

/// Great-circle distance in meters, ignoring elevation.
#[derive(Debug, Clone, Default)]
struct PlanarDistanceMetric {
    total_distance: f64,
    last_point: Option<geo::Point>,
}

impl TrackMetric for PlanarDistanceMetric {
    type Score = f64;
    fn next_point(&mut self, point: &GeoPoint) {
        self.total_distance += self
            .last_point
            .map_or(0.0, |prev| Haversine.distance(prev, point.point()));
        self.last_point = Some(point.point());
    }

    fn end_segment(&mut self) {
        self.last_point = None;
    }

    fn finish(&mut self) -> f64 {
        self.total_distance
    }
}

/// Distance in meters combining each horizontal step with its elevation
/// change. Steps where either end lacks an elevation count as horizontal.
#[derive(Debug, Clone, Default)]
struct SpatialDistanceMetric {
    total_distance: f64,
    last_point: Option<GeoPoint>,
}

impl TrackMetric for SpatialDistanceMetric {
    type Score = f64;
    fn next_point(&mut self, point: &GeoPoint) {
        if let Some(prev) = &self.last_point {
            let horizontal = Haversine.distance(prev.point(), point.point());
            self.total_distance += match (prev.elevation, point.elevation) {
                (Some(from), Some(to)) => horizontal.hypot(to - from),
                _ => horizontal,
            };
        }
        self.last_point = Some(*point);
    }

    fn end_segment(&mut self) {
        self.last_point = None;
    }

    fn finish(&mut self) -> f64 {
        self.total_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    const EARTH_RADIUS_M: f64 = 6_371_008.8;

    fn meters_to_lat_degrees(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_M).to_degrees()
    }

    fn northbound(steps: usize, step_m: f64, climb_m: f64) -> Track {
        let start = datetime!(2024-05-12 08:00 UTC);
        let points = (0..=steps)
            .map(|i| {
                GeoPoint::new(45.0 + meters_to_lat_degrees(step_m * i as f64), 7.0)
                    .with_elevation(300.0 + climb_m * i as f64)
                    .with_timestamp(start + Duration::seconds(30 * i as i64))
            })
            .collect();
        Track::new(points)
    }

    fn now() -> PrimitiveDateTime {
        datetime!(2025-01-01 12:00)
    }

    #[test]
    fn test_planar_distance_along_meridian() {
        let geometry = extract_at(&northbound(10, 100.0, 0.0), now());
        assert!((geometry.distance2d - 1.0).abs() < 1e-6);
        assert!((geometry.distance3d - geometry.distance2d).abs() < 1e-9);
    }

    #[test]
    fn test_spatial_distance_includes_climb() {
        let geometry = extract_at(&northbound(4, 300.0, 400.0), now());
        assert!((geometry.distance2d - 1.2).abs() < 1e-6);
        // Each 300 m step climbs 400 m: 500 m of travel
        assert!((geometry.distance3d - 2.0).abs() < 1e-6);
        assert!(geometry.distance3d >= geometry.distance2d);
    }

    #[test]
    fn test_missing_elevation_counts_as_flat_step() {
        let mut track = northbound(2, 300.0, 400.0);
        track.points[1].elevation = None;
        let geometry = extract_at(&track, now());
        assert!((geometry.distance3d - geometry.distance2d).abs() < 1e-9);
    }

    #[test]
    fn test_timing_from_first_and_last_points() {
        let geometry = extract_at(&northbound(4, 100.0, 0.0), now());
        assert_eq!(geometry.start_time, datetime!(2024-05-12 08:00));
        assert_eq!(geometry.finish_time, datetime!(2024-05-12 08:02));
        assert_eq!(geometry.elapsed_seconds, 120.0);
        assert!(!geometry.no_time);
    }

    #[test]
    fn test_missing_first_timestamp_uses_now() {
        let mut track = northbound(4, 100.0, 0.0);
        track.points[0].timestamp = None;
        let geometry = extract_at(&track, now());
        assert_eq!(geometry.start_time, now());
        assert_eq!(geometry.finish_time, now());
        assert_eq!(geometry.elapsed_seconds, 0.0);
        assert!(geometry.no_time);
        assert!(geometry.distance2d > 0.0);
    }

    #[test]
    fn test_sub_second_elapsed_is_no_time() {
        let start = datetime!(2024-05-12 08:00 UTC);
        let track = Track::new(vec![
            GeoPoint::new(45.0, 7.0).with_timestamp(start),
            GeoPoint::new(45.001, 7.0).with_timestamp(start + Duration::milliseconds(500)),
        ]);
        let geometry = extract_at(&track, now());
        assert_eq!(geometry.elapsed_seconds, 0.5);
        assert!(geometry.no_time);
    }

    #[test]
    fn test_degenerate_tracks() {
        let empty = extract_at(&Track::default(), now());
        assert_eq!(empty.distance2d, 0.0);
        assert_eq!(empty.distance3d, 0.0);
        assert!(empty.no_time);
        assert_eq!(empty.start_time, now());

        let single = Track::new(vec![
            GeoPoint::new(45.0, 7.0)
                .with_elevation(100.0)
                .with_timestamp(datetime!(2024-05-12 08:00 UTC)),
        ]);
        let single = extract_at(&single, now());
        assert_eq!(single.distance3d, 0.0);
        assert_eq!(single.finish_time, now());
        assert!(single.no_time);
    }

    #[test]
    fn test_gap_between_segments_is_not_counted() {
        let start = datetime!(2024-05-12 08:00 UTC);
        let first = northbound(10, 100.0, 0.0);
        // Second leg begins 5 km further north and 10 minutes later
        let second = Track::new(
            (0..=20)
                .map(|i| {
                    GeoPoint::new(45.0 + meters_to_lat_degrees(6_000.0 + 100.0 * i as f64), 7.0)
                        .with_elevation(300.0)
                        .with_timestamp(start + Duration::seconds(900 + 30 * i as i64))
                })
                .collect(),
        );

        let joined = Track::concat([first, second]);
        let geometry = extract_at(&joined, now());
        assert!((geometry.distance2d - 3.0).abs() < 1e-6);
        assert!((geometry.distance3d - 3.0).abs() < 1e-6);
        assert_eq!(geometry.start_time, datetime!(2024-05-12 08:00));
        assert_eq!(geometry.finish_time, datetime!(2024-05-12 08:25));
        assert_eq!(geometry.elapsed_seconds, 1500.0);

        // The same points as one segment do count the jump
        let flat = extract_at(&Track::new(joined.points.clone()), now());
        assert!((flat.distance2d - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_offset_is_dropped_not_converted() {
        let track = Track::new(vec![
            GeoPoint::new(45.0, 7.0).with_timestamp(datetime!(2024-05-12 10:00 +02:00)),
            GeoPoint::new(45.001, 7.0).with_timestamp(datetime!(2024-05-12 11:00 +02:00)),
        ]);
        let geometry = extract_at(&track, now());
        assert_eq!(geometry.start_time, datetime!(2024-05-12 10:00));
        assert_eq!(geometry.elapsed_seconds, 3600.0);
    }
}
