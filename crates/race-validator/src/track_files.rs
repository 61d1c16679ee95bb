//! Track file parsers for GPX, TCX, and FIT formats.
//!
//! Every format is reduced to the same shape: a list of [`Track`]s in
//! document order, each holding lat/lon/elevation/timestamp points.

use std::io::BufReader;
use std::path::Path;

use time::OffsetDateTime;

use crate::errors::TrackFileError;
use crate::models::{GeoPoint, Track};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackFormat {
    Gpx,
    Tcx,
    Fit,
    Other,
}

impl TrackFormat {
    /// Detects the format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("gpx") => TrackFormat::Gpx,
            Some("tcx") => TrackFormat::Tcx,
            Some("fit") => TrackFormat::Fit,
            _ => TrackFormat::Other,
        }
    }

    /// Sniffs the format from the leading bytes of a file.
    pub fn detect_from_bytes(bytes: &[u8]) -> Self {
        // FIT header: size byte, then ".FIT" at offset 8
        if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
            return TrackFormat::Fit;
        }
        let head = &bytes[..bytes.len().min(512)];
        let head = String::from_utf8_lossy(head);
        if head.contains("<gpx") {
            TrackFormat::Gpx
        } else if head.contains("<TrainingCenterDatabase") {
            TrackFormat::Tcx
        } else {
            TrackFormat::Other
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, TrackFormat::Other)
    }
}

/// All tracks found in one file.
#[derive(Debug, Clone, Default)]
pub struct ParsedTrackFile {
    pub tracks: Vec<Track>,
}

impl ParsedTrackFile {
    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Collapses every track into a single one.
    pub fn into_single_track(self) -> Track {
        Track::concat(self.tracks)
    }
}

/// Reads and parses a track file, picking the parser from the extension
/// and falling back to content sniffing.
pub fn read_track_file(path: &Path) -> Result<ParsedTrackFile, TrackFileError> {
    let bytes = std::fs::read(path)?;
    let format = match TrackFormat::from_path(path) {
        TrackFormat::Other => TrackFormat::detect_from_bytes(&bytes),
        format => format,
    };
    parse_track_bytes(format, &bytes)
}

pub fn parse_track_bytes(
    format: TrackFormat,
    bytes: &[u8],
) -> Result<ParsedTrackFile, TrackFileError> {
    match format {
        TrackFormat::Gpx => parse_gpx(bytes),
        TrackFormat::Tcx => parse_tcx(bytes),
        TrackFormat::Fit => parse_fit(bytes),
        TrackFormat::Other => Err(TrackFileError::UnsupportedFormat(format)),
    }
}

/// Parse a GPX file. Each track segment becomes one [`Track`].
pub fn parse_gpx(bytes: &[u8]) -> Result<ParsedTrackFile, TrackFileError> {
    let gpx = gpx::read(bytes).map_err(|e| TrackFileError::Gpx(e.to_string()))?;

    let mut tracks = Vec::new();
    for track in &gpx.tracks {
        for seg in &track.segments {
            let points = seg
                .points
                .iter()
                .map(|pt| GeoPoint {
                    lat: pt.point().y(),
                    lon: pt.point().x(),
                    elevation: pt.elevation,
                    timestamp: pt.time.map(OffsetDateTime::from),
                })
                .collect();
            tracks.push(Track::new(points));
        }
    }

    Ok(ParsedTrackFile { tracks })
}

/// Parse a TCX (Training Center XML) file. Each lap track becomes one [`Track`].
pub fn parse_tcx(bytes: &[u8]) -> Result<ParsedTrackFile, TrackFileError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut buf_reader = BufReader::new(cursor);

    let tcx_data =
        tcx::read(&mut buf_reader).map_err(|e| TrackFileError::Tcx(format!("{e:?}")))?;

    let mut tracks = Vec::new();

    if let Some(ref activities) = tcx_data.activities {
        for activity in &activities.activities {
            for lap in &activity.laps {
                for track in &lap.tracks {
                    let mut points = Vec::new();
                    for trackpoint in &track.trackpoints {
                        let Some(ref position) = trackpoint.position else {
                            continue;
                        };

                        points.push(GeoPoint {
                            lat: position.latitude,
                            lon: position.longitude,
                            elevation: trackpoint.altitude_meters,
                            timestamp: Some(chrono_to_offset_datetime_utc(&trackpoint.time)),
                        });
                    }
                    tracks.push(Track::new(points));
                }
            }
        }
    }

    Ok(ParsedTrackFile { tracks })
}

/// Convert chrono DateTime<Utc> to time OffsetDateTime
fn chrono_to_offset_datetime_utc(dt: &chrono::DateTime<chrono::Utc>) -> OffsetDateTime {
    let ts = dt.timestamp();
    let ns = dt.timestamp_subsec_nanos();

    OffsetDateTime::from_unix_timestamp(ts)
        .map(|odt| odt.replace_nanosecond(ns).unwrap_or(odt))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn chrono_to_offset_datetime_local(dt: &chrono::DateTime<chrono::Local>) -> OffsetDateTime {
    use chrono::Utc;
    let utc_dt = dt.with_timezone(&Utc);
    chrono_to_offset_datetime_utc(&utc_dt)
}

/// Parse a FIT file. Record messages with a position form a single [`Track`].
pub fn parse_fit(bytes: &[u8]) -> Result<ParsedTrackFile, TrackFileError> {
    let fit_data = fitparser::from_bytes(bytes).map_err(|e| TrackFileError::Fit(e.to_string()))?;

    let mut points = Vec::new();

    for record in fit_data {
        if record.kind() != fitparser::profile::field_types::MesgNum::Record {
            continue;
        }

        let mut lat: Option<f64> = None;
        let mut lon: Option<f64> = None;
        let mut elevation: Option<f64> = None;
        let mut timestamp: Option<OffsetDateTime> = None;

        for field in record.fields() {
            match field.name() {
                "position_lat" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        lat = Some(semicircles_to_degrees(*v));
                    }
                }
                "position_long" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        lon = Some(semicircles_to_degrees(*v));
                    }
                }
                "altitude" | "enhanced_altitude" => {
                    elevation = extract_fit_f64(field.value()).or(elevation);
                }
                "timestamp" => {
                    if let fitparser::Value::Timestamp(t) = field.value() {
                        timestamp = Some(chrono_to_offset_datetime_local(t));
                    }
                }
                _ => {}
            }
        }

        if let (Some(lat), Some(lon)) = (lat, lon) {
            points.push(GeoPoint {
                lat,
                lon,
                elevation,
                timestamp,
            });
        }
    }

    Ok(ParsedTrackFile {
        tracks: vec![Track::new(points)],
    })
}

/// Convert FIT semicircles to degrees.
/// FIT uses semicircles where 2^31 semicircles = 180 degrees.
fn semicircles_to_degrees(semicircles: i32) -> f64 {
    (semicircles as f64) * (180.0 / 2_147_483_648.0)
}

fn extract_fit_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SEGMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="unit-test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Loop</name>
    <trkseg>
      <trkpt lat="45.0000000" lon="7.0000000"><ele>300.00</ele><time>2024-05-12T08:00:00Z</time></trkpt>
      <trkpt lat="45.0010000" lon="7.0000000"><ele>305.00</ele><time>2024-05-12T08:01:00Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="45.0020000" lon="7.0000000"></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

    #[test]
    fn test_semicircles_to_degrees() {
        assert!((semicircles_to_degrees(2_147_483_647) - 180.0).abs() < 0.0001);
        assert!((semicircles_to_degrees(0) - 0.0).abs() < 0.0001);
        assert!((semicircles_to_degrees(-2_147_483_648) - (-180.0)).abs() < 0.0001);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TrackFormat::from_path(Path::new("a/C1.gpx")), TrackFormat::Gpx);
        assert_eq!(TrackFormat::from_path(Path::new("C1.GPX")), TrackFormat::Gpx);
        assert_eq!(TrackFormat::from_path(Path::new("ride.tcx")), TrackFormat::Tcx);
        assert_eq!(TrackFormat::from_path(Path::new("ride.Fit")), TrackFormat::Fit);
        assert_eq!(TrackFormat::from_path(Path::new("notes.txt")), TrackFormat::Other);
        assert_eq!(TrackFormat::from_path(Path::new("no_extension")), TrackFormat::Other);
    }

    #[test]
    fn test_format_detection() {
        let mut fit_bytes = vec![14u8, 0, 0, 0, 0, 0, 0, 0];
        fit_bytes.extend_from_slice(b".FIT");
        fit_bytes.extend_from_slice(&[0, 0]);
        assert_eq!(TrackFormat::detect_from_bytes(&fit_bytes), TrackFormat::Fit);

        let gpx_bytes = b"<?xml version=\"1.0\"?><gpx version=\"1.1\">";
        assert_eq!(TrackFormat::detect_from_bytes(gpx_bytes), TrackFormat::Gpx);

        let tcx_bytes = b"<?xml version=\"1.0\"?><TrainingCenterDatabase>";
        assert_eq!(TrackFormat::detect_from_bytes(tcx_bytes), TrackFormat::Tcx);

        let unknown_bytes = b"random data that is not a valid file";
        assert_eq!(TrackFormat::detect_from_bytes(unknown_bytes), TrackFormat::Other);
    }

    #[test]
    fn test_parse_gpx_keeps_segments_apart() {
        let parsed = parse_gpx(TWO_SEGMENTS.as_bytes()).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
        assert_eq!(parsed.point_count(), 3);

        let first = &parsed.tracks[0].points[0];
        assert!((first.lat - 45.0).abs() < 1e-9);
        assert!((first.lon - 7.0).abs() < 1e-9);
        assert_eq!(first.elevation, Some(300.0));
        assert!(first.timestamp.is_some());

        let last = &parsed.tracks[1].points[0];
        assert_eq!(last.elevation, None);
        assert_eq!(last.timestamp, None);

        assert_eq!(parsed.into_single_track().len(), 3);
    }

    const ONE_LAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2024-05-12T08:00:00Z</Id>
      <Lap StartTime="2024-05-12T08:00:00Z">
        <TotalTimeSeconds>120.0</TotalTimeSeconds>
        <DistanceMeters>222.0</DistanceMeters>
        <Calories>10</Calories>
        <Intensity>Active</Intensity>
        <TriggerMethod>Manual</TriggerMethod>
        <Track>
          <Trackpoint>
            <Time>2024-05-12T08:00:00Z</Time>
            <Position>
              <LatitudeDegrees>45.0</LatitudeDegrees>
              <LongitudeDegrees>7.0</LongitudeDegrees>
            </Position>
            <AltitudeMeters>300.0</AltitudeMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-05-12T08:00:30Z</Time>
            <AltitudeMeters>302.0</AltitudeMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-05-12T08:01:00Z</Time>
            <Position>
              <LatitudeDegrees>45.001</LatitudeDegrees>
              <LongitudeDegrees>7.0</LongitudeDegrees>
            </Position>
            <AltitudeMeters>305.0</AltitudeMeters>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>
"#;

    // Seconds between the unix epoch and 1989-12-31T00:00:00Z
    const FIT_EPOCH_OFFSET: i64 = 631_065_600;

    fn fit_crc(bytes: &[u8]) -> u16 {
        const TABLE: [u16; 16] = [
            0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00,
            0x7800, 0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
        ];
        bytes.iter().fold(0u16, |mut crc, &byte| {
            for nibble in [byte & 0x0F, byte >> 4] {
                let tmp = TABLE[(crc & 0x0F) as usize];
                crc = (crc >> 4) & 0x0FFF;
                crc = crc ^ tmp ^ TABLE[nibble as usize];
            }
            crc
        })
    }

    /// A FIT file with one Record definition and a data message per
    /// `(fit timestamp, lat semicircles, lon semicircles, raw altitude)`.
    fn fit_file(records: &[(u32, i32, i32, u16)]) -> Vec<u8> {
        // Record (global 20): timestamp u32, position_lat s32, position_long s32, altitude u16
        let mut messages = vec![
            0x40, 0, 0, 20, 0, 4, 253, 4, 0x86, 0, 4, 0x85, 1, 4, 0x85, 2, 2, 0x84,
        ];
        for (timestamp, lat, lon, altitude) in records {
            messages.push(0x00);
            messages.extend_from_slice(&timestamp.to_le_bytes());
            messages.extend_from_slice(&lat.to_le_bytes());
            messages.extend_from_slice(&lon.to_le_bytes());
            messages.extend_from_slice(&altitude.to_le_bytes());
        }

        let mut bytes = vec![12u8, 0x10];
        bytes.extend_from_slice(&2093u16.to_le_bytes());
        bytes.extend_from_slice(&(messages.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&messages);
        let crc = fit_crc(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    #[test]
    fn test_parse_tcx() {
        let parsed = parse_tcx(ONE_LAP.as_bytes()).unwrap();
        assert_eq!(parsed.tracks.len(), 1);

        // The point without a position is dropped
        let points = &parsed.tracks[0].points;
        assert_eq!(points.len(), 2);
        assert!((points[0].lat - 45.0).abs() < 1e-9);
        assert!((points[0].lon - 7.0).abs() < 1e-9);
        assert!((points[1].lat - 45.001).abs() < 1e-9);
        assert_eq!(points[0].elevation, Some(300.0));
        assert_eq!(points[1].elevation, Some(305.0));

        let start = points[0].timestamp.unwrap();
        let finish = points[1].timestamp.unwrap();
        assert_eq!(start, time::macros::datetime!(2024-05-12 08:00:00 UTC));
        assert_eq!((finish - start).whole_seconds(), 60);
    }

    #[test]
    fn test_parse_tcx_without_activities() {
        let empty = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
</TrainingCenterDatabase>
"#;
        let parsed = parse_tcx(empty.as_bytes()).unwrap();
        assert!(parsed.tracks.is_empty());
    }

    #[test]
    fn test_parse_fit() {
        let lat = 536_870_912; // 45 degrees
        let lon = 83_513_255; // ~7 degrees
        let bytes = fit_file(&[
            (1_000_000_000, lat, lon, 4_000),
            (1_000_000_060, lat + 11_930, lon, 4_025),
        ]);
        assert_eq!(TrackFormat::detect_from_bytes(&bytes), TrackFormat::Fit);

        let parsed = parse_track_bytes(TrackFormat::Fit, &bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 1);

        let points = &parsed.tracks[0].points;
        assert_eq!(points.len(), 2);
        assert!((points[0].lat - 45.0).abs() < 1e-6);
        assert!((points[0].lon - 7.0).abs() < 1e-6);
        assert!(points[1].lat > points[0].lat);

        // Raw altitude is scaled by 5 and offset by 500 m
        assert!((points[0].elevation.unwrap() - 300.0).abs() < 1e-6);
        assert!((points[1].elevation.unwrap() - 305.0).abs() < 1e-6);

        let start = points[0].timestamp.unwrap();
        let finish = points[1].timestamp.unwrap();
        assert_eq!(start.unix_timestamp(), FIT_EPOCH_OFFSET + 1_000_000_000);
        assert_eq!((finish - start).whole_seconds(), 60);
    }

    #[test]
    fn test_parse_malformed_fit_is_an_error() {
        let err = parse_fit(b"not a fit file").unwrap_err();
        assert!(matches!(err, TrackFileError::Fit(_)));

        // Valid header and messages, corrupted checksum
        let mut bytes = fit_file(&[(1_000_000_000, 0, 0, 4_000)]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = parse_fit(&bytes).unwrap_err();
        assert!(matches!(err, TrackFileError::Fit(_)));
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        let broken = br#"<gpx version="1.1"><trk><trkseg><trkpt lat="north" lon="7"></trkpt></trkseg></trk></gpx>"#;
        let err = parse_gpx(broken).unwrap_err();
        assert!(matches!(err, TrackFileError::Gpx(_)));

        let err = parse_track_bytes(TrackFormat::Other, b"").unwrap_err();
        assert!(matches!(err, TrackFileError::UnsupportedFormat(TrackFormat::Other)));
    }
}
