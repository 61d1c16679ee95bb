//! GPX file generation from track points.
//!
//! Generates valid GPX 1.1 XML for use as competitor or reference tracks.

use time::OffsetDateTime;

/// A generated track point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPointData {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub timestamp: Option<OffsetDateTime>,
}

/// Generates a GPX 1.1 XML document with a single track holding one track
/// segment per entry of `segments`.
pub fn generate_gpx(segments: &[Vec<TrackPointData>], track_name: &str) -> Vec<u8> {
    let mut gpx = String::new();

    gpx.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    gpx.push('\n');
    gpx.push_str(r#"<gpx version="1.1" creator="race-validator-test-data""#);
    gpx.push_str(r#" xmlns="http://www.topografix.com/GPX/1/1""#);
    gpx.push_str(r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#);
    gpx.push_str(r#" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">"#);
    gpx.push('\n');

    gpx.push_str("  <metadata>\n");
    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(track_name)));
    gpx.push_str("  </metadata>\n");

    gpx.push_str("  <trk>\n");
    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(track_name)));
    for points in segments {
        gpx.push_str("    <trkseg>\n");
        for point in points {
            push_point(&mut gpx, point);
        }
        gpx.push_str("    </trkseg>\n");
    }
    gpx.push_str("  </trk>\n");
    gpx.push_str("</gpx>\n");

    gpx.into_bytes()
}

fn push_point(gpx: &mut String, point: &TrackPointData) {
    gpx.push_str(&format!(
        r#"      <trkpt lat="{:.9}" lon="{:.9}">"#,
        point.lat, point.lon
    ));
    gpx.push('\n');

    if let Some(ele) = point.elevation {
        gpx.push_str(&format!("        <ele>{:.3}</ele>\n", ele));
    }

    if let Some(ts) = point.timestamp {
        let formatted = ts
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        gpx.push_str(&format!("        <time>{}</time>\n", formatted));
    }

    gpx.push_str("      </trkpt>\n");
}

/// Escapes XML special characters in a string.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
