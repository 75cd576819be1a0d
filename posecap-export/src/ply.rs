use crate::{ExportError, Result};
use log::*;
use ply_rs::{
    parser::Parser,
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};
use std::io::{BufRead, Write};

/// The number of `f32` values per point in a raw depth buffer: `x, y, z, confidence`.
pub const POINT_STRIDE: usize = 4;

/// One point of a depth point cloud, in the depth camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Probability that the range measurement is valid, from `0.0` to `1.0`.
    pub confidence: f32,
}

/// Keeps the points of `raw` (`[x, y, z, c]*`) whose confidence is at least `min_confidence`.
///
/// A trailing incomplete point is ignored.
pub fn filter_points(raw: &[f32], min_confidence: f32) -> Vec<CloudPoint> {
    let chunks = raw.chunks_exact(POINT_STRIDE);
    if !chunks.remainder().is_empty() {
        warn!(
            "point cloud has {} trailing values that do not form a point",
            chunks.remainder().len()
        );
    }
    let points: Vec<CloudPoint> = chunks
        .map(|p| CloudPoint {
            x: p[0],
            y: p[1],
            z: p[2],
            confidence: p[3],
        })
        .filter(|p| p.confidence >= min_confidence)
        .collect();
    debug!(
        "kept {} of {} points with confidence >= {}",
        points.len(),
        raw.len() / POINT_STRIDE,
        min_confidence
    );
    points
}

/// Writes `points` as an ASCII PLY mesh and returns the number of vertices written.
///
/// With `with_confidence` each vertex gets a fourth `c` property holding its confidence.
pub fn write_ply(
    mut writer: impl Write,
    points: &[CloudPoint],
    with_confidence: bool,
) -> Result<usize> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;
    if with_confidence {
        ply.header
            .comments
            .push("c is confidence probability".to_string());
    }

    let mut point_element = ElementDef::new("vertex".to_string());
    let columns: &[&str] = if with_confidence {
        &["x", "y", "z", "c"]
    } else {
        &["x", "y", "z"]
    };
    for &column in columns {
        let p = PropertyDef::new(column.to_string(), PropertyType::Scalar(ScalarType::Float));
        point_element.properties.add(p);
    }
    ply.header.elements.add(point_element);

    let vertices: Vec<DefaultElement> = points
        .iter()
        .map(|p| {
            let mut vertex = DefaultElement::new();
            vertex.insert("x".to_string(), Property::Float(p.x));
            vertex.insert("y".to_string(), Property::Float(p.y));
            vertex.insert("z".to_string(), Property::Float(p.z));
            if with_confidence {
                vertex.insert("c".to_string(), Property::Float(p.confidence));
            }
            vertex
        })
        .collect();
    let count = vertices.len();
    ply.payload.insert("vertex".to_string(), vertices);

    Writer::new()
        .write_ply(&mut writer, &mut ply)
        .map_err(ExportError::Ply)?;
    Ok(count)
}

/// Reads the vertices of a PLY mesh. Points without a `c` property get a confidence of `1.0`.
pub fn read_ply(mut reader: impl BufRead) -> Result<Vec<CloudPoint>> {
    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(ExportError::Ply)?;
    let points = ply
        .payload
        .get("vertex")
        .map(|vertices| {
            vertices
                .iter()
                .map(|vertex| CloudPoint {
                    x: float_property(vertex, "x").unwrap_or(0.0),
                    y: float_property(vertex, "y").unwrap_or(0.0),
                    z: float_property(vertex, "z").unwrap_or(0.0),
                    confidence: float_property(vertex, "c").unwrap_or(1.0),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(points)
}

fn float_property(element: &DefaultElement, key: &str) -> Option<f32> {
    match element.get(key)? {
        Property::Float(v) => Some(*v),
        Property::Double(v) => Some(*v as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [f32; 12] = [
        0.0, 0.0, 1.0, 0.2, //
        0.5, -0.5, 2.0, 0.6, //
        1.0, 1.0, 3.0, 0.9,
    ];

    #[test]
    fn threshold_filters_points() {
        let points = filter_points(&RAW, 0.5);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].confidence, 0.6);
        assert_eq!(points[1].z, 3.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(filter_points(&RAW, 0.6).len(), 2);
        assert_eq!(filter_points(&RAW, 0.0).len(), 3);
    }

    #[test]
    fn last_point_is_kept() {
        let points = filter_points(&RAW[8..], 0.0);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn incomplete_point_is_ignored() {
        let points = filter_points(&RAW[..10], 0.0);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn header_counts_retained_points() {
        let points = filter_points(&RAW, 0.5);
        let mut out = Vec::new();
        assert_eq!(write_ply(&mut out, &points, false).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let header: Vec<&str> = text.lines().take_while(|&l| l != "end_header").collect();
        assert_eq!(header[0], "ply");
        assert_eq!(header[1], "format ascii 1.0");
        assert!(header.contains(&"element vertex 2"));
        assert!(header.contains(&"property float x"));
        assert!(!header.contains(&"property float c"));
        assert!(!text.contains("confidence"));
        let body: Vec<&str> = text.lines().skip_while(|&l| l != "end_header").skip(1).collect();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].split_whitespace().count(), 3);
    }

    #[test]
    fn confidence_column() {
        let points = filter_points(&RAW, 0.0);
        let mut out = Vec::new();
        write_ply(&mut out, &points, true).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("comment c is confidence probability"));
        assert!(text.contains("property float c"));
        assert!(text.contains("element vertex 3"));

        let read = read_ply(&out[..]).unwrap();
        assert_eq!(read, points);
    }

    #[test]
    fn empty_cloud() {
        let mut out = Vec::new();
        assert_eq!(write_ply(&mut out, &[], false).unwrap(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("element vertex 0"));
    }
}
