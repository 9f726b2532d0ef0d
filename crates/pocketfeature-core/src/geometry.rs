//! 3D geometry primitives for microenvironment points

use serde::{Deserialize, Serialize};

/// An immutable point in 3D space (Angstroms)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    /// Create a new point. Coordinates must be finite.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        debug_assert!(
            x.is_finite() && y.is_finite() && z.is_finite(),
            "non-finite coordinate ({x}, {y}, {z})"
        );
        Self { x, y, z }
    }

    /// Coordinates as a fixed array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point3D) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance (avoids sqrt when comparing distances)
    pub fn distance_squared(&self, other: &Point3D) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)
    }
}

impl From<[f64; 3]> for Point3D {
    fn from(coord: [f64; 3]) -> Self {
        Point3D::new(coord[0], coord[1], coord[2])
    }
}

/// Average coordinate of a non-empty set of points
pub fn average_coords(points: &[Point3D]) -> Point3D {
    let n = points.len().max(1) as f64;
    let mut sum = [0.0, 0.0, 0.0];
    for p in points {
        sum[0] += p.x;
        sum[1] += p.y;
        sum[2] += p.z;
    }
    Point3D::new(sum[0] / n, sum[1] / n, sum[2] / n)
}

/// A 3D point anchored to a PDB entry, with a structured free-text comment.
///
/// The comment carries the tab-delimited pocket-point signature
/// (`pdbid_ligchain_ligresnum_ligname_resnum_resletter_centeridx_chain`)
/// followed by the center code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdbPoint {
    pub point: Point3D,
    pub pdbid: String,
    pub comment: String,
}

impl PdbPoint {
    pub fn new(point: Point3D, pdbid: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            point,
            pdbid: pdbid.into(),
            comment: comment.into(),
        }
    }

    /// First whitespace-delimited token of the comment: the point signature
    pub fn signature(&self) -> Option<&str> {
        self.comment.split_whitespace().next()
    }
}

/// Equality is by coordinates and PDB id; the comment is ignored.
impl PartialEq for PdbPoint {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point && self.pdbid == other.pdbid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn test_average_coords() {
        let points = [
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(2.0, 4.0, 6.0),
        ];
        let avg = average_coords(&points);
        assert_eq!(avg, Point3D::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_pdb_point_equality_ignores_comment() {
        let p = Point3D::new(1.0, 2.0, 3.0);
        let a = PdbPoint::new(p, "1ABC", "first");
        let b = PdbPoint::new(p, "1ABC", "second");
        let c = PdbPoint::new(p, "2XYZ", "first");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
