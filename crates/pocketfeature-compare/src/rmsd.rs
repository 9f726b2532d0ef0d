//! Geometric RMSD over an alignment.

use std::collections::HashMap;

use pocketfeature_core::{PdbPoint, PocketError, Point3D, Result};
use pocketfeature_io::matrixvalues::MatrixValues;

/// Map point signatures (first token of each comment) to coordinates.
pub fn point_name_lookup(points: &[PdbPoint]) -> HashMap<String, Point3D> {
    let mut lookup = HashMap::new();
    for point in points {
        if let Some(name) = point.signature() {
            lookup.insert(name.to_string(), point.point);
        }
    }
    lookup
}

/// RMSD of the aligned point pairs:
/// `sqrt(sum ||pA_i - pB_i||^2 / N)`.
///
/// A name missing from either pointfile is a fatal error. An empty
/// alignment has RMSD 0.
pub fn alignment_rmsd(
    alignment: &MatrixValues,
    points_a: &[PdbPoint],
    points_b: &[PdbPoint],
) -> Result<f64> {
    let lookup_a = point_name_lookup(points_a);
    let lookup_b = point_name_lookup(points_b);

    let mut sum = 0.0;
    let mut count = 0usize;
    for (key, _) in alignment.iter() {
        if key.len() != 2 {
            return Err(PocketError::internal(format!(
                "alignment key has {} parts, expected 2",
                key.len()
            )));
        }
        let pa = lookup_a
            .get(&key[0])
            .ok_or_else(|| PocketError::input(format!("point {} not in pointfile A", key[0])))?;
        let pb = lookup_b
            .get(&key[1])
            .ok_or_else(|| PocketError::input(format!("point {} not in pointfile B", key[1])))?;
        sum += pa.distance_squared(pb);
        count += 1;
    }
    if count == 0 {
        return Ok(0.0);
    }
    Ok((sum / count as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(name: &str, x: f64, y: f64, z: f64) -> PdbPoint {
        PdbPoint::new(Point3D::new(x, y, z), "1TST", format!("{name}\t#\tG"))
    }

    fn alignment(pairs: &[(&str, &str)]) -> MatrixValues {
        MatrixValues::from_entries(
            pairs
                .iter()
                .map(|(a, b)| (vec![a.to_string(), b.to_string()], vec![-0.5])),
            &[],
        )
    }

    #[test]
    fn test_identity_alignment_is_zero() {
        let points = vec![point("P1", 1.0, 2.0, 3.0), point("P2", -1.0, 0.0, 4.0)];
        let align = alignment(&[("P1", "P1"), ("P2", "P2")]);
        let rmsd = alignment_rmsd(&align, &points, &points).unwrap();
        assert_eq!(rmsd, 0.0);
    }

    #[test]
    fn test_rmsd_value() {
        let a = vec![point("P1", 0.0, 0.0, 0.0), point("P2", 0.0, 0.0, 0.0)];
        let b = vec![point("Q1", 3.0, 4.0, 0.0), point("Q2", 0.0, 0.0, 1.0)];
        let align = alignment(&[("P1", "Q1"), ("P2", "Q2")]);
        let rmsd = alignment_rmsd(&align, &a, &b).unwrap();
        // sqrt((25 + 1) / 2)
        assert!((rmsd - (26.0f64 / 2.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let a = vec![point("P1", 0.0, 0.0, 0.0)];
        let b = vec![point("Q1", 1.0, 0.0, 0.0)];
        let align = alignment(&[("P1", "NOPE")]);
        assert!(alignment_rmsd(&align, &a, &b).is_err());
    }

    #[test]
    fn test_empty_alignment() {
        let rmsd = alignment_rmsd(&MatrixValues::new(), &[], &[]).unwrap();
        assert_eq!(rmsd, 0.0);
    }
}
