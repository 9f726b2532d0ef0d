//! Pointfile reading and writing.
//!
//! Per-line grammar: `PDBID\tX\tY\tZ[\t#\tCOMMENT[\t#\tCOMMENT]*]`.
//! Numbers are written with three decimal places. Blank lines and lines
//! starting with `#` are ignored on input.

use std::io::{BufRead, Write};

use pocketfeature_core::{PdbPoint, PocketError, Point3D, Result};

/// Parse a pointfile from a buffered reader.
pub fn load<R: BufRead>(reader: R) -> Result<Vec<PdbPoint>> {
    let mut points = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(point) = parse_line(&line)? {
            points.push(point);
        }
    }
    Ok(points)
}

/// Parse a pointfile from a string.
pub fn loads(data: &str) -> Result<Vec<PdbPoint>> {
    let mut points = Vec::new();
    for line in data.lines() {
        if let Some(point) = parse_line(line)? {
            points.push(point);
        }
    }
    Ok(points)
}

fn parse_line(line: &str) -> Result<Option<PdbPoint>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (head, comment) = match line.split_once('#') {
        Some((head, comment)) => (head.trim(), comment.trim()),
        None => (line, ""),
    };
    if head.is_empty() {
        return Ok(None);
    }
    let tokens: Vec<&str> = head.split_whitespace().collect();
    if tokens.len() != 4 {
        return Err(PocketError::format(format!(
            "expected PDBID and three coordinates, got {} fields: {line}",
            tokens.len()
        )));
    }
    let coords: Vec<f64> = tokens[1..]
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| PocketError::format(format!("bad coordinate {t:?} in line: {line}")))
        })
        .collect::<Result<_>>()?;
    Ok(Some(PdbPoint::new(
        Point3D::new(coords[0], coords[1], coords[2]),
        tokens[0],
        comment,
    )))
}

/// Render a single point as a pointfile line (without trailing newline).
pub fn format_point(point: &PdbPoint) -> String {
    let mut line = format!(
        "{}\t{:.3}\t{:.3}\t{:.3}",
        point.pdbid, point.point.x, point.point.y, point.point.z
    );
    if !point.comment.is_empty() {
        line.push_str("\t#\t");
        line.push_str(&point.comment);
    }
    line
}

/// Write a point list to a stream.
pub fn dump<W: Write>(points: &[PdbPoint], writer: &mut W) -> Result<()> {
    for point in points {
        writeln!(writer, "{}", format_point(point))?;
    }
    Ok(())
}

/// Render a point list as a string.
pub fn dumps(points: &[PdbPoint]) -> String {
    let mut out = String::new();
    for point in points {
        out.push_str(&format_point(point));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let points = vec![
            PdbPoint::new(
                Point3D::new(1.0, -2.25, 3.125),
                "1ABC",
                "1ABC_A_301_ATP_42_G_0_A\t#\tG",
            ),
            PdbPoint::new(Point3D::new(0.0, 0.0, 0.0), "1ABC", ""),
        ];
        let text = dumps(&points);
        let parsed = loads(&text).unwrap();
        assert_eq!(parsed, points);
        assert_eq!(parsed[0].comment, "1ABC_A_301_ATP_42_G_0_A\t#\tG");
        assert_eq!(parsed[0].signature(), Some("1ABC_A_301_ATP_42_G_0_A"));
    }

    #[test]
    fn test_three_decimal_output() {
        let point = PdbPoint::new(Point3D::new(1.0, 2.5, -0.125), "2XYZ", "");
        assert_eq!(format_point(&point), "2XYZ\t1.000\t2.500\t-0.125");
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let text = "\n# just a comment\n1ABC\t1.0\t2.0\t3.0\n\n";
        let points = loads(text).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_comment_only_file() {
        let points = loads("# nothing here\n#\n").unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_bad_line_is_error() {
        assert!(loads("1ABC\t1.0\t2.0\n").is_err());
        assert!(loads("1ABC\tx\ty\tz\n").is_err());
    }
}
