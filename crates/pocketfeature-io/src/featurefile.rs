//! FEATURE file parsing and serialization.
//!
//! A FEATURE file is a metadata prelude followed by one line per vector:
//! `NAME\tf_1\t...\tf_k\t#\tC_1\t#\tC_2...` where `k = SHELLS * |PROPERTIES|`.
//! The reserved `COORDINANTS` comment is consumed into the vector's point.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::sync::Arc;

use pocketfeature_core::{PdbPoint, PocketError, Point3D, Result};

use crate::metadata::{FeatureMetadata, COORDINANTS};

/// One FEATURE vector: a name, `num_features` floats, an optional source
/// point, and the comment fields declared by the metadata.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub name: String,
    pub features: Vec<f64>,
    pub point: Option<Point3D>,
    pub comments: Vec<String>,
    metadata: Arc<FeatureMetadata>,
}

impl FeatureVector {
    /// Build a vector, checking `|features| == metadata.num_features`.
    pub fn new(
        metadata: Arc<FeatureMetadata>,
        name: impl Into<String>,
        features: Vec<f64>,
        point: Option<Point3D>,
        comments: Vec<String>,
    ) -> Result<Self> {
        if features.len() != metadata.num_features() {
            return Err(PocketError::format(format!(
                "vector has {} features but metadata declares {}",
                features.len(),
                metadata.num_features()
            )));
        }
        Ok(Self {
            name: name.into(),
            features,
            point,
            comments,
            metadata,
        })
    }

    pub fn metadata(&self) -> &Arc<FeatureMetadata> {
        &self.metadata
    }

    /// Value of a named comment field, if declared and present.
    pub fn named_comment(&self, name: &str) -> Option<&str> {
        let idx = self.metadata.comment_index(name)?;
        self.comments.get(idx).map(|s| s.as_str())
    }

    pub fn set_named_comment(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let idx = self
            .metadata
            .comment_index(name)
            .ok_or_else(|| PocketError::format(format!("unknown comment field: {name}")))?;
        if idx >= self.comments.len() {
            self.comments.resize(idx + 1, String::new());
        }
        self.comments[idx] = value.into();
        Ok(())
    }

    /// Reconstruct a PDB-anchored point from the vector, when possible.
    pub fn pdb_point(&self, pdbid: &str) -> Option<PdbPoint> {
        let point = self.point?;
        Some(PdbPoint::new(point, pdbid, self.comments.join("\t#\t")))
    }
}

/// An ordered collection of FEATURE vectors under one metadata header.
///
/// Duplicate names are allowed; the name index points at the latest.
#[derive(Debug, Clone)]
pub struct FeatureFile {
    metadata: Arc<FeatureMetadata>,
    vectors: Vec<FeatureVector>,
    index: HashMap<String, usize>,
}

impl FeatureFile {
    pub fn new(metadata: Arc<FeatureMetadata>) -> Self {
        Self {
            metadata,
            vectors: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn metadata(&self) -> &Arc<FeatureMetadata> {
        &self.metadata
    }

    /// Append a vector. Its metadata must declare the same properties.
    pub fn append(&mut self, vector: FeatureVector) -> Result<()> {
        if vector.metadata().properties() != self.metadata.properties() {
            return Err(PocketError::format(
                "vector property list does not match the file's".to_string(),
            ));
        }
        self.index.insert(vector.name.clone(), self.vectors.len());
        self.vectors.push(vector);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FeatureVector> {
        self.index.get(name).and_then(|&i| self.vectors.get(i))
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureVector> {
        self.vectors.iter()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Parse a FEATURE file from a buffered reader.
///
/// `rename_from_comment` replaces each vector's name with the value of
/// that comment field after parsing.
pub fn load<R: BufRead>(reader: R, rename_from_comment: Option<&str>) -> Result<FeatureFile> {
    let mut metadata = FeatureMetadata::default();
    let mut body: Vec<String> = Vec::new();
    let mut in_prelude = true;
    for line in reader.lines() {
        let line = line?;
        if in_prelude && line.starts_with('#') {
            metadata.parse_line(&line);
            continue;
        }
        in_prelude = false;
        // Stray comment lines after the prelude carry no vector data
        if !line.trim().is_empty() && !line.starts_with('#') {
            body.push(line);
        }
    }
    if let Some(comment) = rename_from_comment {
        metadata.set_name_override_comment(comment)?;
    }
    let metadata = Arc::new(metadata);

    let mut file = FeatureFile::new(metadata.clone());
    for line in &body {
        file.append(parse_vector_line(&metadata, line)?)?;
    }
    Ok(file)
}

/// Parse a FEATURE file from a string.
pub fn loads(data: &str, rename_from_comment: Option<&str>) -> Result<FeatureFile> {
    load(data.as_bytes(), rename_from_comment)
}

fn parse_vector_line(metadata: &Arc<FeatureMetadata>, line: &str) -> Result<FeatureVector> {
    let mut parts = line.split('#');
    let head = parts.next().unwrap_or("").trim();
    let mut raw_comments: Vec<String> = parts.map(|c| c.trim().to_string()).collect();

    let mut tokens = head.split('\t').filter(|t| !t.trim().is_empty());
    let name = tokens
        .next()
        .ok_or_else(|| PocketError::format(format!("missing vector name in line: {line}")))?
        .to_string();
    let features: Vec<f64> = tokens
        .map(|t| {
            t.trim()
                .parse::<f64>()
                .map_err(|_| PocketError::format(format!("bad feature value {t:?} in line: {line}")))
        })
        .collect::<Result<_>>()?;

    // The COORDINANTS comment becomes the point and frees its slot
    let coords_at = metadata
        .comments()
        .iter()
        .position(|c| c == COORDINANTS)
        .filter(|&i| i < raw_comments.len());
    let point = match coords_at {
        Some(i) => {
            let coords: Vec<f64> = raw_comments[i]
                .split_whitespace()
                .take(3)
                .map(|t| {
                    t.parse::<f64>().map_err(|_| {
                        PocketError::format(format!("bad coordinate {t:?} in line: {line}"))
                    })
                })
                .collect::<Result<_>>()?;
            if coords.len() != 3 {
                return Err(PocketError::format(format!(
                    "expected three coordinates in {COORDINANTS} comment: {line}"
                )));
            }
            raw_comments.remove(i);
            Some(Point3D::new(coords[0], coords[1], coords[2]))
        }
        None => None,
    };

    let mut vector = FeatureVector::new(metadata.clone(), name, features, point, raw_comments)?;
    if let Some(name_comment) = metadata.name_comment() {
        let new_name = vector.named_comment(name_comment).map(|s| s.to_string());
        if let Some(new_name) = new_name {
            vector.name = new_name;
        }
    }
    Ok(vector)
}

/// Render one vector as a FEATURE file line (without trailing newline).
pub fn format_vector(vector: &FeatureVector) -> String {
    let mut line = vector.name.clone();
    for f in &vector.features {
        let _ = write!(line, "\t{f:.3}");
    }
    // Reinsert coordinates at the COORDINANTS slot
    let coords_at = vector
        .metadata()
        .comments()
        .iter()
        .position(|c| c == COORDINANTS);
    let mut comments: Vec<String> = vector.comments.clone();
    if let (Some(point), Some(i)) = (vector.point, coords_at) {
        let slot = i.min(comments.len());
        comments.insert(slot, format!("{:.3}\t{:.3}\t{:.3}", point.x, point.y, point.z));
    }
    for comment in &comments {
        line.push_str("\t#\t");
        line.push_str(comment);
    }
    line
}

/// Write a FEATURE file (metadata prelude, then vectors) to a stream.
pub fn dump<W: Write>(file: &FeatureFile, writer: &mut W) -> Result<()> {
    write!(writer, "{}", file.metadata().dump())?;
    for vector in file.iter() {
        writeln!(writer, "{}", format_vector(vector))?;
    }
    Ok(())
}

/// Render a FEATURE file as a string.
pub fn dumps(file: &FeatureFile) -> String {
    let mut out = file.metadata().dump();
    for vector in file.iter() {
        out.push_str(&format_vector(vector));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetaValue, DESCRIPTION};

    fn small_metadata() -> FeatureMetadata {
        let mut md = FeatureMetadata::default();
        md.set("PROPERTIES", MetaValue::List(vec!["A".into(), "B".into()]));
        md.set("SHELLS", MetaValue::Int(2));
        md
    }

    #[test]
    fn test_parse_vector_with_coords() {
        let text = "\
# PROPERTIES\tA,B
# SHELLS\t2
# COMMENTS\tCOORDINANTS,DESCRIPTION
Env_1abc_0\t0.000\t1.000\t-2.000\t0.500\t#\t1.000\t2.000\t3.000\t#\t1ABC_A_1_LIG_2_G_0_A G
";
        let file = loads(text, None).unwrap();
        assert_eq!(file.len(), 1);
        let v = &file.vectors()[0];
        assert_eq!(v.features, vec![0.0, 1.0, -2.0, 0.5]);
        assert_eq!(v.point, Some(Point3D::new(1.0, 2.0, 3.0)));
        assert_eq!(v.comments, vec!["1ABC_A_1_LIG_2_G_0_A G".to_string()]);
        assert_eq!(v.named_comment(DESCRIPTION), Some("1ABC_A_1_LIG_2_G_0_A G"));
    }

    #[test]
    fn test_rename_from_comment() {
        let text = "\
# PROPERTIES\tA,B
# SHELLS\t1
# COMMENTS\tCOORDINANTS,DESCRIPTION
Env_1abc_0\t0.000\t1.000\t#\t0.000\t0.000\t0.000\t#\tPOCKET_POINT_1 G
";
        let file = loads(text, Some(DESCRIPTION)).unwrap();
        assert_eq!(file.vectors()[0].name, "POCKET_POINT_1 G");
        assert!(file.get("POCKET_POINT_1 G").is_some());
    }

    #[test]
    fn test_feature_count_mismatch_is_fatal() {
        let text = "\
# PROPERTIES\tA,B
# SHELLS\t2
X\t1.000\t2.000\t#\t0.0\t0.0\t0.0\t#\tdesc
";
        assert!(loads(text, None).is_err());
    }

    #[test]
    fn test_round_trip() {
        let md = Arc::new(small_metadata());
        let mut file = FeatureFile::new(md.clone());
        file.append(
            FeatureVector::new(
                md.clone(),
                "V1",
                vec![0.125, -1.0, 2.5, 0.0],
                Some(Point3D::new(4.0, 5.0, 6.0)),
                vec!["V1 G".to_string()],
            )
            .unwrap(),
        )
        .unwrap();

        let text = dumps(&file);
        let parsed = loads(&text, None).unwrap();
        assert_eq!(parsed.len(), 1);
        let v = &parsed.vectors()[0];
        assert_eq!(v.name, "V1");
        assert_eq!(v.features, vec![0.125, -1.0, 2.5, 0.0]);
        assert_eq!(v.point, Some(Point3D::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn test_append_checks_properties() {
        let md_a = Arc::new(small_metadata());
        let mut other = FeatureMetadata::default();
        other.set("PROPERTIES", MetaValue::List(vec!["C".into()]));
        other.set("SHELLS", MetaValue::Int(1));
        let md_b = Arc::new(other);

        let mut file = FeatureFile::new(md_a);
        let v = FeatureVector::new(md_b.clone(), "X", vec![1.0], None, Vec::new()).unwrap();
        assert!(file.append(v).is_err());
    }

    #[test]
    fn test_duplicate_names_latest_wins() {
        let md = Arc::new(small_metadata());
        let mut file = FeatureFile::new(md.clone());
        for value in [1.0, 2.0] {
            file.append(
                FeatureVector::new(md.clone(), "DUP", vec![value; 4], None, vec![String::new()])
                    .unwrap(),
            )
            .unwrap();
        }
        assert_eq!(file.len(), 2);
        assert_eq!(file.get("DUP").unwrap().features[0], 2.0);
    }
}
