//! FEATURE file metadata: the ordered `# KEY\tVALUE` prelude.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use pocketfeature_core::{PocketError, Result};

/// Reserved comment field holding the vector coordinates
pub const COORDINANTS: &str = "COORDINANTS";
/// Reserved comment field holding the vector description
pub const DESCRIPTION: &str = "DESCRIPTION";
/// Comment field used for the microenvironment type code
pub const RESIDUE_TYPE: &str = "RESIDUE_TYPE";

/// The 80 properties computed by the protein FEATURE featurizer, in order.
pub const DEFAULT_PROPERTIES: [&str; 80] = [
    "ATOM_TYPE_IS_C",
    "ATOM_TYPE_IS_CT",
    "ATOM_TYPE_IS_CA",
    "ATOM_TYPE_IS_N",
    "ATOM_TYPE_IS_N2",
    "ATOM_TYPE_IS_N3",
    "ATOM_TYPE_IS_NA",
    "ATOM_TYPE_IS_O",
    "ATOM_TYPE_IS_O2",
    "ATOM_TYPE_IS_OH",
    "ATOM_TYPE_IS_S",
    "ATOM_TYPE_IS_SH",
    "ATOM_TYPE_IS_OTHER",
    "PARTIAL_CHARGE",
    "ELEMENT_IS_ANY",
    "ELEMENT_IS_C",
    "ELEMENT_IS_N",
    "ELEMENT_IS_O",
    "ELEMENT_IS_S",
    "ELEMENT_IS_OTHER",
    "HYDROXYL",
    "AMIDE",
    "AMINE",
    "CARBONYL",
    "RING_SYSTEM",
    "PEPTIDE",
    "VDW_VOLUME",
    "CHARGE",
    "NEG_CHARGE",
    "POS_CHARGE",
    "CHARGE_WITH_HIS",
    "HYDROPHOBICITY",
    "MOBILITY",
    "SOLVENT_ACCESSIBILITY",
    "RESIDUE_NAME_IS_ALA",
    "RESIDUE_NAME_IS_ARG",
    "RESIDUE_NAME_IS_ASN",
    "RESIDUE_NAME_IS_ASP",
    "RESIDUE_NAME_IS_CYS",
    "RESIDUE_NAME_IS_GLN",
    "RESIDUE_NAME_IS_GLU",
    "RESIDUE_NAME_IS_GLY",
    "RESIDUE_NAME_IS_HIS",
    "RESIDUE_NAME_IS_ILE",
    "RESIDUE_NAME_IS_LEU",
    "RESIDUE_NAME_IS_LYS",
    "RESIDUE_NAME_IS_MET",
    "RESIDUE_NAME_IS_PHE",
    "RESIDUE_NAME_IS_PRO",
    "RESIDUE_NAME_IS_SER",
    "RESIDUE_NAME_IS_THR",
    "RESIDUE_NAME_IS_TRP",
    "RESIDUE_NAME_IS_TYR",
    "RESIDUE_NAME_IS_VAL",
    "RESIDUE_NAME_IS_HOH",
    "RESIDUE_NAME_IS_OTHER",
    "RESIDUE_CLASS1_IS_HYDROPHOBIC",
    "RESIDUE_CLASS1_IS_CHARGED",
    "RESIDUE_CLASS1_IS_POLAR",
    "RESIDUE_CLASS1_IS_UNKNOWN",
    "RESIDUE_CLASS2_IS_NONPOLAR",
    "RESIDUE_CLASS2_IS_POLAR",
    "RESIDUE_CLASS2_IS_BASIC",
    "RESIDUE_CLASS2_IS_ACIDIC",
    "RESIDUE_CLASS2_IS_UNKNOWN",
    "SECONDARY_STRUCTURE1_IS_3HELIX",
    "SECONDARY_STRUCTURE1_IS_4HELIX",
    "SECONDARY_STRUCTURE1_IS_5HELIX",
    "SECONDARY_STRUCTURE1_IS_BRIDGE",
    "SECONDARY_STRUCTURE1_IS_STRAND",
    "SECONDARY_STRUCTURE1_IS_TURN",
    "SECONDARY_STRUCTURE1_IS_BEND",
    "SECONDARY_STRUCTURE1_IS_COIL",
    "SECONDARY_STRUCTURE1_IS_HET",
    "SECONDARY_STRUCTURE1_IS_UNKNOWN",
    "SECONDARY_STRUCTURE2_IS_HELIX",
    "SECONDARY_STRUCTURE2_IS_BETA",
    "SECONDARY_STRUCTURE2_IS_COIL",
    "SECONDARY_STRUCTURE2_IS_HET",
    "SECONDARY_STRUCTURE2_IS_UNKNOWN",
];

/// A parsed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl MetaValue {
    /// Parse a raw string value: comma-separated becomes a list,
    /// otherwise integer, then float, then text.
    pub fn parse(raw: &str) -> MetaValue {
        let raw = raw.trim();
        if raw.contains(',') {
            let items = raw
                .trim_matches(|c: char| c == ',' || c.is_whitespace())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            return MetaValue::List(items);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return MetaValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return MetaValue::Float(f);
        }
        MetaValue::Text(raw.to_string())
    }

    fn render(&self) -> String {
        match self {
            MetaValue::Int(i) => i.to_string(),
            MetaValue::Float(f) => f.to_string(),
            MetaValue::Text(s) => s.clone(),
            MetaValue::List(items) => items.join(","),
        }
    }
}

/// Ordered metadata dictionary for FEATURE files.
///
/// Keys keep insertion order; known keys have typed accessors. The
/// invariant `num_features = SHELLS * |PROPERTIES|` is derived here and
/// checked by every vector constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMetadata {
    entries: Vec<(String, MetaValue)>,
    name_comment: Option<String>,
}

impl Default for FeatureMetadata {
    fn default() -> Self {
        let properties = DEFAULT_PROPERTIES.iter().map(|s| s.to_string()).collect();
        let entries = vec![
            (
                "EXCLUDED_RESIDUES".to_string(),
                MetaValue::List(vec!["HETATM".to_string()]),
            ),
            ("PDBID_LIST".to_string(), MetaValue::List(Vec::new())),
            ("PROPERTIES".to_string(), MetaValue::List(properties)),
            (
                "COMMENTS".to_string(),
                MetaValue::List(vec![COORDINANTS.to_string(), DESCRIPTION.to_string()]),
            ),
            ("SHELLS".to_string(), MetaValue::Int(6)),
            ("SHELL_WIDTH".to_string(), MetaValue::Float(1.25)),
            ("VERBOSITY".to_string(), MetaValue::Int(0)),
        ];
        Self {
            entries,
            name_comment: None,
        }
    }
}

impl FeatureMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a key, replacing in place to preserve insertion order.
    pub fn set(&mut self, key: &str, value: MetaValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    /// Set a key from its raw textual form.
    ///
    /// When the existing value is a list, a single raw token still
    /// becomes a one-element list so the value keeps its shape.
    pub fn set_raw(&mut self, key: &str, raw: &str) {
        let mut value = MetaValue::parse(raw);
        if let (Some(MetaValue::List(_)), MetaValue::Int(_) | MetaValue::Float(_) | MetaValue::Text(_)) =
            (self.get(key), &value)
        {
            value = MetaValue::List(vec![raw.trim().to_string()]);
        }
        self.set(key, value);
    }

    /// Parse one prelude line of the form `# KEY\tVALUE`.
    ///
    /// Lines with no key are ignored. Returns false for non-metadata lines.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix('#') else {
            return false;
        };
        let rest = rest.trim();
        if rest.is_empty() {
            return true;
        }
        match rest.split_once(|c: char| c.is_whitespace()) {
            Some((key, value)) => self.set_raw(key, value.trim()),
            None => self.set(rest, MetaValue::Text(String::new())),
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn num_shells(&self) -> usize {
        match self.get("SHELLS") {
            Some(MetaValue::Int(i)) => *i as usize,
            Some(MetaValue::Float(f)) => *f as usize,
            _ => 6,
        }
    }

    pub fn shell_width(&self) -> f64 {
        match self.get("SHELL_WIDTH") {
            Some(MetaValue::Float(f)) => *f,
            Some(MetaValue::Int(i)) => *i as f64,
            _ => 1.25,
        }
    }

    pub fn properties(&self) -> &[String] {
        match self.get("PROPERTIES") {
            Some(MetaValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn comments(&self) -> &[String] {
        match self.get("COMMENTS") {
            Some(MetaValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn num_properties(&self) -> usize {
        self.properties().len()
    }

    /// Total vector length: `SHELLS * |PROPERTIES|`
    pub fn num_features(&self) -> usize {
        self.num_shells() * self.num_properties()
    }

    /// Whether the comment schema carries coordinates
    pub fn has_coords_comment(&self) -> bool {
        self.comments().iter().any(|c| c == COORDINANTS)
    }

    /// Position of a named comment within a vector's comment list.
    ///
    /// The `COORDINANTS` field is consumed into the vector's point and
    /// does not occupy a slot, so fields after it shift down by one.
    pub fn comment_index(&self, name: &str) -> Option<usize> {
        let comments = self.comments();
        let idx = comments.iter().position(|c| c == name)?;
        let coords_at = comments.iter().position(|c| c == COORDINANTS);
        match coords_at {
            Some(c) if c < idx => Some(idx - 1),
            Some(c) if c == idx => None,
            _ => Some(idx),
        }
    }

    /// Number of comment slots a vector actually stores
    pub fn num_comment_slots(&self) -> usize {
        let n = self.comments().len();
        if self.has_coords_comment() {
            n.saturating_sub(1)
        } else {
            n
        }
    }

    /// Nominate a comment field to replace vector names after parsing.
    pub fn set_name_override_comment(&mut self, comment: &str) -> Result<()> {
        if self.comments().iter().any(|c| c == comment) {
            self.name_comment = Some(comment.to_string());
            Ok(())
        } else {
            Err(PocketError::format(format!(
                "cannot rename vectors from non-existent comment: {comment}"
            )))
        }
    }

    pub fn name_comment(&self) -> Option<&str> {
        self.name_comment.as_deref()
    }

    /// Render the metadata prelude, one `# KEY\tVALUE` line per entry.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(out, "# {}\t{}", key, value.render());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let md = FeatureMetadata::default();
        assert_eq!(md.num_shells(), 6);
        assert_eq!(md.shell_width(), 1.25);
        assert_eq!(md.num_properties(), 80);
        assert_eq!(md.num_features(), 480);
        assert!(md.has_coords_comment());
        assert_eq!(md.num_comment_slots(), 1);
    }

    #[test]
    fn test_parse_line_overrides() {
        let mut md = FeatureMetadata::default();
        assert!(md.parse_line("# SHELLS\t4"));
        assert!(md.parse_line("# PROPERTIES\tHYDROPHOBICITY,CHARGE"));
        assert!(!md.parse_line("GLY_A\t0.0"));
        assert_eq!(md.num_shells(), 4);
        assert_eq!(md.properties(), ["HYDROPHOBICITY", "CHARGE"]);
        assert_eq!(md.num_features(), 8);
    }

    #[test]
    fn test_single_token_into_existing_list() {
        let mut md = FeatureMetadata::default();
        md.set_raw("EXCLUDED_RESIDUES", "HOH");
        assert_eq!(
            md.get("EXCLUDED_RESIDUES"),
            Some(&MetaValue::List(vec!["HOH".to_string()]))
        );
    }

    #[test]
    fn test_comment_index_shift() {
        let md = FeatureMetadata::default();
        // COORDINANTS precedes DESCRIPTION and occupies no slot
        assert_eq!(md.comment_index(DESCRIPTION), Some(0));
        assert_eq!(md.comment_index(COORDINANTS), None);
    }

    #[test]
    fn test_name_override_validation() {
        let mut md = FeatureMetadata::default();
        assert!(md.set_name_override_comment(DESCRIPTION).is_ok());
        assert!(md.set_name_override_comment("NO_SUCH").is_err());
    }

    #[test]
    fn test_dump_round_trip() {
        let mut md = FeatureMetadata::default();
        md.set_raw("SHELLS", "3");
        let text = md.dump();
        let mut parsed = FeatureMetadata::default();
        for line in text.lines() {
            assert!(parsed.parse_line(line));
        }
        assert_eq!(parsed.num_shells(), 3);
        assert_eq!(parsed.properties(), md.properties());
    }
}
