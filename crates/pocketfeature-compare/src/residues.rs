//! Residue-center catalogue.
//!
//! Each residue type maps to an ordered list of "centers": named atom
//! groups whose averaged coordinate is a microenvironment site. A
//! parallel class partition groups `(residue, center-index)` pairs into
//! chemical classes used to derive the allowed center-pair sets.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

use pocketfeature_core::{average_coords, PocketError, Point3D, Result};
use pocketfeature_io::centersfile::CenterRow;

use crate::structure::{residue_code_three_to_one, Atom, Residue};

lazy_static! {
    /// Default center atom sets per residue type
    static ref DEFAULT_CENTERS: Vec<(&'static str, Vec<Vec<&'static str>>)> = vec![
        ("GLY", vec![vec!["CA"]]),
        ("CYS", vec![vec!["SG"]]),
        ("ARG", vec![vec!["CZ"]]),
        ("SER", vec![vec!["OG"]]),
        ("THR", vec![vec!["OG1"]]),
        ("LYS", vec![vec!["NZ"]]),
        ("MET", vec![vec!["SD"]]),
        ("ALA", vec![vec!["CB"]]),
        ("LEU", vec![vec!["CB"]]),
        ("ILE", vec![vec!["CB"]]),
        ("VAL", vec![vec!["CB"]]),
        ("ASP", vec![vec!["OD1", "CG", "OD2"]]),
        ("GLU", vec![vec!["OE1", "CD", "OE2"]]),
        ("HIS", vec![vec!["NE2", "ND1"]]),
        ("ASN", vec![vec!["OD1", "CG", "ND2"]]),
        ("PRO", vec![vec!["N", "CA", "CB", "CD", "CG"]]),
        ("GLN", vec![vec!["OE1", "CD", "NE2"]]),
        ("PHE", vec![vec!["CG", "CD1", "CD2", "CE1", "CE2", "CZ"]]),
        ("TRP", vec![vec!["NE1"], vec!["CD2", "CE2", "CE3", "CZ2", "CZ3", "CH2"]]),
        ("TYR", vec![vec!["OH"], vec!["CG", "CD1", "CD2", "CE1", "CE2", "CZ"]]),
    ];

    /// Default class partition over (residue, center-index) pairs
    static ref DEFAULT_CLASSES: Vec<(&'static str, Vec<(&'static str, usize)>)> = vec![
        ("positive", vec![("ARG", 0), ("HIS", 0), ("LYS", 0)]),
        ("negative", vec![("ASP", 0), ("GLU", 0)]),
        ("polar", vec![
            ("SER", 0), ("THR", 0), ("ASN", 0), ("GLN", 0), ("TYR", 0), ("TRP", 0),
        ]),
        ("non-polar", vec![
            ("ALA", 0), ("CYS", 0), ("GLY", 0), ("ILE", 0),
            ("LEU", 0), ("MET", 0), ("PRO", 0), ("VAL", 0),
        ]),
        ("aromatic", vec![("TYR", 1), ("TRP", 1), ("PHE", 0)]),
    ];
}

/// One microenvironment site of a residue
#[derive(Debug, Clone, PartialEq)]
pub struct CenterPoint {
    /// Short textual code (e.g. "G", "Y2")
    pub code: String,
    /// Index of the center within the residue's catalogue entry
    pub index: usize,
    /// Averaged coordinate of the center's atoms
    pub point: Point3D,
}

/// The residue-center catalogue.
#[derive(Debug, Clone)]
pub struct CenterCatalogue {
    centers: Vec<(String, Vec<Vec<String>>)>,
    center_lookup: HashMap<String, usize>,
    classes: Vec<(String, Vec<(String, usize)>)>,
    class_of: HashMap<(String, usize), String>,
    /// Serial numbering base; 1 leaves the first center unnumbered,
    /// negative always emits serials starting at the absolute value
    pub start_numbers: i32,
    /// Return no centers for residue types outside the catalogue
    pub ignore_unknown_residues: bool,
    /// Fail on missing atoms when partial residues are not skipped
    pub strict: bool,
}

impl CenterCatalogue {
    /// The standard catalogue of 20 residue types and 5 classes
    pub fn standard() -> Self {
        let centers = DEFAULT_CENTERS
            .iter()
            .map(|(res, sets)| {
                (
                    res.to_string(),
                    sets.iter()
                        .map(|set| set.iter().map(|a| a.to_string()).collect())
                        .collect(),
                )
            })
            .collect();
        let classes = DEFAULT_CLASSES
            .iter()
            .map(|(name, members)| {
                (
                    name.to_string(),
                    members
                        .iter()
                        .map(|(res, idx)| (res.to_string(), *idx))
                        .collect(),
                )
            })
            .collect();
        Self::from_tables(centers, classes).expect("default catalogue is consistent")
    }

    /// Build a catalogue from explicit tables.
    pub fn from_tables(
        centers: Vec<(String, Vec<Vec<String>>)>,
        classes: Vec<(String, Vec<(String, usize)>)>,
    ) -> Result<Self> {
        let mut center_lookup = HashMap::new();
        for (i, (res, sets)) in centers.iter().enumerate() {
            if sets.is_empty() || sets.iter().any(|s| s.is_empty()) {
                return Err(PocketError::format(format!(
                    "residue {res} has an empty center definition"
                )));
            }
            center_lookup.insert(res.to_ascii_uppercase(), i);
        }
        let mut class_of = HashMap::new();
        for (class_name, members) in &classes {
            for (res, idx) in members {
                let res = res.to_ascii_uppercase();
                let valid = center_lookup
                    .get(&res)
                    .map(|&i| *idx < centers[i].1.len())
                    .unwrap_or(false);
                if !valid {
                    return Err(PocketError::format(format!(
                        "class {class_name} refers to unknown center ({res}, {idx})"
                    )));
                }
                class_of.insert((res, *idx), class_name.clone());
            }
        }
        Ok(Self {
            centers,
            center_lookup,
            classes,
            class_of,
            start_numbers: 1,
            ignore_unknown_residues: true,
            strict: true,
        })
    }

    /// Build a catalogue from parsed centers-file rows.
    ///
    /// Rows for the same residue enumerate its centers in order; a class
    /// column assigns the `(residue, index)` pair to that class.
    pub fn from_rows(rows: &[CenterRow]) -> Result<Self> {
        let mut centers: Vec<(String, Vec<Vec<String>>)> = Vec::new();
        let mut order: HashMap<String, usize> = HashMap::new();
        let mut classes: Vec<(String, Vec<(String, usize)>)> = Vec::new();
        for row in rows {
            let res = row.residue.to_ascii_uppercase();
            let entry = match order.get(&res) {
                Some(&i) => &mut centers[i],
                None => {
                    order.insert(res.clone(), centers.len());
                    centers.push((res.clone(), Vec::new()));
                    centers.last_mut().unwrap()
                }
            };
            let index = entry.1.len();
            entry.1.push(row.atoms.clone());
            if let Some(class) = &row.class {
                match classes.iter_mut().find(|(name, _)| name == class) {
                    Some((_, members)) => members.push((res.clone(), index)),
                    None => classes.push((class.clone(), vec![(res.clone(), index)])),
                }
            }
        }
        Self::from_tables(centers, classes)
    }

    /// Number of centers defined for a residue type
    pub fn num_centers(&self, residue_code: &str) -> Option<usize> {
        self.center_lookup
            .get(&residue_code.to_ascii_uppercase())
            .map(|&i| self.centers[i].1.len())
    }

    /// Residue types in catalogue order
    pub fn residue_codes(&self) -> impl Iterator<Item = &str> {
        self.centers.iter().map(|(res, _)| res.as_str())
    }

    /// Center code: one-letter residue code plus a 1-based serial.
    ///
    /// With `start_numbers == 1` the first center of each residue is
    /// printed without a serial; a negative base always emits the serial
    /// starting at its absolute value.
    pub fn center_code(&self, residue_code: &str, index: usize) -> String {
        let letter = residue_code_three_to_one(&residue_code.to_ascii_uppercase());
        let base = self.start_numbers.unsigned_abs() as usize;
        if self.start_numbers == 1 && index == 0 {
            letter.to_string()
        } else {
            format!("{}{}", letter, index + base)
        }
    }

    /// Codes for every center of a residue type, in order
    pub fn codes_for(&self, residue_code: &str) -> Vec<String> {
        match self.num_centers(residue_code) {
            Some(n) => (0..n).map(|i| self.center_code(residue_code, i)).collect(),
            None => Vec::new(),
        }
    }

    /// Sorted center-pair key; sorting makes the relation symmetric
    pub fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Centers of a residue as averaged coordinates.
    ///
    /// With `skip_partial_residues` a center whose atoms are not all
    /// present is silently dropped; otherwise, in strict mode, missing
    /// atoms fail with the residue, code, and missing names.
    pub fn centers_for(
        &self,
        residue: &Residue,
        atoms: &[Atom],
        skip_partial_residues: bool,
    ) -> Result<Vec<CenterPoint>> {
        let code = residue.name.to_ascii_uppercase();
        let Some(&entry) = self.center_lookup.get(&code) else {
            if self.ignore_unknown_residues {
                return Ok(Vec::new());
            }
            return Err(PocketError::input(format!(
                "no residue centers defined for {code}"
            )));
        };
        let strict = self.strict && !skip_partial_residues;
        let mut points = Vec::new();
        for (index, atom_names) in self.centers[entry].1.iter().enumerate() {
            let found: Vec<Point3D> = residue
                .canonical_atoms(atoms)
                .filter(|a| atom_names.iter().any(|n| n == &a.name))
                .map(|a| a.point())
                .collect();
            if found.len() == atom_names.len() {
                points.push(CenterPoint {
                    code: self.center_code(&code, index),
                    index,
                    point: average_coords(&found),
                });
            } else if strict {
                let present: HashSet<&str> = residue
                    .canonical_atoms(atoms)
                    .map(|a| a.name.as_str())
                    .collect();
                let missing: Vec<&str> = atom_names
                    .iter()
                    .map(|s| s.as_str())
                    .filter(|n| !present.contains(n))
                    .collect();
                return Err(PocketError::input(format!(
                    "missing atoms in {} ({}): {}",
                    self.center_code(&code, index),
                    residue.id_string(),
                    missing.join(",")
                )));
            }
        }
        Ok(points)
    }

    /// Class of a `(residue, center-index)` pair, if assigned
    pub fn class_of(&self, residue_code: &str, index: usize) -> Option<&str> {
        self.class_of
            .get(&(residue_code.to_ascii_uppercase(), index))
            .map(|s| s.as_str())
    }

    /// Allowed pairs within each class: combinations with replacement
    /// over the class's codes, as sorted pair keys.
    pub fn class_pairs(&self) -> HashSet<(String, String)> {
        let mut pairs = HashSet::new();
        for (_, members) in &self.classes {
            let codes: Vec<String> = members
                .iter()
                .map(|(res, idx)| self.center_code(res, *idx))
                .collect();
            for (i, a) in codes.iter().enumerate() {
                for b in &codes[i..] {
                    pairs.insert(Self::pair_key(a, b));
                }
            }
        }
        pairs
    }

    /// Allowed pairs with every center treated as one class
    pub fn all_pairs(&self) -> HashSet<(String, String)> {
        let codes: Vec<String> = self
            .centers
            .iter()
            .flat_map(|(res, sets)| (0..sets.len()).map(|i| self.center_code(res, i)))
            .collect();
        let mut pairs = HashSet::new();
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i..] {
                pairs.insert(Self::pair_key(a, b));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::Atom;

    fn atom(name: &str, residue: &str, coord: [f64; 3]) -> Atom {
        Atom::from_pdb_fields(
            1,
            name.to_string(),
            residue.to_string(),
            'A',
            1,
            None,
            coord,
            1.0,
            0.0,
            "C".to_string(),
            None,
            1,
            false,
        )
    }

    fn residue_with(atoms: &[Atom]) -> Residue {
        let mut residue = Residue::new(atoms[0].residue_name.clone(), 'A', 1, None);
        residue.atom_indices = (0..atoms.len()).collect();
        residue
    }

    #[test]
    fn test_center_codes() {
        let catalogue = CenterCatalogue::standard();
        assert_eq!(catalogue.center_code("GLY", 0), "G");
        assert_eq!(catalogue.codes_for("TYR"), vec!["Y", "Y2"]);
        assert_eq!(catalogue.codes_for("TRP"), vec!["W", "W2"]);
    }

    #[test]
    fn test_center_codes_always_numbered() {
        let mut catalogue = CenterCatalogue::standard();
        catalogue.start_numbers = -1;
        assert_eq!(catalogue.codes_for("TYR"), vec!["Y1", "Y2"]);
    }

    #[test]
    fn test_pair_key_sorted() {
        assert_eq!(
            CenterCatalogue::pair_key("W2", "H"),
            ("H".to_string(), "W2".to_string())
        );
        assert_eq!(
            CenterCatalogue::pair_key("G", "G"),
            ("G".to_string(), "G".to_string())
        );
    }

    #[test]
    fn test_centers_for_average() {
        let catalogue = CenterCatalogue::standard();
        let atoms = vec![
            atom("NE2", "HIS", [0.0, 0.0, 0.0]),
            atom("ND1", "HIS", [2.0, 0.0, 0.0]),
        ];
        let residue = residue_with(&atoms);
        let centers = catalogue.centers_for(&residue, &atoms, true).unwrap();
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].code, "H");
        assert_eq!(centers[0].point, Point3D::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_partial_residue_skipped_or_strict() {
        let catalogue = CenterCatalogue::standard();
        let atoms = vec![atom("NE2", "HIS", [0.0, 0.0, 0.0])];
        let residue = residue_with(&atoms);
        // skipped silently
        let centers = catalogue.centers_for(&residue, &atoms, true).unwrap();
        assert!(centers.is_empty());
        // strict failure names the missing atom
        let err = catalogue.centers_for(&residue, &atoms, false).unwrap_err();
        assert!(err.to_string().contains("ND1"));
    }

    #[test]
    fn test_unknown_residue_policy() {
        let mut catalogue = CenterCatalogue::standard();
        let atoms = vec![atom("C1", "XYZ", [0.0; 3])];
        let residue = residue_with(&atoms);
        assert!(catalogue.centers_for(&residue, &atoms, true).unwrap().is_empty());
        catalogue.ignore_unknown_residues = false;
        assert!(catalogue.centers_for(&residue, &atoms, true).is_err());
    }

    #[test]
    fn test_two_center_residues_produce_both() {
        let catalogue = CenterCatalogue::standard();
        let atoms = vec![
            atom("OH", "TYR", [0.0, 0.0, 0.0]),
            atom("CG", "TYR", [1.0, 0.0, 0.0]),
            atom("CD1", "TYR", [1.0, 1.0, 0.0]),
            atom("CD2", "TYR", [1.0, -1.0, 0.0]),
            atom("CE1", "TYR", [2.0, 1.0, 0.0]),
            atom("CE2", "TYR", [2.0, -1.0, 0.0]),
            atom("CZ", "TYR", [3.0, 0.0, 0.0]),
        ];
        let residue = residue_with(&atoms);
        let centers = catalogue.centers_for(&residue, &atoms, true).unwrap();
        assert_eq!(centers.len(), 2);
        assert_eq!(centers[0].code, "Y");
        assert_eq!(centers[1].code, "Y2");
        assert_eq!(centers[1].index, 1);
    }

    #[test]
    fn test_class_pairs_contains_expected() {
        let catalogue = CenterCatalogue::standard();
        let pairs = catalogue.class_pairs();
        // within non-polar
        assert!(pairs.contains(&("A".to_string(), "G".to_string())));
        assert!(pairs.contains(&("G".to_string(), "G".to_string())));
        // aromatic ring centers pair with each other
        assert!(pairs.contains(&("W2".to_string(), "Y2".to_string())));
        // across classes is not allowed
        assert!(!pairs.contains(&("G".to_string(), "R".to_string())));
        // all-pairs is a superset
        let all = catalogue.all_pairs();
        assert!(pairs.is_subset(&all));
        assert!(all.contains(&("G".to_string(), "R".to_string())));
    }

    #[test]
    fn test_class_lookup() {
        let catalogue = CenterCatalogue::standard();
        assert_eq!(catalogue.class_of("TYR", 0), Some("polar"));
        assert_eq!(catalogue.class_of("TYR", 1), Some("aromatic"));
        assert_eq!(catalogue.class_of("HIS", 1), None);
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            CenterRow {
                residue: "GLY".to_string(),
                atoms: vec!["CA".to_string()],
                class: Some("non-polar".to_string()),
            },
            CenterRow {
                residue: "TRP".to_string(),
                atoms: vec!["NE1".to_string()],
                class: Some("polar".to_string()),
            },
            CenterRow {
                residue: "TRP".to_string(),
                atoms: vec!["CD2".to_string(), "CE2".to_string()],
                class: Some("aromatic".to_string()),
            },
        ];
        let catalogue = CenterCatalogue::from_rows(&rows).unwrap();
        assert_eq!(catalogue.num_centers("TRP"), Some(2));
        assert_eq!(catalogue.class_of("TRP", 1), Some("aromatic"));
    }

    #[test]
    fn test_invalid_class_reference() {
        let centers = vec![("GLY".to_string(), vec![vec!["CA".to_string()]])];
        let classes = vec![("polar".to_string(), vec![("GLY".to_string(), 3)])];
        assert!(CenterCatalogue::from_tables(centers, classes).is_err());
    }
}
