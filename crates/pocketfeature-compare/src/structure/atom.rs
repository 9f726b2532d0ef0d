//! Atom representation for protein structures

use serde::{Deserialize, Serialize};

use pocketfeature_core::Point3D;

/// Represents a single atom in a protein structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Atom serial number
    pub serial: u32,

    /// Atom name (e.g., "CA", "OG", "NE1")
    pub name: String,

    /// Residue name (e.g., "ALA", "GLY")
    pub residue_name: String,

    /// Chain identifier
    pub chain_id: char,

    /// Residue sequence number
    pub residue_seq: i32,

    /// Optional insertion code (PDB column 27)
    pub insertion_code: Option<char>,

    /// 3D coordinates [x, y, z] in Angstroms
    pub coord: [f64; 3],

    /// Occupancy factor (0.0-1.0)
    pub occupancy: f64,

    /// B-factor (temperature factor)
    pub b_factor: f64,

    /// Element symbol (e.g., "C", "N", "O")
    pub element: String,

    /// Alternate location identifier (if present)
    pub alt_loc: Option<char>,

    /// Model number (defaults to 1 for single-model structures)
    pub model: usize,

    /// Whether this came from a HETATM record
    pub is_hetatm: bool,
}

impl Atom {
    /// Create an atom from parsed PDB fields
    #[allow(clippy::too_many_arguments)]
    pub fn from_pdb_fields(
        serial: u32,
        name: String,
        residue_name: String,
        chain_id: char,
        residue_seq: i32,
        insertion_code: Option<char>,
        coord: [f64; 3],
        occupancy: f64,
        b_factor: f64,
        element: String,
        alt_loc: Option<char>,
        model: usize,
        is_hetatm: bool,
    ) -> Self {
        Self {
            serial,
            name,
            residue_name: residue_name.to_ascii_uppercase(),
            chain_id,
            residue_seq,
            insertion_code,
            coord,
            occupancy,
            b_factor,
            element: element.to_ascii_uppercase(),
            alt_loc,
            model,
            is_hetatm,
        }
    }

    /// Check if this is a backbone atom
    pub fn is_backbone(&self) -> bool {
        matches!(self.name.as_str(), "N" | "CA" | "C" | "O")
    }

    /// Check if this is a heavy atom (non-hydrogen)
    pub fn is_heavy(&self) -> bool {
        self.element != "H"
    }

    /// Check if this is a heteroatom (from ligand, water, etc.)
    pub fn is_hetero(&self) -> bool {
        self.is_hetatm || super::is_water(self.residue_name.as_str())
    }

    /// Whether this atom is the canonical copy (blank or 'A' altLoc)
    pub fn is_canonical(&self) -> bool {
        matches!(self.alt_loc, None | Some('A'))
    }

    /// Position as a geometry point
    pub fn point(&self) -> Point3D {
        Point3D::from(self.coord)
    }

    /// Distance to another atom
    pub fn distance_to(&self, other: &Atom) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// Distance squared (more efficient when comparing distances)
    pub fn distance_squared_to(&self, other: &Atom) -> f64 {
        (self.coord[0] - other.coord[0]).powi(2)
            + (self.coord[1] - other.coord[1]).powi(2)
            + (self.coord[2] - other.coord[2]).powi(2)
    }
}
