//! Residue representation for protein structures

use serde::{Deserialize, Serialize};

use super::Atom;

/// Represents a residue in a protein structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Residue {
    /// Residue name (three-letter code, upper case)
    pub name: String,

    /// Chain identifier
    pub chain_id: char,

    /// Sequence number in chain
    pub seq_number: i32,

    /// Model number (defaults to 1)
    pub model: usize,

    /// Insertion code (if any)
    pub insertion_code: Option<char>,

    /// Whether the residue originates from a HETATM record
    pub is_hetatm: bool,

    /// Indices of atoms belonging to this residue
    pub atom_indices: Vec<usize>,
}

impl Residue {
    /// Create a new residue
    pub fn new(name: String, chain_id: char, seq_number: i32, insertion_code: Option<char>) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            chain_id,
            seq_number,
            model: 1,
            insertion_code,
            is_hetatm: false,
            atom_indices: Vec::new(),
        }
    }

    /// One-letter code for this residue ('X' for unknown)
    pub fn one_letter_code(&self) -> char {
        super::residue_code_three_to_one(&self.name)
    }

    /// Whether this residue is a ligand/solvent rather than protein
    pub fn is_hetero(&self) -> bool {
        self.is_hetatm || super::is_water(&self.name)
    }

    /// Whether this residue is a water
    pub fn is_water(&self) -> bool {
        super::is_water(&self.name)
    }

    /// Atoms of this residue, in file order
    pub fn atoms<'a>(&'a self, atoms: &'a [Atom]) -> impl Iterator<Item = &'a Atom> + 'a {
        self.atom_indices.iter().filter_map(move |&i| atoms.get(i))
    }

    /// Canonical atoms only (blank or 'A' alternate location)
    pub fn canonical_atoms<'a>(&'a self, atoms: &'a [Atom]) -> impl Iterator<Item = &'a Atom> + 'a {
        self.atoms(atoms).filter(|a| a.is_canonical())
    }

    /// Number of atoms in this residue
    pub fn atom_count(&self) -> usize {
        self.atom_indices.len()
    }

    /// Human-readable residue label ("GLY A 42")
    pub fn id_string(&self) -> String {
        format!("{} {} {}", self.name, self.chain_id, self.seq_number)
    }
}
