//! PDB parsing and in-memory structure representation

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use pocketfeature_core::{PocketError, Result};

use super::{Atom, Residue};

/// Options controlling how PDB files are parsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdbParseOptions {
    /// Include HETATM records (ligands, waters, ions)
    pub include_hetatm: bool,
    /// Parse all models instead of just the first
    pub include_all_models: bool,
    /// Keep alternate location records (B, C, etc.). If false, only blank/A altLoc are used
    pub keep_alternate_locations: bool,
}

impl Default for PdbParseOptions {
    fn default() -> Self {
        Self {
            include_hetatm: true,
            include_all_models: false,
            keep_alternate_locations: false,
        }
    }
}

/// In-memory representation of a protein structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinStructure {
    /// PDB identifier if present in the HEADER record
    pub pdb_id: Option<String>,
    /// All atoms (ordered as parsed)
    pub atoms: Vec<Atom>,
    /// All residues
    pub residues: Vec<Residue>,
    /// Residue indices grouped by chain identifier
    pub chain_residue_indices: HashMap<char, Vec<usize>>,
    /// Indices of residues coming from HETATM records
    pub hetero_residue_indices: Vec<usize>,
    /// Model numbers present (in file order)
    pub model_numbers: Vec<usize>,
    /// Whether the source contained alternate locations
    pub has_alternate_locations: bool,
}

impl ProteinStructure {
    /// Parse a PDB file from disk
    pub fn from_pdb_file(path: &Path) -> Result<Self> {
        Self::from_pdb_file_with_options(path, PdbParseOptions::default())
    }

    /// Parse a PDB file with custom options
    pub fn from_pdb_file_with_options(path: &Path, options: PdbParseOptions) -> Result<Self> {
        let pdb_data = fs::read_to_string(path)
            .map_err(|e| PocketError::input(format!("cannot read {}: {e}", path.display())))?;
        let mut structure = Self::from_pdb_str_with_options(&pdb_data, options)?;
        if structure.pdb_id.is_none() {
            // Fall back to the file stem for locally named files
            structure.pdb_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_ascii_uppercase());
        }
        Ok(structure)
    }

    /// Parse a PDB structure from an in-memory string
    pub fn from_pdb_str(contents: &str) -> Result<Self> {
        Self::from_pdb_str_with_options(contents, PdbParseOptions::default())
    }

    /// Parse a PDB structure from an in-memory string with custom options
    pub fn from_pdb_str_with_options(contents: &str, options: PdbParseOptions) -> Result<Self> {
        let mut structure = ProteinStructure::default();
        let mut residue_lookup: HashMap<(usize, char, i32, Option<char>), usize> = HashMap::new();
        let mut current_model: usize = 1;

        for line in contents.lines() {
            if line.starts_with("HEADER") {
                if let Some(pdb_id) = line.get(62..66).and_then(extract_token) {
                    structure.pdb_id = Some(pdb_id.to_string());
                }
            } else if line.starts_with("MODEL") {
                current_model = parse_usize_field(line, 10..14).unwrap_or(current_model + 1);
                if !options.include_all_models && current_model > 1 {
                    continue;
                }
            } else if line.starts_with("ENDMDL") && !options.include_all_models {
                break;
            }

            let record = line.get(0..6).unwrap_or("").trim();
            if record != "ATOM" && record != "HETATM" {
                continue;
            }

            let is_hetatm = record == "HETATM";
            if is_hetatm && !options.include_hetatm {
                continue;
            }

            let alt_loc = line.get(16..17).and_then(extract_char);
            if alt_loc.is_some() {
                structure.has_alternate_locations = true;
            }
            if !options.keep_alternate_locations && !matches!(alt_loc, None | Some('A')) {
                continue;
            }

            if !options.include_all_models && current_model > 1 {
                continue;
            }

            let atom = parse_atom_line(line, current_model, is_hetatm, alt_loc)
                .map_err(PocketError::Input)?;

            if !structure.model_numbers.contains(&atom.model) {
                structure.model_numbers.push(atom.model);
            }

            let residue_key = (
                atom.model,
                atom.chain_id,
                atom.residue_seq,
                atom.insertion_code,
            );
            let residue_index = *residue_lookup.entry(residue_key).or_insert_with(|| {
                let mut residue = Residue::new(
                    atom.residue_name.clone(),
                    atom.chain_id,
                    atom.residue_seq,
                    atom.insertion_code,
                );
                residue.model = atom.model;
                residue.is_hetatm = is_hetatm;
                structure.residues.push(residue);
                let idx = structure.residues.len() - 1;
                structure
                    .chain_residue_indices
                    .entry(atom.chain_id)
                    .or_default()
                    .push(idx);
                if is_hetatm {
                    structure.hetero_residue_indices.push(idx);
                }
                idx
            });

            let atom_index = structure.atoms.len();
            structure.atoms.push(atom);
            if let Some(residue) = structure.residues.get_mut(residue_index) {
                residue.atom_indices.push(atom_index);
                residue.is_hetatm |= is_hetatm;
            }
        }

        Ok(structure)
    }

    /// Number of atoms in the structure
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of residues in the structure
    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    /// Unique chain identifiers present in the structure (sorted)
    pub fn chain_ids(&self) -> Vec<char> {
        let mut ids: Vec<char> = self.chain_residue_indices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Restrict to one model (0 selects the first present) and
    /// optionally one chain, producing a reindexed structure.
    pub fn focus(&self, model: usize, chain: Option<char>) -> Result<ProteinStructure> {
        let model = if model == 0 {
            *self
                .model_numbers
                .first()
                .ok_or_else(|| PocketError::input("structure has no atoms".to_string()))?
        } else if self.model_numbers.contains(&model) {
            model
        } else {
            return Err(PocketError::input(format!("model {model} not found")));
        };
        if let Some(chain) = chain {
            if !self.chain_residue_indices.contains_key(&chain) {
                return Err(PocketError::input(format!("chain {chain} not found")));
            }
        }

        let mut focused = ProteinStructure {
            pdb_id: self.pdb_id.clone(),
            has_alternate_locations: self.has_alternate_locations,
            model_numbers: vec![model],
            ..ProteinStructure::default()
        };
        for residue in &self.residues {
            if residue.model != model {
                continue;
            }
            if chain.is_some_and(|c| c != residue.chain_id) {
                continue;
            }
            let mut kept = residue.clone();
            kept.atom_indices = Vec::new();
            for &atom_idx in &residue.atom_indices {
                let atom = self.atoms[atom_idx].clone();
                kept.atom_indices.push(focused.atoms.len());
                focused.atoms.push(atom);
            }
            let idx = focused.residues.len();
            focused.residues.push(kept);
            focused
                .chain_residue_indices
                .entry(residue.chain_id)
                .or_default()
                .push(idx);
            if residue.is_hetatm {
                focused.hetero_residue_indices.push(idx);
            }
        }
        Ok(focused)
    }

    /// Het residues that can define a pocket (not water), in file order
    pub fn list_ligands(&self) -> Vec<usize> {
        self.hetero_residue_indices
            .iter()
            .copied()
            .filter(|&i| !self.residues[i].is_water())
            .collect()
    }

    /// The largest het residue by atom count, ties by first occurrence
    pub fn pick_best_ligand(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for idx in self.list_ligands() {
            match best {
                Some(b) if self.residues[idx].atom_count() <= self.residues[b].atom_count() => {}
                _ => best = Some(idx),
            }
        }
        best
    }

    /// First het residue whose name is in `names`
    pub fn find_ligand(&self, names: &[String]) -> Option<usize> {
        self.list_ligands()
            .into_iter()
            .find(|&i| names.iter().any(|n| n.eq_ignore_ascii_case(&self.residues[i].name)))
    }
}

fn parse_atom_line(
    line: &str,
    model: usize,
    is_hetatm: bool,
    alt_loc: Option<char>,
) -> std::result::Result<Atom, String> {
    let serial = parse_u32_field(line, 6..11)
        .ok_or_else(|| format!("Invalid atom serial in line: {line}"))?;
    let name = line
        .get(12..16)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing atom name in line: {line}"))?
        .to_string();

    let residue_name = line
        .get(17..20)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing residue name in line: {line}"))?
        .to_ascii_uppercase();

    let chain_id = line.get(21..22).and_then(extract_char).unwrap_or('A');
    let residue_seq = parse_i32_field(line, 22..26).unwrap_or(0);
    let insertion_code = line.get(26..27).and_then(extract_char);

    let x = parse_f64_field(line, 30..38)
        .ok_or_else(|| format!("Missing X coordinate in line: {line}"))?;
    let y = parse_f64_field(line, 38..46)
        .ok_or_else(|| format!("Missing Y coordinate in line: {line}"))?;
    let z = parse_f64_field(line, 46..54)
        .ok_or_else(|| format!("Missing Z coordinate in line: {line}"))?;

    let occupancy = parse_f64_field(line, 54..60).unwrap_or(1.0);
    let b_factor = parse_f64_field(line, 60..66).unwrap_or(0.0);
    let element_field = line.get(76..78).map(str::trim).unwrap_or("");
    let element = resolve_element(element_field, &name);

    Ok(Atom::from_pdb_fields(
        serial,
        name,
        residue_name,
        chain_id,
        residue_seq,
        insertion_code,
        [x, y, z],
        occupancy,
        b_factor,
        element,
        alt_loc,
        model,
        is_hetatm,
    ))
}

fn parse_f64_field(line: &str, range: std::ops::Range<usize>) -> Option<f64> {
    line.get(range)?.trim().parse::<f64>().ok()
}

fn parse_i32_field(line: &str, range: std::ops::Range<usize>) -> Option<i32> {
    line.get(range)?.trim().parse::<i32>().ok()
}

fn parse_u32_field(line: &str, range: std::ops::Range<usize>) -> Option<u32> {
    line.get(range)?.trim().parse::<u32>().ok()
}

fn parse_usize_field(line: &str, range: std::ops::Range<usize>) -> Option<usize> {
    line.get(range)?.trim().parse::<usize>().ok()
}

fn extract_char(slice: &str) -> Option<char> {
    let trimmed = slice.trim();
    trimmed.chars().next()
}

fn extract_token(slice: &str) -> Option<&str> {
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn resolve_element(element_field: &str, atom_name: &str) -> String {
    if !element_field.is_empty() {
        return element_field.to_ascii_uppercase();
    }
    // Derive element from atom name (strip digits)
    atom_name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(1)
        .collect::<String>()
        .to_ascii_uppercase()
}
