//! Pocket extraction: the microenvironments of a ligand binding site.

use std::collections::HashSet;

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use pocketfeature_core::{PdbPoint, PocketError, Point3D, Result};

use crate::residues::{CenterCatalogue, CenterPoint};
use crate::structure::ProteinStructure;

/// The `(pdbid, ligchain, ligresnum, ligname)` identity of a pocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketSignature {
    pub pdbid: String,
    pub chain: String,
    pub resnum: String,
    pub ligname: String,
}

impl PocketSignature {
    pub fn to_signature_string(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.pdbid, self.chain, self.resnum, self.ligname
        )
    }
}

/// One pocket residue with the centers retained for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocketResidue {
    pub residue_index: usize,
    pub name: String,
    pub chain_id: char,
    pub seq_number: i32,
    /// Retained centers: (code, catalogue index, averaged coordinate)
    pub centers: Vec<(String, usize, Point3D)>,
}

/// An ordered set of microenvironments around a defining ligand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pocket {
    pub signature: PocketSignature,
    pub name: Option<String>,
    pub residues: Vec<PocketResidue>,
}

impl Pocket {
    /// `pdbid_ligchain_ligresnum_ligname` (ligname spaces become '-')
    pub fn signature_string(&self) -> String {
        self.signature.to_signature_string()
    }

    pub fn num_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn num_points(&self) -> usize {
        self.residues.iter().map(|r| r.centers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Microenvironment points in deterministic order: residues by
    /// ascending sequence number, centers in catalogue order.
    ///
    /// Each comment is
    /// `signature_resnum_resletter_centeridx_chain\t#\tcentercode`.
    pub fn points(&self) -> Vec<PdbPoint> {
        let signature = self.signature_string();
        let mut points = Vec::with_capacity(self.num_points());
        for residue in &self.residues {
            let letter = crate::structure::residue_code_three_to_one(&residue.name);
            for (code, index, point) in &residue.centers {
                let comment = format!(
                    "{}_{}_{}_{}_{}\t#\t{}",
                    signature, residue.seq_number, letter, index, residue.chain_id, code
                );
                points.push(PdbPoint::new(*point, &self.signature.pdbid, comment));
            }
        }
        points
    }
}

/// Options for pocket extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocketBuilderOptions {
    /// Ligand-to-center distance cutoff in Angstroms
    pub cutoff: f64,
    /// Expand disordered ligand atoms into all alternate positions
    pub expand_disordered: bool,
    /// Emit only the centers retained by the cutoff test; otherwise the
    /// full catalogue list is re-applied per residue
    pub exact_points: bool,
    /// Silently drop centers with missing atoms
    pub skip_partial_residues: bool,
}

impl Default for PocketBuilderOptions {
    fn default() -> Self {
        Self {
            cutoff: 6.0,
            expand_disordered: true,
            exact_points: true,
            skip_partial_residues: true,
        }
    }
}

/// R-tree entry for a structure atom
struct AtomSite {
    pos: [f64; 3],
    residue_index: usize,
}

impl RTreeObject for AtomSite {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for AtomSite {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        (self.pos[0] - point[0]).powi(2)
            + (self.pos[1] - point[1]).powi(2)
            + (self.pos[2] - point[2]).powi(2)
    }
}

/// Extract the pocket around a ligand residue.
///
/// An empty pocket (no residues within cutoff) is a valid result and is
/// reported to the caller as such, not as an error.
pub fn build_pocket(
    structure: &ProteinStructure,
    ligand_index: usize,
    catalogue: &CenterCatalogue,
    options: &PocketBuilderOptions,
) -> Result<Pocket> {
    let ligand = structure
        .residues
        .get(ligand_index)
        .ok_or_else(|| PocketError::internal(format!("no residue at index {ligand_index}")))?;

    // Query set: one point per ligand atom, multiplied over alternate
    // positions when expanding disordered atoms
    let queries: Vec<[f64; 3]> = ligand
        .atoms(&structure.atoms)
        .filter(|a| options.expand_disordered || a.is_canonical())
        .map(|a| a.coord)
        .collect();
    if queries.is_empty() {
        return Err(PocketError::input(format!(
            "ligand {} has no atoms",
            ligand.id_string()
        )));
    }

    // Neighbor index over canonical non-het atoms
    let sites: Vec<AtomSite> = structure
        .residues
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_hetero())
        .flat_map(|(residue_index, r)| {
            r.canonical_atoms(&structure.atoms).map(move |a| AtomSite {
                pos: a.coord,
                residue_index,
            })
        })
        .collect();
    let tree = RTree::bulk_load(sites);

    let cutoff = options.cutoff;
    let cutoff_sq = cutoff * cutoff;
    let mut picked: HashSet<usize> = HashSet::new();
    let mut selected: Vec<(usize, Vec<CenterPoint>)> = Vec::new();
    for query in &queries {
        for site in tree.locate_within_distance(*query, cutoff_sq) {
            let residue_index = site.residue_index;
            if picked.contains(&residue_index) {
                continue;
            }
            let residue = &structure.residues[residue_index];
            let centers = catalogue.centers_for(
                residue,
                &structure.atoms,
                options.skip_partial_residues,
            )?;
            // A center survives iff it is within cutoff of any query point
            let kept: Vec<CenterPoint> = centers
                .into_iter()
                .filter(|c| {
                    queries.iter().any(|q| {
                        c.point.distance_squared(&Point3D::from(*q)) <= cutoff_sq
                    })
                })
                .collect();
            if !kept.is_empty() {
                picked.insert(residue_index);
                selected.push((residue_index, kept));
            }
        }
    }
    selected.sort_by_key(|(residue_index, _)| structure.residues[*residue_index].seq_number);

    let mut residues = Vec::with_capacity(selected.len());
    for (residue_index, kept) in selected {
        let residue = &structure.residues[residue_index];
        let centers = if options.exact_points {
            kept
        } else {
            catalogue.centers_for(residue, &structure.atoms, options.skip_partial_residues)?
        };
        residues.push(PocketResidue {
            residue_index,
            name: residue.name.clone(),
            chain_id: residue.chain_id,
            seq_number: residue.seq_number,
            centers: centers
                .into_iter()
                .map(|c| (c.code, c.index, c.point))
                .collect(),
        });
    }

    let pdbid = structure.pdb_id.clone().unwrap_or_else(|| "-".to_string());
    let pocket = Pocket {
        signature: PocketSignature {
            pdbid,
            chain: ligand.chain_id.to_string(),
            resnum: ligand.seq_number.to_string(),
            ligname: ligand.name.replace(' ', "-"),
        },
        name: None,
        residues,
    };
    debug!(
        "pocket {} has {} residues, {} points",
        pocket.signature_string(),
        pocket.num_residues(),
        pocket.num_points()
    );
    Ok(pocket)
}

/// Recover the pocket signature from the first point of a pointfile.
pub fn pocket_signature_from_points(points: &[PdbPoint]) -> Result<String> {
    let first = points
        .first()
        .ok_or_else(|| PocketError::empty("no signature for empty pocket".to_string()))?;
    let signature = first
        .signature()
        .ok_or_else(|| PocketError::format("pocket point has no comment".to_string()))?;
    let parts: Vec<&str> = signature
        .trim_matches('_')
        .split('_')
        .take(4)
        .collect();
    Ok(parts.join("_"))
}
