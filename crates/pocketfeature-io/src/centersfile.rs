//! Residue-center definition files.
//!
//! Row grammar: `RES\tatom1,atom2,...[\tCLASS]` with `#` starting a
//! comment. Multiple rows for the same residue enumerate its centers in
//! order, starting at index 0.

use std::io::{BufRead, Write};

use pocketfeature_core::{PocketError, Result};

/// One row of a centers file: a residue code, the atom-name set of the
/// next center for that residue, and an optional class label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterRow {
    pub residue: String,
    pub atoms: Vec<String>,
    pub class: Option<String>,
}

/// Parse a centers file into its ordered rows.
pub fn load<R: BufRead>(reader: R) -> Result<Vec<CenterRow>> {
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = match line.split_once('#') {
            Some((data, _)) => data,
            None => line.as_str(),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t').map(str::trim).filter(|f| !f.is_empty());
        let residue = fields
            .next()
            .ok_or_else(|| PocketError::format(format!("missing residue code: {line}")))?
            .to_ascii_uppercase();
        let atoms: Vec<String> = fields
            .next()
            .ok_or_else(|| PocketError::format(format!("missing atom list for {residue}")))?
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if atoms.is_empty() {
            return Err(PocketError::format(format!(
                "empty atom list for residue {residue}"
            )));
        }
        let class = fields.next().map(|c| c.to_string());
        rows.push(CenterRow {
            residue,
            atoms,
            class,
        });
    }
    Ok(rows)
}

/// Parse a centers file from a string.
pub fn loads(data: &str) -> Result<Vec<CenterRow>> {
    load(data.as_bytes())
}

/// Write centers rows back to a stream.
pub fn dump<W: Write>(rows: &[CenterRow], writer: &mut W) -> Result<()> {
    for row in rows {
        match &row.class {
            Some(class) => writeln!(writer, "{}\t{}\t{}", row.residue, row.atoms.join(","), class)?,
            None => writeln!(writer, "{}\t{}", row.residue, row.atoms.join(","))?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rows() {
        let text = "\
# default centers
GLY\tCA\tnon-polar
TRP\tNE1\tpolar
TRP\tCD2,CE2,CE3,CZ2,CZ3,CH2\taromatic
UNK\tC1,C2
";
        let rows = loads(text).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].residue, "GLY");
        assert_eq!(rows[0].class.as_deref(), Some("non-polar"));
        assert_eq!(rows[2].atoms.len(), 6);
        assert_eq!(rows[3].class, None);
    }

    #[test]
    fn test_round_trip() {
        let rows = vec![
            CenterRow {
                residue: "SER".to_string(),
                atoms: vec!["OG".to_string()],
                class: Some("polar".to_string()),
            },
            CenterRow {
                residue: "ALA".to_string(),
                atoms: vec!["CB".to_string()],
                class: None,
            },
        ];
        let mut buf = Vec::new();
        dump(&rows, &mut buf).unwrap();
        let parsed = load(buf.as_slice()).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn test_empty_atom_list_is_error() {
        assert!(loads("GLY\t,\n").is_err());
    }
}
