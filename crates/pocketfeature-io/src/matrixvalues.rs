//! Sparse, insertion-ordered score/coefficient matrices.
//!
//! `MatrixValues` maps composite string keys to scalar or tuple values,
//! tracking an insertion-ordered integer id for each distinct key value
//! along every dimension. Dense materialisation takes an explicit fill
//! value for missing entries.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{BufRead, Write};

use pocketfeature_core::{PocketError, Result};

/// Insertion-ordered assignment of dense integer ids to string keys.
#[derive(Debug, Clone, Default)]
pub struct Indexer {
    ids: HashMap<String, usize>,
    keys: Vec<String>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a key, assigning the next dense id if unseen.
    pub fn add(&mut self, key: &str) -> usize {
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = self.keys.len();
        self.ids.insert(key.to_string(), id);
        self.keys.push(key.to_string());
        id
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.ids.get(key).copied()
    }

    /// Key for a dense id (the reverse mapping)
    pub fn key(&self, id: usize) -> Option<&str> {
        self.keys.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Ordered sparse mapping from key tuples to value tuples.
#[derive(Debug, Clone, Default)]
pub struct MatrixValues {
    entries: Vec<(Vec<String>, Vec<f64>)>,
    position: HashMap<Vec<String>, usize>,
    indexers: Vec<Indexer>,
    value_names: Vec<String>,
}

impl MatrixValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with named value dimensions.
    pub fn with_value_names(names: &[&str]) -> Self {
        Self {
            value_names: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn from_entries<I>(entries: I, value_names: &[&str]) -> Self
    where
        I: IntoIterator<Item = (Vec<String>, Vec<f64>)>,
    {
        let mut matrix = Self::with_value_names(value_names);
        for (key, value) in entries {
            matrix.set(key, value);
        }
        matrix
    }

    /// Insert or overwrite a key; overwriting keeps the original position.
    pub fn set(&mut self, key: Vec<String>, value: Vec<f64>) {
        while self.indexers.len() < key.len() {
            self.indexers.push(Indexer::new());
        }
        for (i, part) in key.iter().enumerate() {
            self.indexers[i].add(part);
        }
        if let Some(&pos) = self.position.get(&key) {
            self.entries[pos].1 = value;
        } else {
            self.position.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &[String]) -> Option<&[f64]> {
        self.position
            .get(key)
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    pub fn contains_key(&self, key: &[String]) -> bool {
        self.position.contains_key(key)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&[String], &[f64])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of key dimensions
    pub fn dims(&self) -> usize {
        self.indexers.len()
    }

    /// Number of value columns per entry
    pub fn value_dims(&self) -> usize {
        if !self.value_names.is_empty() {
            self.value_names.len()
        } else {
            self.entries.first().map(|(_, v)| v.len()).unwrap_or(1)
        }
    }

    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    pub fn indexer(&self, dim: usize) -> Option<&Indexer> {
        self.indexers.get(dim)
    }

    /// Sum of the first value column over all entries
    pub fn total(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|(_, v)| v.first())
            .sum()
    }

    /// Dense row-major materialisation with shape
    /// `(|dim_0|, ..., |dim_{d-1}|, value_dims)`.
    pub fn to_dense(&self, fill: f64) -> (Vec<f64>, Vec<usize>) {
        let mut shape: Vec<usize> = self.indexers.iter().map(Indexer::len).collect();
        let value_dims = self.value_dims();
        shape.push(value_dims);
        let total: usize = shape.iter().product();
        let mut dense = vec![fill; total];
        for (key, value) in &self.entries {
            let mut offset = 0;
            for (i, part) in key.iter().enumerate() {
                let id = self.indexers[i].get(part).unwrap_or(0);
                offset = offset * self.indexers[i].len() + id;
            }
            let base = offset * value_dims;
            for (j, v) in value.iter().take(value_dims).enumerate() {
                dense[base + j] = *v;
            }
        }
        (dense, shape)
    }

    /// Index of a value column, by name or rendered integer.
    fn value_column(&self, selector: &str) -> Result<usize> {
        if let Some(idx) = self.value_names.iter().position(|n| n == selector) {
            return Ok(idx);
        }
        selector
            .parse::<usize>()
            .ok()
            .filter(|&i| i < self.value_dims())
            .ok_or_else(|| PocketError::format(format!("unknown value column: {selector}")))
    }

    /// Project to a single value column, yielding a scalar-valued matrix.
    pub fn slice_values(&self, selector: &str) -> Result<MatrixValues> {
        let col = self.value_column(selector)?;
        Ok(MatrixValues::from_entries(
            self.entries.iter().map(|(k, v)| {
                (k.clone(), vec![v.get(col).copied().unwrap_or(0.0)])
            }),
            &[],
        ))
    }

    /// Restrict to the listed keys, in the listed order.
    pub fn subset_from_keys(&self, keys: &[Vec<String>]) -> MatrixValues {
        let names: Vec<&str> = self.value_names.iter().map(|s| s.as_str()).collect();
        MatrixValues::from_entries(
            keys.iter()
                .filter_map(|k| self.get(k).map(|v| (k.clone(), v.to_vec()))),
            &names,
        )
    }

    /// Translate dense-index tuples back into keys and restrict to them.
    pub fn subset_from_indexes(&self, indexes: &[Vec<usize>]) -> MatrixValues {
        let keys: Vec<Vec<String>> = indexes
            .iter()
            .filter_map(|idx| {
                idx.iter()
                    .enumerate()
                    .map(|(dim, &i)| {
                        self.indexers
                            .get(dim)
                            .and_then(|ix| ix.key(i))
                            .map(|s| s.to_string())
                    })
                    .collect::<Option<Vec<String>>>()
            })
            .collect();
        self.subset_from_keys(&keys)
    }
}

/// Parse a MatrixValues file.
///
/// `dims` is the number of key columns. With `header = true` the first
/// row is `INDEX\t...\tname_0\tname_1...` and supplies value names.
pub fn load<R: BufRead>(reader: R, dims: usize, header: bool) -> Result<MatrixValues> {
    load_columns(reader, dims, header, None)
}

/// Like [`load`], keeping only the requested value columns (by name or
/// zero-based position).
pub fn load_columns<R: BufRead>(
    reader: R,
    dims: usize,
    header: bool,
    columns: Option<&[&str]>,
) -> Result<MatrixValues> {
    let mut lines = reader.lines();
    let mut names: Vec<String> = Vec::new();
    if header {
        let line = lines
            .next()
            .transpose()?
            .ok_or_else(|| PocketError::format("missing header row".to_string()))?;
        names = line
            .split('\t')
            .skip(dims)
            .map(|s| s.trim().to_string())
            .collect();
    }

    // Resolve requested columns against header names when available
    let selected: Option<Vec<usize>> = match columns {
        None => None,
        Some(cols) => Some(
            cols.iter()
                .map(|c| {
                    names
                        .iter()
                        .position(|n| n == c)
                        .or_else(|| c.parse::<usize>().ok())
                        .ok_or_else(|| PocketError::format(format!("unknown column: {c}")))
                })
                .collect::<Result<_>>()?,
        ),
    };
    if let (Some(sel), false) = (&selected, names.is_empty()) {
        let projected: Vec<String> = sel
            .iter()
            .map(|&i| names.get(i).cloned().unwrap_or_else(|| i.to_string()))
            .collect();
        names = projected;
    }

    let mut matrix = MatrixValues {
        value_names: names,
        ..MatrixValues::default()
    };
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split('\t').collect();
        if tokens.len() <= dims {
            return Err(PocketError::format(format!(
                "expected at least {} columns: {line}",
                dims + 1
            )));
        }
        let key: Vec<String> = tokens[..dims].iter().map(|s| s.trim().to_string()).collect();
        let mut values: Vec<f64> = tokens[dims..]
            .iter()
            .map(|t| {
                t.trim()
                    .parse::<f64>()
                    .map_err(|_| PocketError::format(format!("bad value {t:?} in line: {line}")))
            })
            .collect::<Result<_>>()?;
        if let Some(sel) = &selected {
            values = sel
                .iter()
                .map(|&i| values.get(i).copied().unwrap_or(0.0))
                .collect();
        }
        matrix.set(key, values);
    }
    Ok(matrix)
}

/// Parse a MatrixValues file from a string.
pub fn loads(data: &str, dims: usize, header: bool) -> Result<MatrixValues> {
    load(data.as_bytes(), dims, header)
}

/// Write a MatrixValues file, optionally with the header row.
pub fn dump<W: Write>(matrix: &MatrixValues, writer: &mut W, header: bool) -> Result<()> {
    write!(writer, "{}", dumps(matrix, header))?;
    Ok(())
}

/// Render a MatrixValues file as a string.
pub fn dumps(matrix: &MatrixValues, header: bool) -> String {
    let mut out = String::new();
    if header && !matrix.value_names().is_empty() {
        let mut row: Vec<String> = vec!["INDEX".to_string(); matrix.dims().max(1)];
        row.extend(matrix.value_names().iter().cloned());
        let _ = writeln!(out, "{}", row.join("\t"));
    }
    for (key, values) in matrix.iter() {
        out.push_str(&key.join("\t"));
        for v in values {
            let _ = write!(out, "\t{v:.6}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> MatrixValues {
        MatrixValues::from_entries(
            vec![
                (key(&["a1", "b1"]), vec![1.0, 10.0]),
                (key(&["a1", "b2"]), vec![2.0, 20.0]),
                (key(&["a2", "b1"]), vec![3.0, 30.0]),
            ],
            &["raw", "normalized"],
        )
    }

    #[test]
    fn test_insertion_order_preserved() {
        let m = sample();
        let keys: Vec<_> = m.iter().map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys[0], key(&["a1", "b1"]));
        assert_eq!(keys[2], key(&["a2", "b1"]));
        // overwriting keeps position
        let mut m = m;
        m.set(key(&["a1", "b1"]), vec![9.0, 90.0]);
        assert_eq!(m.iter().next().unwrap().1, &[9.0, 90.0]);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_to_dense_with_fill() {
        let m = sample();
        let (dense, shape) = m.to_dense(f64::INFINITY);
        assert_eq!(shape, vec![2, 2, 2]);
        // (a2, b2) is missing
        let idx = (1 * 2 + 1) * 2;
        assert!(dense[idx].is_infinite());
        assert_eq!(dense[0], 1.0);
        assert_eq!(dense[1], 10.0);
    }

    #[test]
    fn test_slice_and_subsets() {
        let m = sample();
        let norm = m.slice_values("normalized").unwrap();
        assert_eq!(norm.get(&key(&["a1", "b2"])), Some(&[20.0][..]));
        assert_eq!(norm.value_dims(), 1);

        let sub = m.subset_from_keys(&[key(&["a2", "b1"])]);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.get(&key(&["a2", "b1"])), Some(&[3.0, 30.0][..]));

        let sub = m.subset_from_indexes(&[vec![0, 1]]);
        assert_eq!(sub.len(), 1);
        assert!(sub.contains_key(&key(&["a1", "b2"])));
    }

    #[test]
    fn test_total() {
        assert!((sample().total() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_file_round_trip_with_header() {
        let m = sample();
        let text = dumps(&m, true);
        assert!(text.starts_with("INDEX\tINDEX\traw\tnormalized\n"));
        let parsed = loads(&text, 2, true).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.value_names(), &["raw".to_string(), "normalized".to_string()]);
        for (k, v) in m.iter() {
            let got = parsed.get(k).unwrap();
            for (a, b) in v.iter().zip(got) {
                assert!((a - b).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_load_column_projection() {
        let m = sample();
        let text = dumps(&m, true);
        let parsed = load_columns(text.as_bytes(), 2, true, Some(&["normalized"])).unwrap();
        assert_eq!(parsed.value_dims(), 1);
        assert_eq!(parsed.get(&key(&["a1", "b1"])), Some(&[10.0][..]));
    }
}
