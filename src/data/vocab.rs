// ============================================================
// Layer 4 — Label Vocabulary
// ============================================================
// Maps each distinct value of a label column (BROWSE_NODE_ID,
// BRAND) to a dense integer id 0..n, and back.
//
// Id assignment order: first encounter while scanning the
// records in file order. Blank and missing values are skipped,
// so an all-empty column yields an empty vocabulary.
//
// A built vocabulary is saved as JSON next to the run output;
// a later run over the same base directory loads it instead of
// rebuilding, keeping ids stable across runs.
//
// File format ({dir}/{column}.json):
//   { "column": "BRAND", "values": ["Acme", "Milton", ...] }

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::product::ProductRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabFile {
    column: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Vocab {
    column: String,
    /// id → value
    values: Vec<String>,
    /// value → id
    index:  HashMap<String, usize>,
}

impl Vocab {
    /// Scan `column` over all records, assigning ids in first-encounter order.
    pub fn build(records: &[ProductRecord], column: &str) -> Self {
        let mut vocab = Self {
            column: column.to_string(),
            ..Default::default()
        };
        for value in records.iter().filter_map(|r| r.label(column)) {
            vocab.insert(value);
        }
        vocab
    }

    /// Load `{dir}/{column}.json` if present, otherwise build from the
    /// records and save it there.
    pub fn build_or_load(records: &[ProductRecord], column: &str, dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{column}.json"));
        if path.exists() {
            tracing::info!("Loading {} vocabulary from '{}'", column, path.display());
            return Self::load(&path);
        }
        let vocab = Self::build(records, column);
        vocab.save(&path)?;
        Ok(vocab)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = VocabFile {
            column: self.column.clone(),
            values: self.values.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
        tracing::debug!("Saved {} vocabulary ({} entries)", self.column, self.len());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary '{}'", path.display()))?;
        let file: VocabFile = serde_json::from_str(&json)
            .with_context(|| format!("Invalid vocabulary file '{}'", path.display()))?;

        let mut vocab = Self { column: file.column, ..Default::default() };
        for value in &file.values {
            vocab.insert(value);
        }
        Ok(vocab)
    }

    fn insert(&mut self, value: &str) {
        if !self.index.contains_key(value) {
            self.index.insert(value.to_string(), self.values.len());
            self.values.push(value.to_string());
        }
    }

    pub fn id(&self, value: &str) -> Option<usize> {
        self.index.get(value.trim()).copied()
    }

    pub fn value(&self, id: usize) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{BRAND_COLUMN, BROWSE_NODE_COLUMN};
    use std::collections::HashSet;

    fn record(node: Option<&str>, brand: Option<&str>) -> ProductRecord {
        ProductRecord {
            browse_node_id: node.map(String::from),
            brand:          brand.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_ids_follow_first_encounter() {
        let rows = vec![
            record(Some("30"), None),
            record(Some("10"), None),
            record(Some("30"), None),
            record(Some("20"), None),
        ];
        let v = Vocab::build(&rows, BROWSE_NODE_COLUMN);
        assert_eq!(v.id("30"), Some(0));
        assert_eq!(v.id("10"), Some(1));
        assert_eq!(v.id("20"), Some(2));
        assert_eq!(v.value(1), Some("10"));
    }

    #[test]
    fn test_ids_are_unique_and_dense() {
        let brands = ["a", "b", "a", "c", "b", "d"];
        let rows: Vec<_> = brands.iter().map(|b| record(Some("1"), Some(b))).collect();
        let v = Vocab::build(&rows, BRAND_COLUMN);

        let distinct: HashSet<_> = brands.iter().collect();
        assert_eq!(v.len(), distinct.len());

        let ids: HashSet<_> = brands.iter().filter_map(|b| v.id(b)).collect();
        assert_eq!(ids.len(), v.len());
        assert!(ids.iter().all(|&id| id < v.len()));
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let rows = vec![record(Some("1"), None), record(Some("2"), Some(""))];
        let v = Vocab::build(&rows, BRAND_COLUMN);
        assert!(v.is_empty());
    }

    #[test]
    fn test_empty_dataset_gives_empty_vocab() {
        let v = Vocab::build(&[], BROWSE_NODE_COLUMN);
        assert_eq!(v.len(), 0);
    }

    #[test]
    fn test_build_or_load_reuses_saved_file() {
        let dir   = tempfile::tempdir().unwrap();
        let first = vec![record(Some("5"), None), record(Some("6"), None)];
        let built = Vocab::build_or_load(&first, BROWSE_NODE_COLUMN, dir.path()).unwrap();
        assert_eq!(built.len(), 2);

        // Different data, same directory: the saved ids win
        let second = vec![record(Some("9"), None)];
        let loaded = Vocab::build_or_load(&second, BROWSE_NODE_COLUMN, dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.id("6"), Some(1));
        assert_eq!(loaded.id("9"), None);
        assert_eq!(loaded.column(), BROWSE_NODE_COLUMN);
    }
}
