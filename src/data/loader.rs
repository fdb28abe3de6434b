// ============================================================
// Layer 4 — CSV Catalogue Loader
// ============================================================
// Loads product records from a CSV file with a header row
// using the csv crate's serde integration.
//
// Expected columns (any order, extra columns ignored):
//   TITLE, DESCRIPTION, BULLET_POINTS, BRAND, BROWSE_NODE_ID
//
// A malformed row is an error, not a skipped row: the
// training set must be exactly what the file says it is.
//
// Reference: csv crate documentation (Reader::deserialize)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::domain::product::ProductRecord;
use crate::domain::traits::ExampleSource;

/// Reads catalogue rows from a CSV file.
/// Implements the ExampleSource trait from Layer 3.
pub struct CsvLoader {
    path:  PathBuf,
    /// Keep only the first `limit` rows when set
    limit: Option<usize>,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), limit: None }
    }

    /// Restrict loading to the first `limit` data rows
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

impl ExampleSource for CsvLoader {
    fn load_all(&self) -> Result<Vec<ProductRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open CSV '{}'", self.path.display()))?;

        let limit   = self.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();

        for (row, record) in reader.deserialize::<ProductRecord>().take(limit).enumerate() {
            // +2: one for the header line, one for 1-based numbering
            let record = record.with_context(|| {
                format!("Malformed row {} in '{}'", row + 2, self.path.display())
            })?;
            out.push(record);
        }

        if let Some(limit) = self.limit {
            if out.len() < limit {
                tracing::warn!(
                    "Requested {} rows but '{}' only has {}",
                    limit,
                    self.path.display(),
                    out.len()
                );
            }
        }

        tracing::info!("Loaded {} records from '{}'", out.len(), self.path.display());
        Ok(out)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_loads_rows_and_empty_cells_become_none() {
        let f = write_csv(
            "PRODUCT_ID,TITLE,DESCRIPTION,BULLET_POINTS,BRAND,BROWSE_NODE_ID\n\
             1,Red mug,Ceramic,\"[Dishwasher safe, 300ml]\",Acme,7\n\
             2,Blue mug,,,,8\n",
        );
        let rows = CsvLoader::new(f.path()).load_all().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title.as_deref(), Some("Red mug"));
        assert_eq!(rows[0].bullet_points.as_deref(), Some("[Dishwasher safe, 300ml]"));
        assert_eq!(rows[1].description, None);
        assert_eq!(rows[1].brand, None);
        assert_eq!(rows[1].browse_node_id.as_deref(), Some("8"));
    }

    #[test]
    fn test_missing_columns_default_to_none() {
        let f    = write_csv("TITLE,BROWSE_NODE_ID\nLamp,3\n");
        let rows = CsvLoader::new(f.path()).load_all().unwrap();
        assert_eq!(rows[0].brand, None);
        assert_eq!(rows[0].bullet_points, None);
    }

    #[test]
    fn test_limit_keeps_first_rows() {
        let f = write_csv("TITLE,BROWSE_NODE_ID\na,1\nb,2\nc,3\n");
        let rows = CsvLoader::new(f.path())
            .with_limit(Some(2))
            .load_all()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].title.as_deref(), Some("b"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = CsvLoader::new("/definitely/not/here.csv");
        assert!(loader.load_all().is_err());
    }
}
