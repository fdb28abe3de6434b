// ============================================================
// Layer 4 — Record Preprocessor
// ============================================================
// Turns raw catalogue records into model-ready items:
//
//   1. Clean each text field (TITLE, DESCRIPTION, BULLET_POINTS)
//   2. Join the non-empty fields with the tokenizer's separator
//        "red mug [SEP] ceramic [SEP] dishwasher safe, 300ml"
//   3. Encode BROWSE_NODE_ID through its vocabulary
//      (rows without a known browse node are dropped)
//   4. Encode BRAND through its vocabulary, or IGNORE_INDEX
//      when the brand is missing
//   5. Tokenise the joined text, truncating to max_length with
//      the tokenizer's own truncation defaults
//
// Cleaning steps (applied in order):
//   1. Replace Unicode whitespace variants with plain space
//   2. Remove invisible control characters
//   3. Strip the list brackets around BULLET_POINTS
//   4. Collapse all whitespace runs to a single space
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

use anyhow::Result;
use tokenizers::{Tokenizer, TruncationParams};

use crate::data::{dataset::ProductItem, vocab::Vocab};
use crate::domain::{
    product::{ProductRecord, BRAND_COLUMN, BROWSE_NODE_COLUMN},
    IGNORE_INDEX,
};

pub struct Preprocessor {
    /// Separator token inserted between text fields, e.g. "[SEP]"
    sep_token: String,
}

impl Preprocessor {
    pub fn new(sep_token: impl Into<String>) -> Self {
        Self { sep_token: sep_token.into() }
    }

    /// Clean a single raw text field into one normalised line.
    pub fn clean(text: &str) -> String {
        let normalised: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();

        let trimmed = normalised.trim();
        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        unbracketed.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Cleaned, non-empty text fields of a record, in fingerprint order
    fn cleaned_fields(record: &ProductRecord) -> Vec<String> {
        record
            .text_fields()
            .into_iter()
            .flatten()
            .map(Self::clean)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Plain text of every record, used as the corpus when a tokenizer
    /// has to be built from scratch.
    pub fn corpus(records: &[ProductRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| Self::cleaned_fields(r).join(" "))
            .collect()
    }

    /// Join the cleaned text fields with the separator token.
    /// A record with no text yields an empty string.
    pub fn fingerprint(&self, record: &ProductRecord) -> String {
        Self::cleaned_fields(record).join(&format!(" {} ", self.sep_token))
    }

    /// Encode (browse_node, brand) label ids.
    /// Returns None when the browse node is missing or unknown;
    /// a missing or unknown brand becomes IGNORE_INDEX.
    pub fn encode_labels(
        &self,
        record:      &ProductRecord,
        browse_node: &Vocab,
        brand:       &Vocab,
    ) -> Option<(i64, i64)> {
        let node_id = browse_node.id(record.label(BROWSE_NODE_COLUMN)?)? as i64;
        let brand_id = record
            .label(BRAND_COLUMN)
            .and_then(|b| brand.id(b))
            .map(|id| id as i64)
            .unwrap_or(IGNORE_INDEX);
        Some((node_id, brand_id))
    }

    /// Run the whole preprocessing step over a set of records.
    pub fn process(
        &self,
        records:     &[ProductRecord],
        browse_node: &Vocab,
        brand:       &Vocab,
        tokenizer:   &Tokenizer,
        max_length:  usize,
    ) -> Result<Vec<ProductItem>> {
        // Work on a copy so the caller's tokenizer keeps its settings
        let mut tokenizer = tokenizer.clone();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Invalid truncation settings: {e}"))?;
        tokenizer.with_padding(None);

        let mut texts  = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());
        let mut dropped = 0usize;

        for record in records {
            match self.encode_labels(record, browse_node, brand) {
                Some(l) => {
                    texts.push(self.fingerprint(record));
                    labels.push(l);
                }
                None => {
                    dropped += 1;
                    tracing::debug!("Dropping record without a known browse node: {:?}", record.title);
                }
            }
        }

        if dropped > 0 {
            tracing::info!("Dropped {} records without a known browse node", dropped);
        }

        let encodings = tokenizer
            .encode_batch(texts, true)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        Ok(encodings
            .into_iter()
            .zip(labels)
            .map(|(enc, (browse_node, brand))| ProductItem {
                input_ids: enc.get_ids().to_vec(),
                browse_node,
                brand,
            })
            .collect())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn record(title: &str, brand: Option<&str>, node: Option<&str>) -> ProductRecord {
        ProductRecord {
            title:          Some(title.to_string()),
            brand:          brand.map(String::from),
            browse_node_id: node.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_collapses_whitespace_and_controls() {
        assert_eq!(Preprocessor::clean("  red\u{00A0}\u{00A0}mug\x01 \n big "), "red mug big");
    }

    #[test]
    fn test_clean_strips_bullet_brackets() {
        assert_eq!(Preprocessor::clean("[BPA free, Leak proof]"), "BPA free, Leak proof");
    }

    #[test]
    fn test_fingerprint_joins_present_fields() {
        let p = Preprocessor::new("[SEP]");
        let r = ProductRecord {
            title:         Some("Mug".into()),
            description:   None,
            bullet_points: Some("[Blue]".into()),
            ..Default::default()
        };
        assert_eq!(p.fingerprint(&r), "Mug [SEP] Blue");
    }

    #[test]
    fn test_fingerprint_of_empty_record_is_empty() {
        let p = Preprocessor::new("[SEP]");
        assert_eq!(p.fingerprint(&ProductRecord::default()), "");
    }

    #[test]
    fn test_missing_brand_maps_to_ignore_index() {
        let rows  = vec![record("a", Some("Acme"), Some("1")), record("b", None, Some("2"))];
        let nodes = Vocab::build(&rows, BROWSE_NODE_COLUMN);
        let brands = Vocab::build(&rows, BRAND_COLUMN);
        let p = Preprocessor::new("[SEP]");

        assert_eq!(p.encode_labels(&rows[0], &nodes, &brands), Some((0, 0)));
        assert_eq!(p.encode_labels(&rows[1], &nodes, &brands), Some((1, IGNORE_INDEX)));
    }

    #[test]
    fn test_missing_browse_node_is_dropped() {
        let rows  = vec![record("a", Some("Acme"), None)];
        let nodes = Vocab::build(&rows, BROWSE_NODE_COLUMN);
        let brands = Vocab::build(&rows, BRAND_COLUMN);
        assert_eq!(Preprocessor::new("[SEP]").encode_labels(&rows[0], &nodes, &brands), None);
    }

    #[test]
    fn test_process_tokenises_and_truncates() {
        let rows = vec![
            record("red ceramic coffee mug with handle", Some("Acme"), Some("1")),
            record("lamp", None, Some("2")),
            record("orphan", None, None),
        ];
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path())
            .load_or_build("no-such-model-dir", &Preprocessor::corpus(&rows), 1000)
            .unwrap();
        let nodes  = Vocab::build(&rows, BROWSE_NODE_COLUMN);
        let brands = Vocab::build(&rows, BRAND_COLUMN);

        let items = Preprocessor::new("[SEP]")
            .process(&rows, &nodes, &brands, &tok, 4)
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].input_ids.len(), 4);
        // [CLS] lamp [SEP]
        assert_eq!(items[1].input_ids.len(), 3);
        assert_eq!(items[1].brand, IGNORE_INDEX);
        assert_eq!(items[1].browse_node, 1);
    }
}
