// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Resolves the tokenizer for a run, in order of preference:
//
//   1. {base_model_dir}/tokenizer.json   — shipped with the model
//   2. {run_dir}/tokenizer.json          — built by an earlier run
//   3. a word-level tokenizer built from the catalogue text and
//      saved to {run_dir}/tokenizer.json
//
// The fallback tokenizer follows BERT conventions: lowercasing
// BertNormalizer, whitespace pre-tokenizer, [CLS] x [SEP]
// post-processing and the usual special token ids.
//
// Reference: HuggingFace tokenizers JSON format

use anyhow::{Context, Result};
use std::{collections::HashMap, path::{Path, PathBuf}};
use tokenizers::Tokenizer;

const PAD_ID:  u32 = 0;
const UNK_ID:  u32 = 1;
const CLS_ID:  u32 = 101;
const SEP_ID:  u32 = 102;
const MASK_ID: u32 = 103;
/// First id handed to a corpus word
const FIRST_WORD_ID: usize = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the model's tokenizer, a previously built one, or build a new
    /// one from `texts` whose ids all stay below `vocab_size`.
    pub fn load_or_build(
        &self,
        base_model_id: &str,
        texts:         &[String],
        vocab_size:    usize,
    ) -> Result<Tokenizer> {
        let shipped = Path::new(base_model_id).join("tokenizer.json");
        if shipped.exists() {
            tracing::info!("Loading tokenizer from '{}'", shipped.display());
            return load_file(&shipped);
        }

        let tok_path = self.dir.join("tokenizer.json");
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    /// Load a previously saved tokenizer from this store's directory
    pub fn load(&self) -> Result<Tokenizer> {
        load_file(&self.dir.join("tokenizer.json"))
    }

    /// Build a word-level vocabulary from the corpus and write a
    /// tokenizer JSON directly.
    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Build vocabulary from word frequencies ────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        // Most frequent first; ties broken alphabetically so rebuilding
        // from the same corpus gives the same ids
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(FIRST_WORD_ID));

        // ── Step 2: Build vocab JSON ──────────────────────────────────────────
        let mut vocab = serde_json::json!({
            "[PAD]":  PAD_ID,
            "[UNK]":  UNK_ID,
            "[CLS]":  CLS_ID,
            "[SEP]":  SEP_ID,
            "[MASK]": MASK_ID,
        });

        let mut next_id = FIRST_WORD_ID;
        for (word, _) in &words {
            if vocab.get(word).is_none() {
                vocab[word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        // ── Step 3: Write tokenizer JSON in HuggingFace format ────────────────
        let special = |id: u32, content: &str| serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        });
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                special(PAD_ID, "[PAD]"),
                special(UNK_ID, "[UNK]"),
                special(CLS_ID, "[CLS]"),
                special(SEP_ID, "[SEP]"),
                special(MASK_ID, "[MASK]"),
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": {
                "type": "BertProcessing",
                "sep": ["[SEP]", SEP_ID],
                "cls": ["[CLS]", CLS_ID]
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let tok_path = self.dir.join("tokenizer.json");
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            next_id - FIRST_WORD_ID,
            tok_path.display()
        );

        load_file(&tok_path)
    }
}

fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

/// Write `tokenizer` as `{dir}/tokenizer.json` so `dir` can serve as a base model.
pub fn save_to(tokenizer: &Tokenizer, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;
    let path = dir.join("tokenizer.json");
    tokenizer
        .save(&path, true)
        .map_err(|e| anyhow::anyhow!("Cannot save tokenizer to '{}': {}", path.display(), e))?;
    Ok(path)
}

/// The separator token placed between text fields.
pub fn separator_token(tokenizer: &Tokenizer) -> Result<String> {
    ["[SEP]", "</s>"]
        .into_iter()
        .find(|t| tokenizer.token_to_id(t).is_some())
        .map(String::from)
        .ok_or_else(|| anyhow::anyhow!("Tokenizer has no separator token ([SEP] or </s>)"))
}

/// Padding id: the tokenizer's configured one, else its pad token, else 0.
pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    if let Some(params) = tokenizer.get_padding() {
        return params.pad_id;
    }
    ["[PAD]", "<pad>"]
        .into_iter()
        .find_map(|t| tokenizer.token_to_id(t))
        .unwrap_or(PAD_ID)
}

/// Largest token id the tokenizer can emit, plus one.
pub fn id_space(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map(|&id| id as usize + 1)
        .unwrap_or(0)
}
