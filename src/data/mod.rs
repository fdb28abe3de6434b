// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw CSV catalogue to tensor batches.
//
//   catalogue.csv
//       │
//       ▼
//   CsvLoader         → reads rows into ProductRecords
//       │
//       ▼
//   Vocab             → label value ↔ id for BROWSE_NODE_ID, BRAND
//       │
//       ▼
//   Preprocessor      → cleans + joins text, encodes labels, tokenises
//       │
//       ▼
//   split_train_val   → seeded train/validation partition
//       │
//       ▼
//   ProductDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   ProductBatcher    → pads into fixed-shape tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads catalogue rows from CSV
pub mod loader;

/// Label vocabularies
pub mod vocab;

/// Text cleaning, label encoding and tokenisation
pub mod preprocessor;

/// Implements Burn's Dataset trait for product items
pub mod dataset;

/// Implements Burn's Batcher trait (the data collator)
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
