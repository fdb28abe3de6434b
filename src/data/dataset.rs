use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised product with its encoded labels.
/// `input_ids` is at most max_length long; padding happens in the batcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub input_ids:   Vec<u32>,
    pub browse_node: i64,
    /// Brand id, or IGNORE_INDEX when the brand is unknown
    pub brand:       i64,
}

pub struct ProductDataset {
    items: Vec<ProductItem>,
}

impl ProductDataset {
    pub fn new(items: Vec<ProductItem>) -> Self { Self { items } }

    pub fn item_count(&self) -> usize { self.items.len() }
}

impl Dataset<ProductItem> for ProductDataset {
    fn get(&self, index: usize) -> Option<ProductItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
