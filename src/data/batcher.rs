// ============================================================
// Layer 4 — Data Collator (Burn Batcher)
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ProductItem>
// into fixed-shape tensors.
//
// How batching works here:
//   Input:  N ProductItems with token sequences of varying length
//   Output: ProductBatch with
//             input_ids       [N, max_length]
//             attention_mask  [N, max_length]   1 = token, 0 = pad
//             browse_nodes    [N]
//             brands          [N]               IGNORE_INDEX kept as-is
//
//   Each sequence is truncated on the right to max_length, then
//   padded on the right with the tokenizer's pad id, matching the
//   tokenizer's default truncation and padding sides.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ProductItem;

// ─── ProductBatch ─────────────────────────────────────────────────────────────
/// A batch of products ready for the model forward pass.
/// All tensors have batch_size as their first dimension.
#[derive(Debug, Clone)]
pub struct ProductBatch<B: Backend> {
    /// Token ID sequences — shape: [batch_size, max_length]
    pub input_ids: Tensor<B, 2, Int>,

    /// Attention masks — shape: [batch_size, max_length]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Browse-node label ids — shape: [batch_size]
    pub browse_nodes: Tensor<B, 1, Int>,

    /// Brand label ids — shape: [batch_size]
    pub brands: Tensor<B, 1, Int>,
}

// ─── ProductBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ProductBatcher<B: Backend> {
    /// The device to create tensors on
    pub device:     B::Device,
    pub max_length: usize,
    pub pad_id:     u32,
}

impl<B: Backend> ProductBatcher<B> {
    pub fn new(device: B::Device, max_length: usize, pad_id: u32) -> Self {
        Self { device, max_length, pad_id }
    }

    /// Truncate/pad one sequence, returning (ids, mask)
    fn pad(&self, ids: &[u32]) -> (Vec<i64>, Vec<i64>) {
        let kept = ids.len().min(self.max_length);

        let mut out_ids: Vec<i64> = ids[..kept].iter().map(|&x| x as i64).collect();
        let mut mask             = vec![1i64; kept];

        out_ids.resize(self.max_length, self.pad_id as i64);
        mask.resize(self.max_length, 0);
        (out_ids, mask)
    }
}

impl<B: Backend> Batcher<ProductItem, ProductBatch<B>> for ProductBatcher<B> {
    fn batch(&self, items: Vec<ProductItem>) -> ProductBatch<B> {
        let batch_size = items.len();

        let mut ids_flat  = Vec::with_capacity(batch_size * self.max_length);
        let mut mask_flat = Vec::with_capacity(batch_size * self.max_length);
        for item in &items {
            let (ids, mask) = self.pad(&item.input_ids);
            ids_flat.extend(ids);
            mask_flat.extend(mask);
        }

        let nodes:  Vec<i64> = items.iter().map(|i| i.browse_node).collect();
        let brands: Vec<i64> = items.iter().map(|i| i.brand).collect();

        let shape = [batch_size, self.max_length];
        ProductBatch {
            input_ids: Tensor::from_data(TensorData::new(ids_flat, shape), &self.device),
            attention_mask: Tensor::from_data(TensorData::new(mask_flat, shape), &self.device),
            browse_nodes: Tensor::from_data(TensorData::new(nodes, [batch_size]), &self.device),
            brands: Tensor::from_data(TensorData::new(brands, [batch_size]), &self.device),
        }
    }
}
