// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples with a seeded RNG and splits them into:
//   - Training set:   used to update model weights
//   - Validation set: used to measure performance on unseen data
//
// The validation set takes ceil(n * val_fraction) samples
// (never more than n), the training set takes the rest. The
// same seed always produces the same partition.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom on a
// StdRng seeded from the run's seed.
//
// Reference: rand crate documentation (SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// # Arguments
/// * `samples`      - All available samples (consumed by this function)
/// * `val_fraction` - Proportion held out for validation, e.g. 0.05 = 5%
/// * `seed`         - RNG seed; equal seeds give equal splits
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let val_len  = ((total as f64) * val_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let split_at = total - val_len.min(total);

    // After this: samples = train [0..split_at], val = [split_at..total]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.2, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_validation_size_rounds_up() {
        // 1010 * 0.05 = 50.5 → 51 held out
        let items: Vec<usize> = (0..1010).collect();
        let (train, val)      = split_train_val(items, 0.05, 42);
        assert_eq!(val.len(), 51);
        assert_eq!(train.len(), 959);
    }

    #[test]
    fn test_split_is_disjoint_and_covering() {
        let items: Vec<usize> = (0..257).collect();
        let (train, val)      = split_train_val(items, 0.3, 7);

        assert_eq!(train.len() + val.len(), 257);
        let train_set: HashSet<_> = train.iter().copied().collect();
        let val_set:   HashSet<_> = val.iter().copied().collect();
        assert!(train_set.is_disjoint(&val_set));
        assert_eq!(train_set.union(&val_set).count(), 257);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..50).collect::<Vec<usize>>(), 0.2, 3);
        let b = split_train_val((0..50).collect::<Vec<usize>>(), 0.2, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.05, 42);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_zero_fraction_keeps_everything_for_training() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_train_val(items, 0.0, 42);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }
}
