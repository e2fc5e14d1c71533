//! Multi-set Normalized Compression Distance.
//!
//! For payloads `{e₁..eₙ}` with per-entry compressed sizes `cᵢ`:
//!
//! ```text
//! NCDₘ = (C(e₁‖…‖eₙ) − min cᵢ) / max over i of C(concat without eᵢ)
//! ```
//!
//! Higher means more diverse. The concatenation buffers live in the metric's
//! shared scratch; all compression goes through it so the scratch sizing is
//! the single point of failure (and a fatal one).

use super::{DiversityItem, DiversityMetric};

impl DiversityMetric {
    /// Multi-set NCD over the given payloads. Returns 0 for degenerate sets
    /// (empty, single-entry, or any set whose compression comes back empty).
    pub fn ncdm(&mut self, items: &[DiversityItem<'_>]) -> f32 {
        if items.is_empty() {
            return 0.0;
        }

        let total_len: usize = items.iter().map(|it| it.payload.len()).sum();
        if self.prev_longest <= total_len {
            self.grow_scratch(total_len);
        }

        let mut min_compressed = u32::MAX;
        for item in items {
            if item.compressed_len < min_compressed {
                min_compressed = item.compressed_len;
            }
        }

        let mut pos = 0;
        for item in items {
            self.uncompressed[pos..pos + item.payload.len()].copy_from_slice(item.payload);
            pos += item.payload.len();
        }
        let full_set_len = self.compress_scratch(pos);
        if full_set_len == 0 {
            return 0.0;
        }

        let mut max_subset_len = 0u32;
        for left_out in 0..items.len() {
            let mut pos = 0;
            for (i, item) in items.iter().enumerate() {
                if i == left_out {
                    continue;
                }
                self.uncompressed[pos..pos + item.payload.len()].copy_from_slice(item.payload);
                pos += item.payload.len();
            }
            let compressed_len = self.compress_scratch(pos);
            if compressed_len > max_subset_len {
                max_subset_len = compressed_len;
            }
        }

        // don't divide by 0
        if max_subset_len == 0 {
            return 0.0;
        }

        (full_set_len as f32 - min_compressed as f32) / max_subset_len as f32
    }

    /// Compresses `uncompressed[..len]` into the compressed scratch and
    /// returns the result size. The scratch is sized from the compression
    /// bound, so a failure here is a sizing bug, not an input property.
    fn compress_scratch(&mut self, len: usize) -> u32 {
        match lz4_flex::block::compress_into(&self.uncompressed[..len], &mut self.compressed) {
            Ok(n) => n as u32,
            Err(e) => crate::fatal!(
                "compression bound exceeded for {} byte concatenation (scratch {}): {}",
                len,
                self.max_compressed_len,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DiversityItem, DiversityMetric, MetricKind, PayloadKind};

    fn metric() -> DiversityMetric {
        DiversityMetric::new(MetricKind::Ncdm, PayloadKind::Testcase)
    }

    fn items<'a>(metric: &mut DiversityMetric, payloads: &'a [Vec<u8>]) -> Vec<DiversityItem<'a>> {
        payloads
            .iter()
            .map(|p| {
                let compressed_len = metric.compress_len(p);
                DiversityItem { payload: p, compressed_len }
            })
            .collect()
    }

    #[test]
    fn empty_and_singleton_sets_score_zero() {
        let mut m = metric();
        assert_eq!(m.ncdm(&[]), 0.0);

        let payloads = vec![b"one lonely input".to_vec()];
        let its = items(&mut m, &payloads);
        assert_eq!(m.ncdm(&its), 0.0);
    }

    #[test]
    fn diverse_set_scores_higher_than_redundant_set() {
        let mut m = metric();

        let redundant: Vec<Vec<u8>> = (0..4).map(|_| vec![b'a'; 256]).collect();
        let red_items = items(&mut m, &redundant);
        let red_score = m.ncdm(&red_items);

        let diverse: Vec<Vec<u8>> = (0..4u8)
            .map(|i| (0..256).map(|j| (j as u8).wrapping_mul(i * 37 + 11)).collect())
            .collect();
        let div_items = items(&mut m, &diverse);
        let div_score = m.ncdm(&div_items);

        assert!(
            div_score > red_score,
            "diverse {div_score} should beat redundant {red_score}"
        );
    }

    #[test]
    fn score_is_deterministic() {
        let mut m = metric();
        let payloads: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i * 7; 128 + i as usize * 40]).collect();
        let its = items(&mut m, &payloads);
        let a = m.ncdm(&its);
        let its = items(&mut m, &payloads);
        let b = m.ncdm(&its);
        assert_eq!(a, b);
    }
}
