//! Diversity-metric behavior through the public API: score dispatch, NCDₘ
//! formula properties, scratch growth.

use ncdfuzz::diversity::{DiversityItem, DiversityMetric, MetricKind, PayloadKind};

fn items<'a>(metric: &mut DiversityMetric, payloads: &'a [Vec<u8>]) -> Vec<DiversityItem<'a>> {
    payloads
        .iter()
        .map(|payload| DiversityItem { payload, compressed_len: metric.compress_len(payload) })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// NCDₘ
// ─────────────────────────────────────────────────────────────────────────────

/// Adding a genuinely different payload to a redundant set raises the score;
/// adding another copy does not.
#[test]
fn ncdm_rewards_difference() {
    let mut metric = DiversityMetric::new(MetricKind::Ncdm, PayloadKind::Testcase);

    let base: Vec<Vec<u8>> = (0..3).map(|i| vec![b'q'; 200 + i]).collect();
    let base_items = items(&mut metric, &base);
    let base_score = metric.ncdm(&base_items);

    let mut with_copy = base.clone();
    with_copy.push(vec![b'q'; 200]);
    let copy_items = items(&mut metric, &with_copy);
    let copy_score = metric.ncdm(&copy_items);

    let mut with_diverse = base.clone();
    with_diverse.push((0..200u32).map(|i| (i.wrapping_mul(97) % 251) as u8).collect());
    let diverse_items = items(&mut metric, &with_diverse);
    let diverse_score = metric.ncdm(&diverse_items);

    assert!(diverse_score > base_score, "{diverse_score} vs base {base_score}");
    assert!(diverse_score > copy_score, "{diverse_score} vs copy {copy_score}");
}

/// The score never goes negative and degenerate sets pin to zero.
#[test]
fn ncdm_degenerate_sets() {
    let mut metric = DiversityMetric::new(MetricKind::Ncdm, PayloadKind::Testcase);
    assert_eq!(metric.ncdm(&[]), 0.0);

    let single = vec![b"only one member here".to_vec()];
    let single_items = items(&mut metric, &single);
    assert_eq!(metric.ncdm(&single_items), 0.0);

    let empties = vec![Vec::new(), Vec::new()];
    let empty_items = items(&mut metric, &empties);
    assert!(metric.ncdm(&empty_items) >= 0.0);
}

/// Path-diversity payloads score over trace-mini bytes, not testcases.
#[test]
fn trace_mini_payload_mode_scores_minis() {
    let mut metric = DiversityMetric::new(MetricKind::Ncdm, PayloadKind::TraceMini);
    assert_eq!(metric.payload_kind(), PayloadKind::TraceMini);

    let minis: Vec<Vec<u8>> = vec![
        vec![0b0000_0001; 64],
        vec![0b1000_0000; 64],
        (0..64u8).collect(),
    ];
    let mini_items = items(&mut metric, &minis);
    let score = metric.ncdm(&mini_items);
    assert!(score > 0.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scratch growth
// ─────────────────────────────────────────────────────────────────────────────

/// Feeding increasingly large inputs grows the scratch monotonically through
/// powers of two; smaller demands never shrink it.
#[test]
fn scratch_growth_is_monotone_powers_of_two() {
    let mut metric = DiversityMetric::new(MetricKind::Ncdm, PayloadKind::Testcase);
    let mut previous = 0usize;

    for exponent in 4..=18u32 {
        let payloads = vec![vec![7u8; 1usize << exponent]; 2];
        let set = items(&mut metric, &payloads);
        metric.ncdm(&set);

        let capacity = metric.scratch_capacity();
        assert!(capacity.is_power_of_two());
        assert!(capacity >= previous, "scratch shrank: {previous} -> {capacity}");
        assert!(capacity > 1usize << (exponent + 1), "no headroom over the concatenation");
        previous = capacity;
    }

    let small = vec![vec![1u8; 16]; 2];
    let set = items(&mut metric, &small);
    metric.ncdm(&set);
    assert_eq!(metric.scratch_capacity(), previous);
}

// ─────────────────────────────────────────────────────────────────────────────
// Levenshtein dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn levenshtein_scores_known_pair() {
    let mut metric = DiversityMetric::new(MetricKind::Levenshtein, PayloadKind::Testcase);
    assert_eq!(metric.entries_per_edge(), 2);

    let a = DiversityItem { payload: b"kitten", compressed_len: 0 };
    let b = DiversityItem { payload: b"sitting", compressed_len: 0 };
    let score = metric.score_set(&[a, b]);
    assert!((score - 4.0 / 7.0).abs() < 1e-6);

    // Byte-equal and underfull sets are defined as zero.
    let same = DiversityItem { payload: b"kitten", compressed_len: 0 };
    assert_eq!(metric.score_set(&[a, same]), 0.0);
    assert_eq!(metric.score_set(&[a]), 0.0);
}

#[test]
#[should_panic(expected = "levenshtein")]
fn levenshtein_rejects_oversized_sets() {
    let mut metric = DiversityMetric::new(MetricKind::Levenshtein, PayloadKind::Testcase);
    let item = DiversityItem { payload: b"x", compressed_len: 0 };
    metric.score_set(&[item, item, item]);
}
