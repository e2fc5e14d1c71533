//! Coverage-primitive behavior through the public API: classification
//! idempotence, counts, skim/novelty transitions, minimization.

use ncdfuzz::{
    count_bits, count_bytes, count_non_255_bytes, has_new_bits, minimize_bits, simplify_trace,
    skim, Classifier, NewCoverage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// classify(classify(t)) == classify(t) for every byte value.
#[test]
fn classification_is_idempotent() {
    let classifier = Classifier::new();
    let mut trace: Vec<u8> = (0u8..=255).collect();
    classifier.classify_counts(&mut trace);
    let once = trace.clone();
    classifier.classify_counts(&mut trace);
    assert_eq!(trace, once);
}

/// Every classified byte is zero or a power of two from the bucket table.
#[test]
fn classified_bytes_are_bucket_values() {
    let classifier = Classifier::new();
    let mut trace: Vec<u8> = (0u8..=255).collect();
    classifier.classify_counts(&mut trace);
    for &byte in &trace {
        assert!(
            matches!(byte, 0 | 1 | 2 | 4 | 8 | 16 | 32 | 64 | 128),
            "unexpected class {byte}"
        );
    }
}

/// Odd-length traces classify the trailing byte too.
#[test]
fn classification_covers_odd_tails() {
    let classifier = Classifier::new();
    let mut trace = vec![0u8, 3, 9, 40, 255];
    classifier.classify_counts(&mut trace);
    assert_eq!(trace, vec![0, 4, 16, 64, 128]);
}

#[test]
fn simplify_is_binary() {
    let mut trace: Vec<u8> = (0u8..=255).collect();
    simplify_trace(&mut trace);
    assert_eq!(trace[0], 1);
    assert!(trace[1..].iter().all(|&b| b == 128));
}

// ─────────────────────────────────────────────────────────────────────────────
// Counts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn counts_agree_with_naive_computation() {
    let mut map = vec![0u8; 96];
    for (i, byte) in map.iter_mut().enumerate() {
        *byte = match i % 5 {
            0 => 0,
            1 => 0xff,
            _ => (i * 37) as u8,
        };
    }
    let naive_bits: u32 = map.iter().map(|b| b.count_ones()).sum();
    let naive_bytes = map.iter().filter(|&&b| b != 0).count() as u32;
    let naive_non_255 = map.iter().filter(|&&b| b != 0xff).count() as u32;

    assert_eq!(count_bits(&map), naive_bits);
    assert_eq!(count_bytes(&map), naive_bytes);
    assert_eq!(count_non_255_bytes(&map), naive_non_255);
}

// ─────────────────────────────────────────────────────────────────────────────
// Novelty
// ─────────────────────────────────────────────────────────────────────────────

/// skim answers "possibly new" without touching either map; the slow path
/// agrees with it.
#[test]
fn skim_agrees_with_has_new_bits() {
    let classifier = Classifier::new();
    let mut virgin = vec![0xffu8; 64];

    for round in 0u8..16 {
        let mut trace = vec![0u8; 64];
        trace[(round as usize * 7) % 64] = round.wrapping_mul(23);
        let raw = trace.clone();

        let skimmed = skim(&classifier, &virgin, &trace);
        classifier.classify_counts(&mut trace);
        let news = has_new_bits(&mut virgin, &trace);

        if news != NewCoverage::None {
            assert!(skimmed, "has_new_bits found news skim missed (round {round}, {raw:?})");
        }

        // Immediately afterwards the same trace is old news both ways.
        assert!(!skim(&classifier, &virgin, &trace));
        assert_eq!(has_new_bits(&mut virgin, &trace), NewCoverage::None);
    }
}

/// New edge reports 2, new bucket on a known edge reports 1.
#[test]
fn novelty_grades_edges_above_buckets() {
    let mut virgin = vec![0xffu8; 16];
    let mut trace = vec![0u8; 16];

    trace[3] = 1;
    assert_eq!(has_new_bits(&mut virgin, &trace), NewCoverage::NewEdges);

    trace[3] = 8;
    assert_eq!(has_new_bits(&mut virgin, &trace), NewCoverage::NewCounts);

    // Both buckets for edge 3 known; a different edge escalates again.
    trace[3] = 8;
    trace[11] = 1;
    assert_eq!(has_new_bits(&mut virgin, &trace), NewCoverage::NewEdges);
}

// ─────────────────────────────────────────────────────────────────────────────
// Minimization
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn minimized_trace_matches_nonzero_bytes() {
    let mut trace = vec![0u8; 64];
    trace[0] = 1;
    trace[13] = 99;
    trace[63] = 255;
    let mut mini = vec![0u8; 8];
    minimize_bits(&mut mini, &trace);

    for (i, &byte) in trace.iter().enumerate() {
        let bit = mini[i >> 3] & (1 << (i & 7)) != 0;
        assert_eq!(bit, byte != 0, "bit {i}");
    }
}
