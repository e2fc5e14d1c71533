//! The per-(edge, bucket) diversity index and its insertion/eviction core.
//!
//! Every execution's trace is walked byte by byte; each nonzero counter
//! lands in one of eight logarithmic buckets, addressing one [`EdgeCell`].
//! A cell keeps up to K representative queue entries chosen to maximize the
//! configured diversity score. Insertion is cheap while a cell fills;
//! once saturated, an incoming input only displaces an existing entry when
//! it is a duplicate-content reclaim or when it strictly raises the cell's
//! diversity score — and the expensive score evaluation is rate-limited by
//! the cell's hit count.

use crate::bitmap::{bucket_of, minimize_bits, NewCoverage, COUNT_CLASS_LOOKUP8};
use crate::config::{BUCKET_COUNT, NAME_MAX};
use crate::diversity::{DiversityItem, DiversityMetric, PayloadKind};
use crate::exec::{Calibration, Fault, TargetRunner};
use crate::fatal;
use crate::hash;
use crate::save::descriptor::describe_op;
use crate::save::persist;
use crate::state::CorpusState;
use crate::timefn;

use super::entry::EntryId;
use super::favored;
use super::input_hash::InputHashIndex;
use super::{entry_payload, Queue};

/// One (edge, bucket) slot of the index.
#[derive(Debug)]
pub struct EdgeCell {
    pub edge_num: u32,
    pub bucket_id: u8,
    /// How many executions have landed in this cell.
    pub hit_count: u64,
    /// Global execution count when the cell got its first entry.
    pub discovery_execs: u64,
    /// Committed evictions so far.
    pub replacement_count: u32,
    /// Representative entries, at most K. Slot positions are stable across
    /// swaps.
    pub entries: Vec<EntryId>,
    /// Diversity score of `entries` as of the last update.
    pub diversity_score: f32,
}

/// All `8·M` cells, flat-indexed by `edge · 8 + bucket`.
pub struct EdgeIndex {
    pub(crate) cells: Vec<EdgeCell>,
    entries_per_edge: usize,
}

impl EdgeIndex {
    pub fn new(map_size: usize, entries_per_edge: usize) -> Self {
        let mut cells = Vec::with_capacity(map_size * BUCKET_COUNT);
        for i in 0..map_size * BUCKET_COUNT {
            cells.push(EdgeCell {
                edge_num: (i / BUCKET_COUNT) as u32,
                bucket_id: (i % BUCKET_COUNT) as u8,
                hit_count: 0,
                discovery_execs: 0,
                replacement_count: 0,
                entries: Vec::new(),
                diversity_score: 0.0,
            });
        }
        EdgeIndex { cells, entries_per_edge }
    }

    /// Cell capacity K (32 under NCDₘ, 2 under Levenshtein).
    pub fn entries_per_edge(&self) -> usize {
        self.entries_per_edge
    }

    pub fn cell(&self, edge: u32, bucket: u8) -> &EdgeCell {
        &self.cells[edge as usize * BUCKET_COUNT + bucket as usize]
    }

    pub fn cells(&self) -> &[EdgeCell] {
        &self.cells
    }
}

/// Synthetic queue-entry view over the current execution's input. Trace
/// minimization and payload compression are deferred until a cell actually
/// needs them, then cached for the rest of the walk.
pub struct ExecCandidate<'a> {
    pub testcase: &'a [u8],
    pub exec_cksum: u64,
    pub input_hash: u64,
    pub trace_mini: Option<Vec<u8>>,
    pub compressed_len: u32,
}

impl<'a> ExecCandidate<'a> {
    pub fn new(testcase: &'a [u8], exec_cksum: u64) -> Self {
        ExecCandidate {
            testcase,
            exec_cksum,
            input_hash: hash::input_hash(testcase),
            trace_mini: None,
            compressed_len: 0,
        }
    }

    fn ensure_diversity_payload(&mut self, metric: &mut DiversityMetric, trace: &[u8]) {
        if self.trace_mini.is_some() {
            return;
        }
        let mut mini = vec![0u8; trace.len() / 8];
        minimize_bits(&mut mini, trace);
        self.compressed_len = match metric.payload_kind() {
            PayloadKind::Testcase => metric.compress_len(self.testcase),
            PayloadKind::TraceMini => metric.compress_len(&mini),
        };
        if self.compressed_len == 0 {
            fatal!("compression produced no output for a {} byte input", self.testcase.len());
        }
        self.trace_mini = Some(mini);
    }

    fn payload(&self, kind: PayloadKind) -> &[u8] {
        match kind {
            PayloadKind::Testcase => self.testcase,
            PayloadKind::TraceMini => self.trace_mini.as_deref().unwrap_or(&[]),
        }
    }
}

/// The expensive diversity evaluation only runs on a schedule that thins out
/// as a cell gets hotter.
fn should_evaluate_eviction(hit_count: u64) -> bool {
    hit_count <= 10
        || (hit_count <= 100 && hit_count % 10 == 0)
        || (hit_count <= 10_000 && hit_count % 100 == 0)
        || hit_count % 1000 == 0
}

/// Refreshes a cell's cached diversity score from its current entry set.
pub(crate) fn recompute_cell_score(queue: &Queue, metric: &mut DiversityMetric, cell: &mut EdgeCell) {
    let kind = metric.payload_kind();
    let items: Vec<DiversityItem<'_>> = cell
        .entries
        .iter()
        .map(|&id| {
            let entry = queue.get(id);
            DiversityItem { payload: entry_payload(entry, kind), compressed_len: entry.compressed_len }
        })
        .collect();
    cell.diversity_score = metric.score_set(&items);
}

/// Returns the slot whose replacement by the candidate maximizes the cell's
/// diversity score, or `None` when no replacement strictly beats the current
/// score.
fn find_eviction_candidate(
    queue: &Queue,
    metric: &mut DiversityMetric,
    cell: &EdgeCell,
    cand: &ExecCandidate<'_>,
) -> Option<usize> {
    let kind = metric.payload_kind();
    let mut best_score = cell.diversity_score;
    let mut best_slot: Option<usize> = None;

    let mut items: Vec<DiversityItem<'_>> = Vec::with_capacity(cell.entries.len());
    for leave_out in 0..cell.entries.len() {
        items.clear();
        for (i, &id) in cell.entries.iter().enumerate() {
            if i == leave_out {
                continue;
            }
            let entry = queue.get(id);
            items.push(DiversityItem {
                payload: entry_payload(entry, kind),
                compressed_len: entry.compressed_len,
            });
        }
        items.push(DiversityItem { payload: cand.payload(kind), compressed_len: cand.compressed_len });

        let score = metric.score_set(&items);
        if score > best_score {
            best_score = score;
            best_slot = Some(leave_out);
        }
    }

    best_slot
}

/// Replaces the evictee's content with the candidate's, preserving the
/// entry's id and therefore every cell slot that references it. Rehomes the
/// entry in the hash index, rewrites the persisted file in place, and renames
/// it to carry the update timestamp.
fn swap_in_candidate(
    queue: &mut Queue,
    input_hash_index: &mut InputHashIndex,
    evictee: EntryId,
    cand: &ExecCandidate<'_>,
    run_time_ms: u64,
) {
    if let Err(e) = input_hash_index.move_entry(queue, evictee, cand.input_hash) {
        fatal!("{e} while evicting queue entry {evictee}");
    }

    let entry = queue.get_mut(evictee);
    entry.len = cand.testcase.len() as u32;
    entry.testcase.clear();
    entry.testcase.extend_from_slice(cand.testcase);
    entry.compressed_len = cand.compressed_len;
    entry.trace_mini.clear();
    entry.trace_mini.extend_from_slice(cand.trace_mini.as_deref().unwrap_or(&[]));
    entry.exec_cksum = 0;

    if let Err(e) = persist::rewrite_file(&entry.fname, &entry.testcase) {
        fatal!("unable to rewrite '{}': {e}", entry.fname.display());
    }
    let renamed = persist::updated_filename(&entry.fname, run_time_ms);
    if let Err(e) = std::fs::rename(&entry.fname, &renamed) {
        fatal!("failed to rename '{}' to '{}': {e}", entry.fname.display(), renamed.display());
    }
    entry.fname = renamed;
}

/// Files the execution into every cell its trace touches, creating, skipping
/// or evicting per cell. Returns true when at least one entry was created or
/// replaced.
///
/// Calibration runs at most once per call; its result is shared across every
/// cell this execution touches. Re-processing an identical trace immediately
/// afterwards changes no cell membership and no score.
pub(crate) fn save_to_edge_entries(
    state: &mut CorpusState,
    runner: &mut dyn TargetRunner,
    trace: &[u8],
    cand: &mut ExecCandidate<'_>,
    new_bits: NewCoverage,
) -> bool {
    let start = state.start;
    let prev_ms = state.prev_run_time_ms;
    let CorpusState {
        settings,
        queue,
        metric,
        edge_index,
        input_hash_index,
        top_rated,
        op_ctx,
        queued_favored,
        discovered_edge_entries,
        pending_edge_entries,
        ..
    } = state;

    let k = edge_index.entries_per_edge;
    let mut shared_cal: Option<Calibration> = None;
    let mut is_duplicate = input_hash_index.contains(cand.input_hash);
    let mut inserted = false;

    for (edge, &raw) in trace.iter().enumerate() {
        if raw == 0 {
            continue;
        }
        let class = COUNT_CLASS_LOOKUP8[raw as usize];
        let bucket = bucket_of(class);
        let cell_idx = edge * BUCKET_COUNT + bucket as usize;

        edge_index.cells[cell_idx].hit_count += 1;

        // Already represented by this exact content.
        let represented = edge_index.cells[cell_idx]
            .entries
            .iter()
            .any(|&id| queue.get(id).input_hash == cand.input_hash);
        if represented {
            continue;
        }

        let entry_count = edge_index.cells[cell_idx].entries.len();
        if entry_count < k {
            if entry_count == 0 {
                let cell = &mut edge_index.cells[cell_idx];
                cell.discovery_execs = runner.total_execs();
                *pending_edge_entries += 1;
                *discovered_edge_entries += 1;
            }

            // A non-empty cell gains nothing from a second copy of content
            // that already lives somewhere in the queue.
            if entry_count > 0 && is_duplicate {
                continue;
            }

            cand.ensure_diversity_payload(metric, trace);

            let run_ms = timefn::clock_span_ms(start) + prev_ms;
            let desc = describe_op(op_ctx, run_ms, NewCoverage::None, entry_count > 0, NAME_MAX - 35);
            let fname = {
                let cell = &edge_index.cells[cell_idx];
                settings.out_dir.join("queue").join(format!(
                    "id:{:06},edge_num:{},edge_freq:{},cksum:{:06},entry:{},{}",
                    queue.len(),
                    cell.edge_num,
                    cell.bucket_id,
                    cand.exec_cksum,
                    entry_count,
                    desc
                ))
            };
            if let Err(e) = persist::write_new_file(&fname, cand.testcase) {
                fatal!("unable to create '{}': {e}", fname.display());
            }

            let id = queue.add(fname, cand.testcase.len() as u32, false, entry_count as u32, 0, new_bits);
            {
                let entry = queue.get_mut(id);
                entry.testcase.extend_from_slice(cand.testcase);
                entry.input_hash = cand.input_hash;
                entry.compressed_len = cand.compressed_len;
                entry.trace_mini.extend_from_slice(cand.trace_mini.as_deref().unwrap_or(&[]));
                entry.edge_cell = Some(cell_idx);
            }
            input_hash_index.insert(queue, id);
            is_duplicate = true;

            let cell = &mut edge_index.cells[cell_idx];
            cell.entries.push(id);
            recompute_cell_score(queue, metric, cell);

            let cal = *shared_cal.get_or_insert_with(|| runner.calibrate(cand.testcase));
            if cal.fault == Fault::Error {
                fatal!("unable to execute target application");
            }
            queue.get_mut(id).apply_calibration(&cal);
            inserted = true;
            continue;
        }

        // Saturated cell: content already in the queue elsewhere adds nothing.
        if is_duplicate {
            continue;
        }

        // A redundant copy in the cell is a free win to reclaim.
        let mut eviction_slot = edge_index.cells[cell_idx]
            .entries
            .iter()
            .position(|&id| queue.get(id).duplicates > 0);

        if eviction_slot.is_none() {
            if !should_evaluate_eviction(edge_index.cells[cell_idx].hit_count) {
                continue;
            }
            cand.ensure_diversity_payload(metric, trace);
            eviction_slot =
                find_eviction_candidate(queue, metric, &edge_index.cells[cell_idx], cand);
        }
        let Some(slot) = eviction_slot else {
            continue;
        };

        cand.ensure_diversity_payload(metric, trace);
        let evictee = edge_index.cells[cell_idx].entries[slot];
        let run_ms = timefn::clock_span_ms(start) + prev_ms;
        swap_in_candidate(queue, input_hash_index, evictee, cand, run_ms);
        is_duplicate = true;

        {
            let cell = &mut edge_index.cells[cell_idx];
            cell.replacement_count += 1;
            recompute_cell_score(queue, metric, cell);
        }

        if queue.get(evictee).favored {
            queue.get_mut(evictee).favored = false;
            *queued_favored = queued_favored.saturating_sub(1);

            for edge_i in 0..settings.map_size {
                if top_rated[edge_i] != Some(evictee) {
                    continue;
                }
                // The swapped-in content need not cover this edge; pick the
                // best-rated entry among the cells that do.
                let mut best_factor = u64::MAX;
                let mut best_entry: Option<EntryId> = None;
                for reps in 0..BUCKET_COUNT {
                    let cell = &edge_index.cells[edge_i * BUCKET_COUNT + reps];
                    for &id in &cell.entries {
                        let factor = favored::fav_factor(queue.get(id));
                        if factor < best_factor {
                            best_factor = factor;
                            best_entry = Some(id);
                        }
                    }
                }
                if let Some(best) = best_entry {
                    top_rated[edge_i] = None;
                    favored::update_bitmap_score(queue, top_rated, queued_favored, best);
                    let (evictee_level, evictee_fuzzed) = {
                        let e = queue.get(evictee);
                        (e.fuzz_level, e.was_fuzzed)
                    };
                    let best_entry = queue.get_mut(best);
                    if !best_entry.was_fuzzed {
                        best_entry.fuzz_level = evictee_level;
                        best_entry.was_fuzzed = evictee_fuzzed;
                    }
                } else {
                    // Can happen when this execution is itself the first entry
                    // for the edge. Keeps the slot favored even though the
                    // entry now holds the swapped-in content; the next favored
                    // pass re-evaluates it.
                    let entry = queue.get_mut(evictee);
                    if !entry.favored {
                        entry.favored = true;
                        *queued_favored += 1;
                    }
                }
            }
        }

        let cal = *shared_cal.get_or_insert_with(|| runner.calibrate(cand.testcase));
        if cal.fault == Fault::Error {
            fatal!("unable to execute target application");
        }
        queue.get_mut(evictee).apply_calibration(&cal);
        inserted = true;
    }

    inserted
}
