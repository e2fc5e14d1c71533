//! Favored-set maintenance.
//!
//! Two covers coexist: the classic per-edge best-rated representative
//! (`favored`, smallest `exec_us · len` wins) and the compression-distance
//! cover (`ncdm_favored`, a greedy minimum cover of all discovered edges
//! tie-broken towards maximum set diversity).

use crate::bitmap::{contains_new_coverage, count_mini_bits, minimize_bits, or_into, trace_minis_differ};
use crate::bitmap::count_non_255_bytes;
use crate::diversity::DiversityItem;
use crate::displaylevel;
use crate::fatal;
use crate::state::CorpusState;

use super::entry::{EntryId, QueueEntry};
use super::{entry_payload, Queue};

/// Rating used for the classic favored cover; lower is better.
pub(crate) fn fav_factor(entry: &QueueEntry) -> u64 {
    entry.exec_us * entry.len as u64
}

/// Lets an entry claim every `top_rated` slot it covers and beats; flips its
/// `favored` flag (and the counter) when it claimed at least one.
pub(crate) fn update_bitmap_score(
    queue: &mut Queue,
    top_rated: &mut [Option<EntryId>],
    queued_favored: &mut u32,
    id: EntryId,
) {
    let factor = fav_factor(queue.get(id));
    let mut claimed = false;

    for edge in 0..top_rated.len() {
        let covered = {
            let mini = &queue.get(id).trace_mini;
            mini.get(edge >> 3).is_some_and(|&b| b & (1u8 << (edge & 7)) != 0)
        };
        if !covered {
            continue;
        }
        let beats = match top_rated[edge] {
            Some(current) => factor < fav_factor(queue.get(current)),
            None => true,
        };
        if beats {
            top_rated[edge] = Some(id);
            claimed = true;
        }
    }

    if claimed {
        let entry = queue.get_mut(id);
        if !entry.favored {
            entry.favored = true;
            *queued_favored += 1;
        }
    }
}

/// Greedy set-cover of all discovered coverage by queue entries, tie-broken
/// towards diversity.
///
/// Clears all `ncdm_favored` flags, then repeatedly picks — among entries
/// still adding uncovered edges — the one maximizing the NCDₘ of the
/// selected set plus candidate (first pick: smallest compressed payload).
/// Completing the cover must always be possible; failure means the queue and
/// the virgin map have desynchronized, which is fatal.
pub fn set_ncdm_favored(state: &mut CorpusState) {
    let CorpusState { settings, queue, metric, virgin_bits, .. } = state;
    let mini_len = settings.map_size / 8;
    let kind = metric.payload_kind();

    for entry in queue.iter_mut() {
        entry.ncdm_favored = false;
    }

    let discovered_edges = count_non_255_bytes(virgin_bits);
    let inverted: Vec<u8> = virgin_bits.iter().map(|b| !b).collect();
    let mut all_discovered = vec![0u8; mini_len];
    minimize_bits(&mut all_discovered, &inverted);

    let mut selected_map = vec![0u8; mini_len];
    let mut selected: Vec<EntryId> = Vec::new();
    let mut total_ncdm = 0.0f32;

    while trace_minis_differ(&all_discovered, &selected_map) {
        let mut shortest = u32::MAX;
        let mut best_ncdm = 0.0f32;
        let mut best: Option<EntryId> = None;
        let mut first_with_cov: Option<EntryId> = None;

        for id in queue.ids() {
            let candidate = queue.get(id);
            if !contains_new_coverage(&candidate.trace_mini, &selected_map) {
                continue;
            }
            if first_with_cov.is_none() {
                first_with_cov = Some(id);
            }

            if selected.is_empty() {
                if candidate.compressed_len < shortest {
                    best = Some(id);
                    shortest = candidate.compressed_len;
                }
                continue;
            }

            let mut items: Vec<DiversityItem<'_>> = selected
                .iter()
                .map(|&sid| {
                    let member = queue.get(sid);
                    DiversityItem {
                        payload: entry_payload(member, kind),
                        compressed_len: member.compressed_len,
                    }
                })
                .collect();
            items.push(DiversityItem {
                payload: entry_payload(candidate, kind),
                compressed_len: candidate.compressed_len,
            });

            let ncdm = metric.ncdm(&items);
            if ncdm > best_ncdm {
                best = Some(id);
                best_ncdm = ncdm;
            }
        }

        // When every candidate scores zero the coverage tie-break decides.
        let Some(pick) = best.or(first_with_cov) else {
            fatal!(
                "coverage cover cannot complete: reached {} of {} minimized edges ({} discovered)",
                count_mini_bits(&selected_map),
                count_mini_bits(&all_discovered),
                discovered_edges
            );
        };

        or_into(&mut selected_map, &queue.get(pick).trace_mini);
        selected.push(pick);
        queue.get_mut(pick).ncdm_favored = true;
        total_ncdm = best_ncdm;
    }

    let favored: Vec<EntryId> = queue.ids().filter(|&id| queue.get(id).favored).collect();
    let favored_items: Vec<DiversityItem<'_>> = favored
        .iter()
        .map(|&id| {
            let member = queue.get(id);
            DiversityItem { payload: entry_payload(member, kind), compressed_len: member.compressed_len }
        })
        .collect();
    let favored_ncdm = metric.ncdm(&favored_items);

    displaylevel!(
        2,
        "full-coverage NCD set: {} entries with NCDm {:.5} (vs {} favored entries with NCDm {:.5})\n",
        selected.len(),
        total_ncdm,
        favored.len(),
        favored_ncdm
    );
}
