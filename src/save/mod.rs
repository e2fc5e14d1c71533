//! The per-execution decision pipeline.
//!
//! [`save_if_interesting`] is the single entry point the fuzzing loop calls
//! after every target execution: it decides whether the input deserves to be
//! kept, routes it into the diversity queue, the plain queue, the hang
//! directory or the crash directory, and keeps the virgin maps, the indexes
//! and the on-disk corpus in sync. Update order per execution is strict:
//! virgin map, then edge index, then queue, then input-hash index, then disk.

pub mod descriptor;
pub mod partitions;
pub(crate) mod persist;

use std::path::PathBuf;

use crate::bitmap::{self, NewCoverage};
use crate::config::{HASH_CONST, KEEP_UNIQUE_CRASH, KEEP_UNIQUE_HANG, NAME_MAX};
use crate::displaylevel;
use crate::exec::{Fault, TargetRunner};
use crate::fatal;
use crate::hash;
use crate::queue::edge_index::{save_to_edge_entries, ExecCandidate};
use crate::queue::favored;
use crate::state::CorpusState;

use descriptor::describe_op;

/// Checks whether the result of an execution is interesting, saving or
/// queueing the testcase for further fuzzing if so. Returns true when the
/// input was kept.
pub fn save_if_interesting(
    state: &mut CorpusState,
    runner: &mut dyn TargetRunner,
    mem: &[u8],
    fault: Fault,
) -> bool {
    if mem.is_empty() {
        return false;
    }
    if state.stop_soon {
        return false;
    }

    let mut keeping = false;
    let mut classified = false;
    let mut new_bits = NewCoverage::None;
    let mut new_partition = false;

    if fault == state.expected_fault() {
        // Keep only if there are new bits in the map, add to queue for
        // future fuzzing, etc.
        let (news, got_classified) = {
            let trace = runner.trace_bits();
            bitmap::has_new_bits_unclassified(&state.classifier, &mut state.virgin_bits, trace)
        };
        new_bits = news;
        classified = got_classified;
        if new_bits != NewCoverage::None {
            state.bitmap_changed = true;
        }

        let mut interesting = new_bits != NewCoverage::None;
        let mut cksum = 0u64;
        let queue_len_before = state.queue.len();

        if state.settings.ncd_based_queue {
            if new_bits != NewCoverage::None {
                state.queued_discovered += 1;
            }
            cksum = {
                let trace = runner.trace_bits();
                hash::hash64(trace, HASH_CONST)
            };

            // The walk interleaves queue mutation with calibration runs, so it
            // works on a stable copy of the trace. An execution can deserve
            // representation in a newly-seen (edge, bucket) cell even when the
            // virgin map reported nothing, so this runs unconditionally.
            let mut exec_trace = std::mem::take(&mut state.exec_trace);
            exec_trace.clear();
            exec_trace.extend_from_slice(runner.trace_bits());
            let mut cand = ExecCandidate::new(mem, cksum);
            save_to_edge_entries(state, runner, &exec_trace, &mut cand, new_bits);
            state.exec_trace = exec_trace;
        }

        if let Some(hashfuzz) = state.settings.hashfuzz {
            let class = if hashfuzz.input_based {
                partitions::classify_input(mem, hashfuzz.partitions)
            } else {
                runner.output_hash_class()
            };

            if hashfuzz.mimic_transformation {
                let partition_bit = 1u64 << (class & 63);
                if state.hashfuzz_discovered_partitions & partition_bit == 0 {
                    displaylevel!(2, "Adding first seed for partition {}\n", class);
                    state.hashfuzz_discovered_partitions |= partition_bit;
                    interesting = true;
                }
            } else {
                cksum = {
                    let trace = runner.trace_bits();
                    hash::hash64(trace, HASH_CONST)
                };
                let known_path = state.partition_index.contains(cksum);
                if interesting || known_path {
                    // Recording matters even for already-interesting inputs:
                    // it builds the map of covered partitions per path.
                    new_partition =
                        state.partition_index.check_if_new_partition(cksum, class).is_some();
                    interesting = interesting || new_partition;
                }
            }
        }

        if !interesting {
            if state.settings.crash_mode {
                state.total_crashes += 1;
            }
            return false;
        }

        if !state.settings.ncd_based_queue {
            if cksum == 0 {
                cksum = {
                    let trace = runner.trace_bits();
                    hash::hash64(trace, HASH_CONST)
                };
            }
            save_to_plain_queue(state, runner, mem, cksum, new_bits, new_partition, &mut classified);
        }

        if new_bits == NewCoverage::NewEdges && state.queue.len() > queue_len_before {
            state.queued_with_cov += 1;
        }

        keeping = true;
    }

    let save_name: Option<PathBuf> = match fault {
        Fault::Tmout => {
            // Timeouts are not very interesting, but a handful of unique
            // samples is still kept; novelty against the hang-specific
            // virgin map is the uniqueness signal.
            state.total_tmouts += 1;
            if state.unique_hangs >= KEEP_UNIQUE_HANG {
                return keeping;
            }

            {
                let trace = runner.trace_bits();
                if !classified {
                    state.classifier.classify_counts(trace);
                    classified = true;
                }
                bitmap::simplify_trace(trace);
                if bitmap::has_new_bits(&mut state.virgin_tmout, trace) == NewCoverage::None {
                    return keeping;
                }
            }
            state.unique_tmouts += 1;

            // Confirm a genuine hang by re-running with the more generous
            // timeout, unless the regular timeout is already generous.
            let mut upgraded_to_crash = false;
            if state.settings.exec_tmout_ms < state.settings.hang_tmout_ms {
                if state.stop_soon {
                    return keeping;
                }
                let new_fault = runner.run(mem, state.settings.hang_tmout_ms);
                {
                    let trace = runner.trace_bits();
                    state.classifier.classify_counts(trace);
                }
                classified = true;

                // Increasing the timeout can uncover a crash instead; don't
                // discard it if so.
                if !state.stop_soon && new_fault == Fault::Crash {
                    upgraded_to_crash = true;
                } else if state.stop_soon || new_fault != Fault::Tmout {
                    return keeping;
                }
            }

            if upgraded_to_crash {
                crash_branch(state, runner, &mut classified)
            } else {
                let desc = describe_op(
                    &state.op_ctx,
                    state.run_time_ms(),
                    NewCoverage::None,
                    false,
                    NAME_MAX - "id:000000,".len(),
                );
                let fname = state
                    .settings
                    .out_dir
                    .join("hangs")
                    .join(format!("id:{:06},{}", state.unique_hangs, desc));
                state.unique_hangs += 1;
                state.last_hang_time_ms = state.run_time_ms();
                Some(fname)
            }
        }

        Fault::Crash => crash_branch(state, runner, &mut classified),

        Fault::Error => fatal!("unable to execute target application"),

        Fault::None => None,
    };

    if let Some(fname) = save_name {
        if let Err(e) = persist::write_new_file(&fname, mem) {
            fatal!("unable to create '{}': {e}", fname.display());
        }
    }

    keeping
}

/// Crash handling shared by the crash fault and the timeout-upgrade path.
/// Returns the filename to persist when the crash is unique.
fn crash_branch(
    state: &mut CorpusState,
    runner: &mut dyn TargetRunner,
    classified: &mut bool,
) -> Option<PathBuf> {
    state.total_crashes += 1;
    if state.unique_crashes >= KEEP_UNIQUE_CRASH {
        return None;
    }

    {
        let trace = runner.trace_bits();
        if !*classified {
            state.classifier.classify_counts(trace);
            *classified = true;
        }
        bitmap::simplify_trace(trace);
        if bitmap::has_new_bits(&mut state.virgin_crash, trace) == NewCoverage::None {
            return None;
        }
    }

    if state.unique_crashes == 0 {
        persist::write_crash_readme(&state.settings.out_dir, state.settings.command_line.as_deref());
    }

    let desc = describe_op(
        &state.op_ctx,
        state.run_time_ms(),
        NewCoverage::None,
        false,
        NAME_MAX - "id:000000,sig:00,".len(),
    );
    let fname = state.settings.out_dir.join("crashes").join(format!(
        "id:{:06},sig:{:02},{}",
        state.unique_crashes,
        runner.last_kill_signal(),
        desc
    ));
    state.unique_crashes += 1;
    state.last_crash_time_ms = state.run_time_ms();
    state.last_crash_execs = runner.total_execs();
    Some(fname)
}

/// Plain (non-diversity) queueing: one file and one calibrated queue entry
/// per kept input.
fn save_to_plain_queue(
    state: &mut CorpusState,
    runner: &mut dyn TargetRunner,
    mem: &[u8],
    cksum: u64,
    new_bits: NewCoverage,
    new_partition: bool,
    classified: &mut bool,
) {
    let desc = describe_op(
        &state.op_ctx,
        state.run_time_ms(),
        new_bits,
        new_partition,
        NAME_MAX - "id:000000,".len(),
    );
    let fname = state
        .settings
        .out_dir
        .join("queue")
        .join(format!("id:{:06},cksum:{:020},{}", state.queue.len(), cksum, desc));
    if let Err(e) = persist::write_new_file(&fname, mem) {
        fatal!("unable to create '{}': {e}", fname.display());
    }

    let id = state.queue.add(fname, mem.len() as u32, false, 0, cksum, new_bits);
    {
        let entry = state.queue.get_mut(id);
        entry.testcase.extend_from_slice(mem);
        entry.input_hash = hash::input_hash(mem);
    }
    state.input_hash_index.insert(&mut state.queue, id);

    // The stored checksum must reflect classified counts.
    let (classified_cksum, trace_mini) = {
        let trace = runner.trace_bits();
        if !*classified {
            state.classifier.classify_counts(trace);
            *classified = true;
        }
        let mut mini = vec![0u8; trace.len() / 8];
        bitmap::minimize_bits(&mut mini, trace);
        (hash::hash64(trace, HASH_CONST), mini)
    };
    {
        let entry = state.queue.get_mut(id);
        entry.exec_cksum = classified_cksum;
        entry.trace_mini = trace_mini;
    }

    let cal = runner.calibrate(mem);
    if cal.fault == Fault::Error {
        fatal!("unable to execute target application");
    }
    state.queue.get_mut(id).apply_calibration(&cal);
    favored::update_bitmap_score(&mut state.queue, &mut state.top_rated, &mut state.queued_favored, id);
}
