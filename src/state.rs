//! Corpus-core state: settings, maps, indexes, counters.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use crate::bitmap::Classifier;
use crate::config::BUCKET_COUNT;
use crate::displaylevel;
use crate::diversity::{DiversityMetric, MetricKind, PayloadKind};
use crate::exec::Fault;
use crate::fatal;
use crate::queue::{EdgeIndex, EntryId, InputHashIndex, Queue};
use crate::save::descriptor::OpContext;
use crate::save::partitions::PathPartitionIndex;
use crate::timefn::{self, TimeT};

/// Partition-classification settings (hashfuzz mode).
#[derive(Debug, Clone, Copy)]
pub struct HashfuzzSettings {
    /// Partition count, at most 64.
    pub partitions: u8,
    /// Classify by input content; otherwise the class is read back from the
    /// target via the runner.
    pub input_based: bool,
    /// Only enable the first seed reaching each partition instead of keeping
    /// a per-path partition index.
    pub mimic_transformation: bool,
}

/// Runtime configuration. Treat as read-only once the state is constructed;
/// the map size and metric selection size the indexes.
#[derive(Debug, Clone)]
pub struct CorpusSettings {
    /// Root of the persisted corpus (`queue/`, `crashes/`, `hangs/`,
    /// `fuzz_bitmap` live underneath).
    pub out_dir: PathBuf,
    /// Trace map length, negotiated with the runner once at init.
    /// Must be a power of two, at least 8.
    pub map_size: usize,
    pub metric: MetricKind,
    pub payload: PayloadKind,
    /// Route inputs through the per-edge diversity queue instead of plain
    /// one-file-per-interesting-input queueing.
    pub ncd_based_queue: bool,
    pub hashfuzz: Option<HashfuzzSettings>,
    pub exec_tmout_ms: u32,
    /// Generous timeout used to confirm hangs; no confirmation run happens
    /// unless it exceeds `exec_tmout_ms`.
    pub hang_tmout_ms: u32,
    /// Crash-exploration mode: clean runs are the anomaly.
    pub crash_mode: bool,
    /// Original command line, reproduced in the crash README.
    pub command_line: Option<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        CorpusSettings {
            out_dir: PathBuf::from("findings"),
            map_size: 65536,
            metric: MetricKind::Ncdm,
            payload: PayloadKind::Testcase,
            ncd_based_queue: true,
            hashfuzz: None,
            exec_tmout_ms: 1000,
            hang_tmout_ms: 1000,
            crash_mode: false,
            command_line: None,
        }
    }
}

/// Everything the corpus core owns. Single-threaded; every transition is
/// synchronous with the caller.
pub struct CorpusState {
    pub settings: CorpusSettings,
    pub classifier: Classifier,
    pub metric: DiversityMetric,
    pub queue: Queue,
    pub input_hash_index: InputHashIndex,
    pub edge_index: EdgeIndex,
    pub partition_index: PathPartitionIndex,
    pub hashfuzz_discovered_partitions: u64,

    /// Inverted union of all classified traces; set bits are undiscovered.
    pub virgin_bits: Vec<u8>,
    pub virgin_tmout: Vec<u8>,
    pub virgin_crash: Vec<u8>,
    /// Set when `virgin_bits` changed since the last checkpoint.
    pub bitmap_changed: bool,

    /// Cooperative cancellation; polled at the top of the pipeline and
    /// before the hang-confirmation re-run.
    pub stop_soon: bool,

    /// Best-rated entry per edge for the classic favored cover.
    pub top_rated: Vec<Option<EntryId>>,

    /// Mutation-stage context used for filename descriptors.
    pub op_ctx: OpContext,

    pub(crate) start: TimeT,
    /// Run time accumulated by previous sessions, for resumed runs.
    pub prev_run_time_ms: u64,
    /// Reusable per-execution copy of the trace map.
    pub(crate) exec_trace: Vec<u8>,

    // User-visible counters.
    pub total_crashes: u64,
    pub unique_crashes: u64,
    pub total_tmouts: u64,
    pub unique_tmouts: u64,
    pub unique_hangs: u64,
    pub queued_favored: u32,
    pub queued_with_cov: u32,
    /// Executions that contributed new virgin bits.
    pub queued_discovered: u32,
    /// (edge, bucket) cells that have received their first entry.
    pub discovered_edge_entries: u32,
    pub pending_edge_entries: u32,
    pub last_crash_time_ms: u64,
    pub last_hang_time_ms: u64,
    pub last_crash_execs: u64,
}

impl CorpusState {
    /// Validates the settings, creates the output layout and sizes every
    /// index for the negotiated map.
    pub fn new(settings: CorpusSettings) -> anyhow::Result<Self> {
        anyhow::ensure!(
            settings.map_size >= 8 && settings.map_size.is_power_of_two(),
            "map size must be a power of two of at least 8 bytes, got {}",
            settings.map_size
        );
        if let Some(hashfuzz) = &settings.hashfuzz {
            anyhow::ensure!(
                (1..=64).contains(&hashfuzz.partitions),
                "partition count must be 1..=64, got {}",
                hashfuzz.partitions
            );
        }

        for sub in ["queue", "crashes", "hangs"] {
            let dir = settings.out_dir.join(sub);
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating output directory '{}'", dir.display()))?;
        }

        let metric = DiversityMetric::new(settings.metric, settings.payload);
        let edge_index = EdgeIndex::new(settings.map_size, metric.entries_per_edge());
        let map_size = settings.map_size;

        Ok(CorpusState {
            settings,
            classifier: Classifier::new(),
            metric,
            queue: Queue::new(),
            input_hash_index: InputHashIndex::new(),
            edge_index,
            partition_index: PathPartitionIndex::new(),
            hashfuzz_discovered_partitions: 0,
            virgin_bits: vec![0xff; map_size],
            virgin_tmout: vec![0xff; map_size],
            virgin_crash: vec![0xff; map_size],
            bitmap_changed: false,
            stop_soon: false,
            top_rated: vec![None; map_size],
            op_ctx: OpContext::default(),
            start: timefn::get_time(),
            prev_run_time_ms: 0,
            exec_trace: Vec::with_capacity(map_size),
            total_crashes: 0,
            unique_crashes: 0,
            total_tmouts: 0,
            unique_tmouts: 0,
            unique_hangs: 0,
            queued_favored: 0,
            queued_with_cov: 0,
            queued_discovered: 0,
            discovered_edge_entries: 0,
            pending_edge_entries: 0,
            last_crash_time_ms: 0,
            last_hang_time_ms: 0,
            last_crash_execs: 0,
        })
    }

    pub fn map_size(&self) -> usize {
        self.settings.map_size
    }

    /// Total paths in the queue, as shown in the status UI.
    pub fn queued_paths(&self) -> usize {
        self.queue.len()
    }

    /// The fault value treated as a normal run.
    pub fn expected_fault(&self) -> Fault {
        if self.settings.crash_mode {
            Fault::Crash
        } else {
            Fault::None
        }
    }

    /// Milliseconds of fuzzing time, including previous sessions.
    pub fn run_time_ms(&self) -> u64 {
        timefn::clock_span_ms(self.start) + self.prev_run_time_ms
    }

    /// Checkpoints the virgin map to `<out_dir>/fuzz_bitmap` when it changed
    /// since the last call. Writes exactly the map size, truncating any
    /// previous checkpoint.
    pub fn write_bitmap(&mut self) {
        if !self.bitmap_changed {
            return;
        }
        self.bitmap_changed = false;

        let path = self.settings.out_dir.join("fuzz_bitmap");
        if let Err(e) = fs::write(&path, &self.virgin_bits) {
            fatal!("unable to write '{}': {e}", path.display());
        }
    }

    /// Verbose dump of queue membership and the partition table.
    pub fn debug_dump(&self) {
        displaylevel!(3, "queued paths: {}\n", self.queue.len());
        let favored: Vec<EntryId> = self.queue.ids().filter(|&id| self.queue.get(id).favored).collect();
        let ncdm_favored: Vec<EntryId> =
            self.queue.ids().filter(|&id| self.queue.get(id).ncdm_favored).collect();
        displaylevel!(3, "favs: {:?}\n", favored);
        displaylevel!(3, "NCDm_favs: {:?}\n", ncdm_favored);
        displaylevel!(3, "path partitions tracked: {}\n", self.partition_index.len());
        for id in self.queue.ids() {
            let entry = self.queue.get(id);
            if let Some(cell_idx) = entry.edge_cell {
                displaylevel!(
                    4,
                    "  entry {:04}: edge {} bucket {} dup {} file {}\n",
                    id,
                    cell_idx / BUCKET_COUNT,
                    cell_idx % BUCKET_COUNT,
                    entry.duplicates,
                    entry.fname.display()
                );
            }
        }
    }
}
