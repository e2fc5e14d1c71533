//! Shared helpers for the integration suites: a scripted in-memory target
//! runner and state constructors over a temp directory.

use std::path::Path;

use ncdfuzz::{Calibration, CorpusSettings, CorpusState, Fault, MetricKind, TargetRunner};

/// In-memory stand-in for the forkserver: the test sets the trace and the
/// outcomes, the core reads them back.
pub struct ScriptedRunner {
    pub trace: Vec<u8>,
    pub cal: Calibration,
    /// How many calibrations the core requested.
    pub calibrations: u32,
    /// How many re-runs the core requested.
    pub runs: u32,
    /// Fault the next `run()` reports.
    pub rerun_fault: Fault,
    /// Trace installed by the next `run()`, when set.
    pub rerun_trace: Option<Vec<u8>>,
    pub execs: u64,
    pub signal: i32,
    pub output_class: u8,
}

impl ScriptedRunner {
    pub fn new(map_size: usize) -> Self {
        ScriptedRunner {
            trace: vec![0; map_size],
            cal: Calibration { exec_us: 100, bitmap_size: 1, ..Calibration::default() },
            calibrations: 0,
            runs: 0,
            rerun_fault: Fault::Tmout,
            rerun_trace: None,
            execs: 0,
            signal: 11,
            output_class: 0,
        }
    }

    /// Clears the trace and sets the given raw hit counts.
    pub fn set_trace(&mut self, hits: &[(usize, u8)]) {
        self.trace.iter_mut().for_each(|b| *b = 0);
        for &(edge, count) in hits {
            self.trace[edge] = count;
        }
    }
}

impl TargetRunner for ScriptedRunner {
    fn trace_bits(&mut self) -> &mut [u8] {
        &mut self.trace
    }

    fn run(&mut self, _testcase: &[u8], _timeout_ms: u32) -> Fault {
        self.runs += 1;
        self.execs += 1;
        if let Some(trace) = self.rerun_trace.take() {
            self.trace = trace;
        }
        self.rerun_fault
    }

    fn calibrate(&mut self, _testcase: &[u8]) -> Calibration {
        self.calibrations += 1;
        self.execs += 1;
        self.cal
    }

    fn last_kill_signal(&self) -> i32 {
        self.signal
    }

    fn output_hash_class(&self) -> u8 {
        self.output_class
    }

    fn total_execs(&self) -> u64 {
        self.execs
    }
}

pub fn settings(out_dir: &Path, map_size: usize) -> CorpusSettings {
    CorpusSettings {
        out_dir: out_dir.to_path_buf(),
        map_size,
        ..CorpusSettings::default()
    }
}

/// NCD-queue state over a temp directory, quiet.
pub fn ncd_state(out_dir: &Path, map_size: usize) -> CorpusState {
    ncdfuzz::display::set_display_level(0);
    CorpusState::new(settings(out_dir, map_size)).expect("state construction")
}

/// Levenshtein-metric state (two-entry cells), quiet.
pub fn lev_state(out_dir: &Path, map_size: usize) -> CorpusState {
    ncdfuzz::display::set_display_level(0);
    let mut s = settings(out_dir, map_size);
    s.metric = MetricKind::Levenshtein;
    CorpusState::new(s).expect("state construction")
}

/// Files directly inside `dir`, sorted by name.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read_dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
