//! File persistence for queue, crash and hang testcases.
//!
//! Queue files are created once with `create_new` (clobbering an id would
//! corrupt the corpus) and rewritten in place only by an eviction swap,
//! which then renames the file so the name carries the update timestamp.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::fatal;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

fn open_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.write(true);
    #[cfg(unix)]
    opts.mode(crate::config::DEFAULT_PERMISSION);
    opts
}

/// Creates `path` and writes `data` to it. Fails if the file already exists.
pub(crate) fn write_new_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = open_options().create_new(true).open(path)?;
    file.write_all(data)
}

/// Truncates an existing file and rewrites it with `data`.
pub(crate) fn rewrite_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = open_options().truncate(true).open(path)?;
    file.write_all(data)
}

/// Splices `,updated:<ms>` into a queue filename just before its `,op:`
/// segment, replacing any previous `,updated:` stamp.
pub(crate) fn updated_filename(fname: &Path, run_time_ms: u64) -> PathBuf {
    let Some(name) = fname.file_name().and_then(|n| n.to_str()) else {
        fatal!("queue filename is not valid UTF-8: {}", fname.display());
    };
    let Some(op_pos) = name.find(",op:") else {
        fatal!("failed to find \",op:\" in {name}");
    };
    let cut = name.find(",updated:").unwrap_or(op_pos);
    let renamed = format!("{},updated:{}{}", &name[..cut], run_time_ms, &name[op_pos..]);
    fname.with_file_name(renamed)
}

/// Drops a README next to the first crash. Failing to write it is impolite
/// to die over, so errors are ignored.
pub(crate) fn write_crash_readme(out_dir: &Path, command_line: Option<&str>) {
    let path = out_dir.join("crashes").join("README.txt");
    let Ok(mut file) = open_options().create_new(true).open(path) else {
        return;
    };
    let _ = writeln!(
        file,
        "Command line used to find this crash:\n\n{}\n\n\
         If you can't reproduce a bug outside of the fuzzer, be sure to run the\n\
         target with the same memory limit and environment the fuzzing session used.\n\n\
         Consider minimizing the test cases before investigating the crashes or\n\
         reporting them upstream.\n",
        command_line.unwrap_or("(unknown)")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_rewrite_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id:000000,src:000000,time:0,op:seed");
        write_new_file(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        // Creating the same id again must fail.
        assert!(write_new_file(&path, b"clobber").is_err());

        rewrite_file(&path, b"second, longer content").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second, longer content");
    }

    #[test]
    fn updated_stamp_is_spliced_before_op() {
        let fname = Path::new("/out/queue/id:000003,cksum:000042,src:000001,time:9,op:havoc,rep:4");
        let renamed = updated_filename(fname, 777);
        assert_eq!(
            renamed,
            Path::new("/out/queue/id:000003,cksum:000042,src:000001,time:9,updated:777,op:havoc,rep:4")
        );
    }

    #[test]
    fn updated_stamp_replaces_previous_one() {
        let fname = Path::new("/out/queue/id:000003,cksum:000042,src:000001,time:9,updated:777,op:havoc");
        let renamed = updated_filename(fname, 1234);
        assert_eq!(
            renamed,
            Path::new("/out/queue/id:000003,cksum:000042,src:000001,time:9,updated:1234,op:havoc")
        );
    }

    #[test]
    fn crash_readme_is_written_once() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("crashes")).unwrap();
        write_crash_readme(dir.path(), Some("./fuzz -i in -o out -- ./target"));
        let text = std::fs::read_to_string(dir.path().join("crashes/README.txt")).unwrap();
        assert!(text.contains("./fuzz -i in -o out -- ./target"));

        // Second call silently leaves the existing file alone.
        write_crash_readme(dir.path(), Some("other"));
        let again = std::fs::read_to_string(dir.path().join("crashes/README.txt")).unwrap();
        assert_eq!(text, again);
    }
}
