//! RunLog integration tests: file sink behavior and snapshot stability.

use tempfile::TempDir;

use rigup::{LogEntry, RunLog, Severity};

#[test]
fn snapshot_after_n_appends_has_length_n() {
    let mut log = RunLog::new();
    for i in 0..7 {
        log.append(Severity::Info, format!("message {}", i));
    }

    let snapshot = log.snapshot();
    assert_eq!(snapshot.len(), 7);
    for (i, entry) in snapshot.iter().enumerate() {
        assert_eq!(entry.message, format!("message {}", i));
    }

    // No further appends: a second snapshot is identical.
    let again = log.snapshot();
    assert_eq!(again.len(), snapshot.len());
    for (a, b) in snapshot.iter().zip(again.iter()) {
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.message, b.message);
    }
}

#[test]
fn sink_receives_one_json_line_per_entry() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("logs").join("run.jsonl");

    let mut log = RunLog::with_sink(path.clone());
    log.info("first");
    log.warn("second");
    log.error("third");

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);

    let parsed: Vec<LogEntry> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(parsed[0].severity, Severity::Info);
    assert_eq!(parsed[1].severity, Severity::Warn);
    assert_eq!(parsed[2].severity, Severity::Error);
    assert_eq!(parsed[2].message, "third");
}

#[test]
fn unwritable_sink_parent_degrades_to_memory_only() {
    let temp = TempDir::new().unwrap();
    // The parent of the sink path is a file, so the directory can never be
    // created.
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"in the way").unwrap();

    let mut log = RunLog::with_sink(blocker.join("run.jsonl"));
    assert!(log.sink_path().is_none());

    log.info("still recorded");
    assert_eq!(log.len(), 1);
    assert_eq!(log.snapshot()[0].message, "still recorded");
}

#[test]
fn failing_append_drops_the_sink_silently() {
    let temp = TempDir::new().unwrap();
    // The sink path itself is a directory; the first append fails and the
    // log quietly becomes memory-only.
    let dir_as_sink = temp.path().join("run.jsonl");
    std::fs::create_dir_all(&dir_as_sink).unwrap();

    let mut log = RunLog::with_sink(dir_as_sink);
    log.info("one");
    log.info("two");

    assert!(log.sink_path().is_none());
    assert_eq!(log.len(), 2);
}
