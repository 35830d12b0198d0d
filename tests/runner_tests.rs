use pagurus::{Error, Runner, RunnerConfig, Sample, SinkFormat, Target};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn base_config(target: Target, outfile: &std::path::Path) -> RunnerConfig {
    RunnerConfig::new(target, outfile)
        .with_interval(Duration::from_millis(50))
        .with_handoff_delay(Duration::ZERO)
}

#[test]
fn test_monitor_command_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let config = base_config(
        Target::Command(vec!["sleep".to_string(), "1".to_string()]),
        &path,
    );
    Runner::new(config).run().expect("run should drain cleanly");

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], Sample::FIELDS.join(","));
    assert!(lines.len() >= 2, "at least one sample for a 1s process");
    for line in &lines[1..] {
        assert_eq!(
            line.split(',').count(),
            Sample::FIELDS.len(),
            "row shape must stay fixed: {}",
            line
        );
    }
}

#[test]
fn test_monitor_command_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.jsonl");

    let config = base_config(
        Target::Command(vec!["sleep".to_string(), "1".to_string()]),
        &path,
    )
    .with_format(SinkFormat::Structured);
    Runner::new(config).run().expect("run should drain cleanly");

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(!lines.is_empty());
    for line in &lines {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        let obj = record.as_object().unwrap();
        assert_eq!(obj.len(), Sample::FIELDS.len());
        assert!(obj.contains_key("timestamp"));
        assert!(obj.contains_key("mem_rss"));
    }
}

#[test]
fn test_static_env_fields_in_every_row() {
    std::env::set_var("PAGURUS_RUN_TAG", "integration");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let config = base_config(
        Target::Command(vec!["sleep".to_string(), "1".to_string()]),
        &path,
    )
    .with_static_fields(["PAGURUS_RUN_TAG"]);
    Runner::new(config).run().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(lines[0].ends_with(",PAGURUS_RUN_TAG"));
    for line in &lines[1..] {
        assert!(line.ends_with(",integration"), "row: {}", line);
    }

    std::env::remove_var("PAGURUS_RUN_TAG");
}

#[test]
fn test_field_subset_selection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let config = base_config(
        Target::Command(vec!["sleep".to_string(), "1".to_string()]),
        &path,
    )
    .with_fields(["num_threads", "cpu_percent", "mem_rss"]);
    Runner::new(config).run().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "num_threads,cpu_percent,mem_rss");
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 3);
    }
}

#[test]
fn test_short_lived_process_drains_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    // `true` exits before the first liveness check most of the time; either
    // way the run must end cleanly with a valid file.
    let config = base_config(Target::Command(vec!["true".to_string()]), &path);
    Runner::new(config).run().expect("exit race is not an error");

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], Sample::FIELDS.join(","));
}

#[test]
fn test_stop_flag_ends_run_early() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let flag = Arc::new(AtomicBool::new(false)); // already cleared
    let config = base_config(
        Target::Command(vec!["sleep".to_string(), "5".to_string()]),
        &path,
    )
    .with_stop_flag(flag);

    let start = Instant::now();
    Runner::new(config).run().expect("interrupted run is clean");
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(path.is_file(), "sink is opened and closed regardless");
}

#[test]
fn test_missing_pid_fails_before_sink_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let config = base_config(Target::Pid(99_999_999), &path);
    let result = Runner::new(config).run();

    assert!(matches!(result, Err(Error::ProcessNotFound(_))));
    assert!(!path.exists(), "no output file for a failed attach");
}

#[test]
fn test_invalid_interval_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.csv");

    let config = base_config(Target::Pid(1), &path).with_interval(Duration::ZERO);
    let result = Runner::new(config).run();
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}
