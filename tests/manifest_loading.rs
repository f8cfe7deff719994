// tests/manifest_loading.rs

use std::io::Write;

use bootdag::SchedulerState;
use bootdag::config::{load_and_validate, load_from_path};
use bootdag::monitor::SkipReason;
use bootdag::types::{ProcessRole, ThreadAffinity};
use bootdag_test_utils::builders::{ManifestBuilder, TaskConfigBuilder};
use bootdag_test_utils::recorder::RecordingSink;
use bootdag_test_utils::{TEST_TIMEOUT, init_tracing};
use tempfile::NamedTempFile;

fn write_manifest(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_full_manifest_with_defaults() {
    let file = write_manifest(
        r#"
[config]
worker_threads = 3
caller_wait_timeout_ms = 2000
process_role = "secondary"

[task.logging]
thread = "caller"
sleep_ms = 5

[task.network]
after = ["logging"]
block_caller = true
priority = -2

[task.push]
primary_only = true
enabled = false

[anchor.core]
after = ["logging", "network"]
"#,
    );

    let manifest = load_and_validate(file.path()).unwrap();
    assert_eq!(manifest.config.worker_threads, 3);
    assert_eq!(manifest.config.queue_capacity, 256);
    assert_eq!(manifest.config.caller_wait_timeout_ms, 2000);
    assert_eq!(manifest.config.task_wait_timeout_ms, 5000);
    assert_eq!(manifest.config.process_role, ProcessRole::Secondary);

    let logging = &manifest.task["logging"];
    assert_eq!(logging.thread, ThreadAffinity::Caller);
    assert_eq!(logging.sleep_ms, 5);
    assert!(logging.enabled);

    let network = &manifest.task["network"];
    assert_eq!(network.thread, ThreadAffinity::Worker);
    assert!(network.block_caller);
    assert_eq!(network.priority, Some(-2));

    assert!(!manifest.task["push"].enabled);
    assert_eq!(manifest.anchor["core"].after, vec!["logging", "network"]);
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_manifest(
        r#"
[task.a]
cmd = "echo a"
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn invalid_thread_value_is_rejected() {
    let file = write_manifest(
        r#"
[task.a]
thread = "gpu"
"#,
    );
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn manifest_runs_through_the_scheduler() {
    init_tracing();
    let manifest = ManifestBuilder::new()
        .worker_threads(2)
        .with_task(
            "logging",
            TaskConfigBuilder::new().on_caller_thread().sleep_ms(2).build(),
        )
        .with_task(
            "network",
            TaskConfigBuilder::new()
                .after("logging")
                .sleep_ms(10)
                .block_caller(true)
                .build(),
        )
        .with_task("analytics", TaskConfigBuilder::new().enabled(false).build())
        .with_task(
            "reports",
            TaskConfigBuilder::new().after("analytics").build(),
        )
        .with_anchor("core", &["logging", "network"])
        .build();

    let sink = RecordingSink::new();
    let mut builder = manifest.into_builder().unwrap();
    builder.monitor_sink(sink.clone());
    let scheduler = builder.build().unwrap();

    scheduler.start().unwrap();
    assert!(scheduler.wait_for_completion(TEST_TIMEOUT).unwrap());
    assert_eq!(scheduler.state(), SchedulerState::Completed);

    let report = sink.last_report().unwrap();
    assert_eq!(report.tasks.len(), 3);
    assert!(report.record_of("core").is_some());
    assert_eq!(
        report
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Disabled)
            .count(),
        2
    );
    assert!(report.record_of("network").unwrap().run.as_millis() >= 10);
}

#[test]
fn caller_only_manifest_needs_no_pool() {
    let manifest = ManifestBuilder::new()
        .with_task("ui", TaskConfigBuilder::new().on_caller_thread().build())
        .build();
    assert!(!manifest.has_worker_tasks());

    let scheduler = manifest.into_builder().unwrap().build().unwrap();
    scheduler.start().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Completed);
}

#[test]
fn secondary_role_from_manifest_skips_primary_only_tasks() {
    let manifest = ManifestBuilder::new()
        .process_role(ProcessRole::Secondary)
        .with_task(
            "push",
            TaskConfigBuilder::new()
                .on_caller_thread()
                .primary_only(true)
                .build(),
        )
        .build();

    let sink = RecordingSink::new();
    let mut builder = manifest.into_builder().unwrap();
    builder.monitor_sink(sink.clone());
    let scheduler = builder.build().unwrap();
    scheduler.start().unwrap();

    let report = sink.last_report().unwrap();
    assert!(report.tasks.is_empty());
    assert_eq!(report.skipped[0].reason, SkipReason::NotPrimaryProcess);
}
