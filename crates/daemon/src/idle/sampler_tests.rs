// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use outpost_core::ProbeOutcome;
use outpost_provider::{ExecOutput, ShellError};
use std::time::Duration;

const IDLE_PROBE: &str = "cpu=2.0\nmem=5.0\nsessions=0\nnet_in=0\nnet_out=0\n";

fn ok_output(stdout: &str) -> ExecOutput {
    ExecOutput { exit_code: 0, stdout: stdout.to_string(), stderr: String::new() }
}

#[tokio::test]
async fn probe_inserts_an_ok_sample() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.shell.set_default_exec(ok_output(IDLE_PROBE));

    h.clock.advance(Duration::from_secs(60));
    h.sampler.sample_one("w1").await;

    let window = h.samples.window("w1").unwrap();
    let newest = window.newest().unwrap();
    assert_eq!(newest.outcome, ProbeOutcome::Ok);
    assert!((newest.cpu_pct - 2.0).abs() < f32::EPSILON);
    assert_eq!(h.samples.last_sample_at_ms(), Some(h.clock.epoch_ms()));
    assert_eq!(h.shell.exec_commands().len(), 1);
}

#[tokio::test]
async fn unreachable_shell_records_a_failed_sample() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.shell.push_exec(Err(ShellError::Connect("refused".to_string())));

    h.clock.advance(Duration::from_secs(60));
    h.sampler.sample_one("w1").await;

    assert_eq!(
        h.samples.window("w1").unwrap().newest().unwrap().outcome,
        ProbeOutcome::Unreachable
    );
}

#[tokio::test(start_paused = true)]
async fn slow_probe_times_out() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.shell.set_default_exec(ok_output(IDLE_PROBE));
    // Probe timeout in the harness is 200 ms.
    h.shell.set_exec_delay(Duration::from_secs(5));

    h.clock.advance(Duration::from_secs(60));
    h.sampler.sample_one("w1").await;

    assert_eq!(
        h.samples.window("w1").unwrap().newest().unwrap().outcome,
        ProbeOutcome::Timeout
    );
}

#[tokio::test]
async fn garbage_output_is_a_parse_error() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.shell.set_default_exec(ok_output("segmentation fault\n"));

    h.clock.advance(Duration::from_secs(60));
    h.sampler.sample_one("w1").await;

    assert_eq!(
        h.samples.window("w1").unwrap().newest().unwrap().outcome,
        ProbeOutcome::ParseError
    );
}

#[tokio::test]
async fn failed_probes_never_queue_actions() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.with_balanced_policy();
    h.shell.push_exec(Err(ShellError::Connect("refused".to_string())));

    for _ in 0..10 {
        h.clock.advance(Duration::from_secs(60));
        h.shell.push_exec(Err(ShellError::Connect("refused".to_string())));
        h.sampler.sample_one("w1").await;
    }

    assert!(h.evaluator.actions().list().unwrap().is_empty());
}

#[tokio::test]
async fn probes_feed_policy_evaluation() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.with_balanced_policy();
    h.shell.set_default_exec(ok_output(IDLE_PROBE));

    for _ in 0..6 {
        h.clock.advance(Duration::from_secs(60));
        h.sampler.sample_one("w1").await;
    }

    let (active, _) = h.evaluator.actions().active_for("w1").unwrap().unwrap();
    assert_eq!(active.action, outpost_core::IdleAction::Hibernate);
}

#[tokio::test]
async fn leaving_running_clears_the_ring() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.shell.set_default_exec(ok_output(IDLE_PROBE));
    h.clock.advance(Duration::from_secs(60));
    h.sampler.sample_one("w1").await;
    assert_eq!(h.samples.workspace_count(), 1);

    h.engine.stop("w1").await.unwrap();
    h.engine.sync_with_provider("w1").await.unwrap();
    h.sampler.sample_one("w1").await;
    assert_eq!(h.samples.workspace_count(), 0, "stopped workspaces are not sampled");
}

#[tokio::test]
async fn global_toggle() {
    let h = Harness::new();
    assert!(h.sampler.is_enabled());
    h.sampler.set_enabled(false);
    assert!(!h.sampler.is_enabled());
}

#[test]
fn settings_reload_keeps_worker_count() {
    let h = Harness::new();
    let mut settings = h.sampler.settings();
    settings.interval = Duration::from_secs(30);
    settings.worker_count = 99;
    h.sampler.apply_settings(settings);

    let applied = h.sampler.settings();
    assert_eq!(applied.interval, Duration::from_secs(30));
    assert_eq!(applied.worker_count, 2, "pool resize needs a restart");
}
