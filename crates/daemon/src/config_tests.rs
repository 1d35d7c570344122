// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;
use yare::parameterized;

fn flags(args: &[&str]) -> Flags {
    let mut argv = vec!["outpostd"];
    argv.extend_from_slice(args);
    Flags::parse_from(argv)
}

#[test]
fn defaults() {
    let config = Config::from_flags(flags(&["--state-dir", "/tmp/outpost-test"])).unwrap();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.sampler.interval, Duration::from_secs(60));
    assert_eq!(config.sampler.worker_count, 8);
    assert!(!config.dry_run);
    assert_eq!(config.default_region, "us-east-1");
}

#[parameterized(
    sampling_interval = { "--sampling-interval" },
    workers = { "--workers" },
)]
fn zero_values_are_rejected(flag: &str) {
    let result = Config::from_flags(flags(&["--state-dir", "/tmp/outpost-test", flag, "0"]));
    match flag {
        "--sampling-interval" => {
            assert!(matches!(result, Err(ConfigError::ZeroSamplingInterval)))
        }
        _ => assert!(matches!(result, Err(ConfigError::ZeroWorkerCount))),
    }
}

#[test]
fn paths_hang_off_the_state_dir() {
    let config = Config::from_flags(flags(&["--state-dir", "/srv/outpost"])).unwrap();
    assert_eq!(config.store_dir(), PathBuf::from("/srv/outpost/store"));
    assert_eq!(config.lock_path(), PathBuf::from("/srv/outpost/daemon.pid"));
    assert_eq!(config.log_dir(), PathBuf::from("/srv/outpost/logs"));
}

#[test]
fn flag_overrides() {
    let config = Config::from_flags(flags(&[
        "--state-dir",
        "/tmp/outpost-test",
        "--port",
        "9000",
        "--dry-run",
        "--sampling-interval",
        "15",
    ]))
    .unwrap();
    assert_eq!(config.port, 9000);
    assert!(config.dry_run);
    assert_eq!(config.sampler.interval, Duration::from_secs(15));
}
