// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote activity probe.
//!
//! One short POSIX script sampled over SSH; output is `key=value` lines
//! parsed into an [`IdleSample`]. CPU is measured across a one-second
//! `/proc/stat` delta, sessions come from `who`, network counters from
//! `/proc/net/dev`.

use outpost_core::{IdleSample, ProbeOutcome};

/// Probe script executed on the workstation.
pub const PROBE_SCRIPT: &str = r#"
s1=$(head -1 /proc/stat); sleep 1; s2=$(head -1 /proc/stat)
cpu=$(echo "$s1 $s2" | awk '{b1=$2+$3+$4+$7+$8; t1=b1+$5+$6; b2=$13+$14+$15+$18+$19; t2=b2+$16+$17; if (t2>t1) printf "%.1f", (b2-b1)*100/(t2-t1); else print "0.0"}')
mem=$(awk '/MemTotal/{t=$2} /MemAvailable/{a=$2} END{if (t>0) printf "%.1f", (t-a)*100/t; else print "0.0"}' /proc/meminfo)
sessions=$(who | wc -l)
net=$(awk -F'[: ]+' 'NR>2 {rx+=$3; tx+=$11} END{printf "%d %d", rx, tx}' /proc/net/dev)
echo "cpu=$cpu"
echo "mem=$mem"
echo "sessions=$sessions"
echo "net_in=${net% *}"
echo "net_out=${net#* }"
"#;

/// Parse probe output into a sample. Any missing or malformed field makes
/// the whole sample a `ParseError` — partial readings never feed policy.
pub fn parse_output(workspace: &str, taken_at_ms: u64, stdout: &str) -> IdleSample {
    let mut cpu = None;
    let mut mem = None;
    let mut sessions = None;
    let mut net_in = None;
    let mut net_out = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else { continue };
        match key {
            "cpu" => cpu = value.parse::<f32>().ok(),
            "mem" => mem = value.parse::<f32>().ok(),
            "sessions" => sessions = value.parse::<u32>().ok(),
            "net_in" => net_in = value.parse::<u64>().ok(),
            "net_out" => net_out = value.parse::<u64>().ok(),
            _ => {}
        }
    }

    match (cpu, mem, sessions, net_in, net_out) {
        (Some(cpu_pct), Some(mem_pct), Some(active_sessions), Some(net_in_bps), Some(net_out_bps)) => {
            IdleSample {
                workspace: workspace.to_string(),
                taken_at_ms,
                cpu_pct,
                mem_pct,
                active_sessions,
                net_in_bps,
                net_out_bps,
                outcome: ProbeOutcome::Ok,
            }
        }
        _ => IdleSample::failed(workspace, taken_at_ms, ProbeOutcome::ParseError),
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
