// SPDX-License-Identifier: Apache-2.0

//! shmcoord monitor binary.
//!
//! Reads line-oriented commands from stdin, drives a per-process
//! coordinator, and emits one JSON event per line on stdout. Diagnostic
//! logging goes to stderr so the event stream stays machine-readable.

use clap::Parser;
use shmcoord_core::{Coordinator, CoordinatorConfig, IpcKey};

mod dispatcher;
mod sink;

use sink::JsonEventSink;

/// shmcoord - cross-process shared memory monitor
#[derive(Parser)]
#[command(name = "shmcoord")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SysV key of the shared memory segment (decimal or 0x-hex)
    #[arg(long, default_value = "0x1234")]
    segment_key: IpcKey,

    /// SysV key of the gate semaphore (decimal or 0x-hex)
    #[arg(long, default_value = "0x5678")]
    gate_key: IpcKey,

    /// Actor label stamped on every emitted event
    #[arg(short, long, default_value = "monitor")]
    process_label: String,

    /// Enable verbose logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = CoordinatorConfig {
        segment_key: cli.segment_key,
        gate_key: cli.gate_key,
    };
    let sink = JsonEventSink::new(cli.process_label, std::process::id());
    let mut coordinator = Coordinator::new(config, sink);

    let stdin = std::io::stdin();
    dispatcher::run(&mut coordinator, stdin.lock())
}
