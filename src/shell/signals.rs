// src/shell/signals.rs

//! Interrupt and terminate notices for the interactive shell
//!
//! A background thread drives a single-threaded runtime that listens for
//! SIGINT and SIGTERM. Neither notice rolls back a package operation in
//! progress.

use crate::error::Result;
use std::io::{self, Write};
use std::thread;
use tokio::runtime::Builder;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::debug;

const INTERRUPT_NOTICE: &str = "\nUse 'exit' to quit\n";
const TERMINATE_NOTICE: &str = "\nShell terminated\n";

/// Install the SIGINT and SIGTERM listeners. Both are registered before this
/// returns.
pub fn install() -> Result<()> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let (interrupt, terminate) = {
        let _guard = runtime.enter();
        (signal(SignalKind::interrupt())?, signal(SignalKind::terminate())?)
    };

    thread::Builder::new()
        .name("mashfs-signals".to_string())
        .spawn(move || runtime.block_on(relay(interrupt, terminate)))?;
    Ok(())
}

async fn relay(mut interrupt: Signal, mut terminate: Signal) {
    loop {
        tokio::select! {
            received = interrupt.recv() => {
                if received.is_none() {
                    break;
                }
                debug!("SIGINT received");
                notice(INTERRUPT_NOTICE);
            }
            _ = terminate.recv() => {
                debug!("SIGTERM received");
                notice(TERMINATE_NOTICE);
                std::process::exit(0);
            }
        }
    }
}

fn notice(message: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(message.as_bytes());
    let _ = stdout.flush();
}
