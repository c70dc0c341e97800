//! SIGINT / SIGTERM handling.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::info;

use super::Server;

/// Stop `server` on the first SIGINT or SIGTERM.
///
/// The watcher runs on its own OS thread.
pub fn install(server: Server) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("switchyard-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Shutdown signal received");
                server.stop();
            }
        })
}
