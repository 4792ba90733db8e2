//! Signal handling for graceful shutdown

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::service::ServiceState;

/// Register SIGINT and SIGTERM handlers that stop the running loop.
///
/// The watcher thread lives for the rest of the process; the loop itself
/// winds down cooperatively through [`ServiceState::stop`].
pub fn setup_signal_handlers(service_state: Arc<ServiceState>) -> Result<()> {
    let shutdown_flag = Arc::new(AtomicBool::new(false));

    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_flag))
        .context("Failed to register SIGINT handler")?;

    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_flag))
        .context("Failed to register SIGTERM handler")?;

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                info!("Shutdown signal received");
                service_state.stop();
                break;
            }
            thread::sleep(Duration::from_millis(100));
        })
        .context("Failed to spawn the signal watcher thread")?;

    Ok(())
}
