pub mod calibrate;
pub mod config;
pub mod grid;
pub mod info;
pub mod realtime;
pub mod simulate;
pub mod train;

use gazefit_session::SessionControl;

/// Route Ctrl+C to `control.abort()` so the session flushes and returns.
/// A second Ctrl+C exits immediately.
pub fn abort_on_ctrl_c(control: &SessionControl) -> anyhow::Result<()> {
    ctrlc::set_handler(interrupt_handler(control.clone()))
        .map_err(|e| anyhow::anyhow!("Failed to install Ctrl+C handler: {e}"))
}

fn interrupt_handler(control: SessionControl) -> impl FnMut() + Send + 'static {
    move || {
        if control.is_aborted() {
            std::process::exit(130);
        }
        eprintln!("\nStopping, saving pending samples...");
        control.abort();
    }
}
