pub mod event_loop;
pub mod shutdown;

pub use event_loop::{build_monitor, run, run_once};
pub use shutdown::{graceful_shutdown, spawn_signal_handler};
