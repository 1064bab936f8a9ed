//! CLI command handlers, one file per command.

mod completions;
mod status;
mod submit;
mod watch;

pub use completions::run_completions;
pub use status::run_status;
pub use submit::run_submit;
pub use watch::run_watch;
