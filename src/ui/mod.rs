//! Terminal output for kiln commands
//!
//! Uses `cliclack` for step logs and prompts and `indicatif` for the build
//! progress bar, falling back to plain lines in CI or when output is piped.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::BuildProgress;
pub use prompts::confirm;
