//! CLI command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod generate;
pub mod init;
pub mod status;

pub use build::execute as build;
pub use completions::execute as completions;
pub use config::execute as config;
pub use generate::execute as generate;
pub use init::execute as init;
pub use status::execute as status;

use crate::config::Project;
use crate::error::{KilnError, KilnResult};
use std::path::Path;

/// Load the project from `--dir` or by searching upwards from the cwd
pub(crate) async fn load_project(dir: Option<&Path>) -> KilnResult<Project> {
    let start = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| KilnError::io("getting current directory", e))?,
    };
    Project::discover(&start).await
}
