//! Generate command - print or write the Dockerfile

use crate::cli::args::GenerateArgs;
use crate::cli::commands::load_project;
use crate::error::{KilnError, KilnResult};
use crate::image;
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Execute the generate command
pub async fn execute(args: GenerateArgs, dir: Option<&Path>) -> KilnResult<()> {
    let project = load_project(dir).await?;
    let generated = image::generate(&project.config, &project.dir).await?;

    if args.fingerprint {
        println!("{}", generated.fingerprint);
        return Ok(());
    }

    match args.output {
        Some(path) => {
            fs::write(&path, &generated.dockerfile)
                .await
                .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))?;
            let ctx = UiContext::detect();
            ui::step_ok_detail(&ctx, "Wrote Dockerfile", &path.display().to_string());
        }
        None => println!("{}", generated.dockerfile),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_dockerfile_to_output() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("kiln.toml"), "[build]\nrun = [\"echo hi\"]").unwrap();
        let out = temp.path().join("Dockerfile");

        let args = GenerateArgs {
            output: Some(out.clone()),
            fingerprint: false,
        };
        execute(args, Some(temp.path())).await.unwrap();

        let content = std::fs::read_to_string(out).unwrap();
        assert!(content.contains("FROM python:3.10"));
        assert!(content.contains("RUN echo hi"));
    }

    #[tokio::test]
    async fn missing_project_config() {
        let temp = TempDir::new().unwrap();
        let err = execute(GenerateArgs::default(), Some(temp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, KilnError::ProjectConfigNotFound(_)));
    }
}
