//! Build command - generate the Dockerfile and build the image

use crate::builder::create_backend;
use crate::cli::args::BuildArgs;
use crate::cli::commands::load_project;
use crate::config::{ProgressMode, Settings};
use crate::error::{KilnError, KilnResult};
use crate::image::{self, BuildOptions};
use crate::ui::{self, BuildProgress, UiContext};
use std::path::Path;
use tokio::fs;

/// Execute the build command
pub async fn execute(
    args: BuildArgs,
    settings: &Settings,
    dir: Option<&Path>,
    verbose: u8,
) -> KilnResult<()> {
    let project = load_project(dir).await?;

    let dockerfile = match args.dockerfile {
        Some(ref path) => Some(read_dockerfile(path).await?),
        None => None,
    };
    let options = build_options(args, settings);

    let ctx = UiContext::detect()
        .with_raw_build_output(options.progress == ProgressMode::Plain || verbose > 0);

    ui::intro(&ctx, "kiln build");
    ui::key_value(&ctx, "Project", &project.dir.display().to_string());
    ui::key_value(&ctx, "Backend", options.backend.as_str());
    ui::key_value(&ctx, "Platform", &options.platform);

    let backend = create_backend(options.backend, settings);
    let label = options
        .image
        .clone()
        .or_else(|| project.config.image.name.clone())
        .unwrap_or_else(|| project.dir.display().to_string());
    let progress = BuildProgress::new(&ctx, &label);
    let sink = |line: String| progress.on_line(line);

    let result = match dockerfile {
        Some(dockerfile) => {
            image::build_from_dockerfile(
                &project.config,
                &project.dir,
                dockerfile,
                &options,
                backend.as_ref(),
                &sink,
            )
            .await
        }
        None => {
            image::build(
                &project.config,
                &project.dir,
                &options,
                backend.as_ref(),
                &sink,
            )
            .await
        }
    };
    progress.finish();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            ui::outro_error(&ctx, "Build failed");
            return Err(e);
        }
    };

    ui::step_ok_detail(&ctx, "Built image", &outcome.image);
    for tag in &outcome.extra_tags {
        ui::step_ok_detail(&ctx, "Tagged", tag);
    }
    ui::key_value(&ctx, "Dockerfile sha256", &outcome.fingerprint);
    if outcome.pushed {
        ui::step_ok(&ctx, "Pushed to registry");
    }
    ui::outro_success(&ctx, "Done");

    println!("{}", outcome.image);
    Ok(())
}

async fn read_dockerfile(path: &Path) -> KilnResult<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| KilnError::io(format!("reading Dockerfile {}", path.display()), e))
}

/// Global builder settings with command-line overrides applied
fn build_options(args: BuildArgs, settings: &Settings) -> BuildOptions {
    let mut options = BuildOptions::from_settings(settings);

    options.image = args.tag;
    options.extra_tags = args.tag_extra;
    if let Some(backend) = args.backend {
        options.backend = backend;
    }
    if let Some(platform) = args.platform {
        options.platform = platform;
    }
    if !args.cache_from.is_empty() {
        options.cache_from = args.cache_from;
    }
    if args.cache_to.is_some() {
        options.cache_to = args.cache_to;
    }
    if let Some(progress) = args.progress {
        options.progress = progress;
    }
    options.push |= args.push;

    options
}
