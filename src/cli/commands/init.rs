//! Init command - create a kiln.toml template

use crate::cli::args::InitArgs;
use crate::config::PROJECT_FILE;
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Template for a CPU model server
const CPU_TEMPLATE: &str = r#"# Kiln project configuration
# Run `kiln generate` to preview the Dockerfile, `kiln build` to build it.

[build]
python_version = "3.10"
# system_packages = ["ffmpeg"]
# python_packages = ["torch==2.1.0", "transformers"]
# python_requirements = "requirements.txt"
# run = ["python -m nltk.downloader punkt"]  # one command per entry
# network_isolation = true
# server_module = "model_server.http"

[image]
# name = "ghcr.io/acme/my-model"

# [image.labels]
# team = "ml"
"#;

/// Template for a CUDA model server
const GPU_TEMPLATE: &str = r#"# Kiln project configuration
# Run `kiln generate` to preview the Dockerfile, `kiln build` to build it.

[build]
gpu = true
python_version = "3.10"
cuda = "12.1"  # 11.7, 11.8, 12.1, 12.4
# system_packages = ["ffmpeg"]
# python_packages = ["torch==2.1.0", "transformers"]
# python_requirements = "requirements.txt"
# run = ["python -m nltk.downloader punkt"]  # one command per entry
# network_isolation = true
# server_module = "model_server.http"

[image]
# name = "ghcr.io/acme/my-model"

# [image.labels]
# team = "ml"
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> KilnResult<()> {
    init(&UiContext::detect(), args).await
}

async fn init(ctx: &UiContext, args: InitArgs) -> KilnResult<()> {
    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => {
            std::env::current_dir().map_err(|e| KilnError::io("getting current directory", e))?
        }
    };

    let config_path = target_dir.join(PROJECT_FILE);

    if config_path.exists() && !args.force {
        let overwrite = ui::confirm(
            ctx,
            &format!("{} already exists. Overwrite?", config_path.display()),
            false,
        )
        .await?;
        if !overwrite {
            return Err(KilnError::User(format!(
                "{} already exists. Use --force to overwrite.",
                config_path.display()
            )));
        }
    }

    ensure_dir(&target_dir).await?;

    let template = if args.gpu { GPU_TEMPLATE } else { CPU_TEMPLATE };
    fs::write(&config_path, template)
        .await
        .map_err(|e| KilnError::io(format!("writing {}", config_path.display()), e))?;

    ui::step_ok_detail(
        ctx,
        "Created project config",
        &config_path.display().to_string(),
    );

    Ok(())
}

async fn ensure_dir(dir: &Path) -> KilnResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| KilnError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}
