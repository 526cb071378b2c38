//! Status command - check which build tools are available

use crate::builder::check_tool;
use crate::config::{BackendKind, Settings};
use crate::error::KilnResult;
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(settings: &Settings) -> KilnResult<()> {
    println!("{}", style("Kiln Build Tools").bold().yellow());
    println!();

    println!("{}", style("Local:").bold());
    let docker = check_cli("docker", &["--version"], "https://docs.docker.com/get-docker/").await;
    let buildx = if docker {
        check_cli(
            "docker buildx",
            &["buildx", "version"],
            "https://github.com/docker/buildx#installing",
        )
        .await
    } else {
        println!("  {} docker buildx: skipped (docker missing)", WARN);
        false
    };

    println!();
    println!("{}", style("Remote:").bold());
    let gcloud = check_cli(
        "gcloud",
        &["--version"],
        "https://cloud.google.com/sdk/docs/install",
    )
    .await;
    let depot = check_cli(
        "depot",
        &["--version"],
        "https://depot.dev/docs/cli/installation",
    )
    .await;

    let backend = settings.builder.backend;
    let ready = match backend {
        BackendKind::Buildx => docker && buildx,
        BackendKind::CloudBuild => gcloud,
        BackendKind::Depot => depot,
    };

    println!();
    if ready {
        println!(
            "{}",
            style(format!("Default backend '{}' is ready", backend.as_str()))
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            style(format!(
                "Default backend '{}' is not available - see above for details",
                backend.as_str()
            ))
            .yellow()
            .bold()
        );
    }

    Ok(())
}

async fn check_cli(name: &str, args: &[&str], install: &str) -> bool {
    let program = name.split_whitespace().next().unwrap_or(name);
    if check_tool(program, args).await {
        println!("  {} {}: installed", CHECK, name);
        true
    } else {
        println!(
            "  {} {}: not installed ({})",
            CROSS,
            name,
            style(install).dim()
        );
        false
    }
}
