//! Config command - show or edit global settings

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{BackendKind, ConfigManager, ProgressMode, Settings};
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, UiContext};
use clap::ValueEnum;

/// Keys accepted by `kiln config set`
const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "builder.backend",
    "builder.platform",
    "builder.progress",
    "builder.cache_from",
    "builder.cache_to",
    "builder.push",
    "cloud_build.region",
    "cloud_build.project",
    "depot.project",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    settings: &Settings,
) -> KilnResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(settings)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut settings = settings.clone();
            set_value(&mut settings, &key, &value)?;
            manager.save(&settings).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(settings: &Settings) -> KilnResult<()> {
    let toml = toml::to_string_pretty(settings)?;
    println!("{}", toml);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Settings::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

/// Apply a dot-separated key to the settings
fn set_value(settings: &mut Settings, key: &str, value: &str) -> KilnResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => {
            settings.general.log_format = match value {
                "text" | "json" => value.to_string(),
                _ => {
                    return Err(KilnError::User(format!(
                        "Invalid log format: {}. Use text or json",
                        value
                    )))
                }
            }
        }

        ["builder", "backend"] => settings.builder.backend = parse_enum::<BackendKind>(value)?,
        ["builder", "platform"] => settings.builder.platform = value.to_string(),
        ["builder", "progress"] => settings.builder.progress = parse_enum::<ProgressMode>(value)?,
        ["builder", "cache_from"] => settings.builder.cache_from = parse_list(value),
        ["builder", "cache_to"] => settings.builder.cache_to = value.trim().to_string(),
        ["builder", "push"] => settings.builder.push = parse_bool(value)?,

        ["cloud_build", "region"] => settings.cloud_build.region = value.to_string(),
        ["cloud_build", "project"] => settings.cloud_build.project = value.to_string(),

        ["depot", "project"] => settings.depot.project = value.to_string(),

        _ => {
            return Err(KilnError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_enum<T: ValueEnum>(value: &str) -> KilnResult<T> {
    T::from_str(value, true).map_err(|_| {
        let choices: Vec<String> = T::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        KilnError::User(format!(
            "Invalid value: {}. Expected one of: {}",
            value,
            choices.join(", ")
        ))
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> KilnResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(KilnError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_builder_values() {
        let mut settings = Settings::default();
        set_value(&mut settings, "builder.backend", "cloud-build").unwrap();
        set_value(&mut settings, "builder.progress", "plain").unwrap();
        set_value(&mut settings, "builder.push", "yes").unwrap();
        set_value(&mut settings, "builder.cache_from", "a/cache, b/cache,").unwrap();

        assert_eq!(settings.builder.backend, BackendKind::CloudBuild);
        assert_eq!(settings.builder.progress, ProgressMode::Plain);
        assert!(settings.builder.push);
        assert_eq!(settings.builder.cache_from, vec!["a/cache", "b/cache"]);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut settings = Settings::default();
        let err = set_value(&mut settings, "vm.name", "x").unwrap_err();
        assert!(err.to_string().contains("Unknown config key: vm.name"));
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut settings = Settings::default();
        assert!(set_value(&mut settings, "builder.backend", "kaniko").is_err());
        assert!(set_value(&mut settings, "builder.push", "maybe").is_err());
        assert!(set_value(&mut settings, "general.log_format", "xml").is_err());
    }

    #[test]
    fn parse_bool_values() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("no").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[tokio::test]
    async fn set_persists_to_file() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));

        let args = ConfigArgs {
            action: Some(ConfigAction::Set {
                key: "cloud_build.region".to_string(),
                value: "europe-west4".to_string(),
            }),
        };
        execute(args, &manager, &Settings::default()).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.cloud_build.region, "europe-west4");
    }
}
