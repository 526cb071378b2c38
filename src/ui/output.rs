//! Status lines for kiln commands
//!
//! Everything here writes to stderr so stdout stays clean for
//! `kiln generate` output and the built image reference.

use super::context::UiContext;
use console::{style, StyledObject};

#[derive(Clone, Copy)]
enum Level {
    Ok,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Level::Ok => style("[OK]").green(),
            Level::Warn => style("[WARN]").yellow(),
            Level::Error => style("[ERROR]").red(),
        }
    }
}

fn plain(level: Level, indent: &str, message: &str) {
    eprintln!("{}{} {}", indent, level.tag(), message);
}

/// Banner at the start of a command
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).yellow().bold()).ok();
    } else {
        eprintln!("{}", style(title).yellow().bold());
    }
}

/// Closing line after success
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        plain(Level::Ok, "", message);
    }
}

/// Closing line after failure. The error itself is printed by `main`.
pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).red().bold()).ok();
    } else {
        plain(Level::Error, "", message);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        plain(Level::Ok, "  ", message);
    }
}

/// Completed step with a dimmed detail such as a path or image reference
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    let line = format!("{} ({})", message, style(detail).dim());
    if ctx.use_fancy_output() {
        cliclack::log::success(line).ok();
    } else {
        plain(Level::Ok, "  ", &line);
    }
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    let line = format!("{} - {}", message, style(hint).dim());
    if ctx.use_fancy_output() {
        cliclack::log::warning(line).ok();
    } else {
        plain(Level::Warn, "  ", &line);
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        eprintln!("│  {}: {}", style(key).dim(), value);
    } else {
        eprintln!("  {}: {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_non_interactive() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "kiln build");
        step_ok_detail(&ctx, "Generated Dockerfile", "abc123");
        step_warn_hint(&ctx, "depot not found", "Run: kiln status");
        key_value(&ctx, "Backend", "buildx");
        outro_error(&ctx, "Build failed");
        outro_success(&ctx, "Done");
    }
}
