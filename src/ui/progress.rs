//! Build progress with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for image builds.
///
/// Parses BuildKit `[N/M] INSTRUCTION` step lines into an indicatif bar.
/// In raw mode every line is passed through to stderr unchanged.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
}

impl BuildProgress {
    /// Create a build progress indicator for `label` (usually the image)
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.raw_build_output() {
            eprintln!("Building {}...", label);
            None
        } else {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "  {spinner:.yellow} Building {prefix}  {bar:20.yellow/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}",
            ) {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        };
        Self { bar }
    }

    /// Handle one line of build tool output
    pub fn on_line(&self, line: String) {
        let Some(ref bar) = self.bar else {
            eprintln!("{}", line);
            return;
        };

        if let Some((n, total, instruction)) = parse_step_line(&line) {
            bar.set_length(total);
            bar.set_position(n);
            bar.set_message(truncate(instruction, 60));
            return;
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() && !is_build_noise(trimmed) {
            bar.set_message(truncate(trimmed, 60));
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// BuildKit bookkeeping lines that aren't useful as a status message
fn is_build_noise(line: &str) -> bool {
    let body = match line.strip_prefix('#') {
        Some(rest) => rest
            .split_once(' ')
            .map(|(_, body)| body)
            .unwrap_or(""),
        None => line,
    };
    body.is_empty()
        || body.starts_with("DONE")
        || body.starts_with("CACHED")
        || body.starts_with("sha256:")
        || body.starts_with("writing image")
        || body.starts_with("naming to")
}

/// Parse a BuildKit step line like `#8 [3/12] RUN pip install ...` or
/// `#8 [builder 3/12] RUN ...`. Cloud Build adds a `Step #0:` prefix,
/// which is skipped along with everything before the bracket.
fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    let counter = line[open + 1..close].rsplit(' ').next()?;
    let (n, total) = counter.split_once('/')?;
    let n: u64 = n.parse().ok()?;
    let total: u64 = total.parse().ok()?;
    let instruction = line[close + 1..].trim();
    Some((n, total, instruction))
}
