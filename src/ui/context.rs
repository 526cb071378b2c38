//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// Common CI environment indicators
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
    "CLOUD_BUILD",
];

/// Decides between fancy terminal output and plain lines
#[derive(Debug, Clone)]
pub struct UiContext {
    /// stdout and stdin are terminals and no CI marker is set
    interactive: bool,
    /// Print raw build output instead of a progress bar
    raw_build_output: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::detect_interactive(),
            raw_build_output: false,
        }
    }

    /// Create a non-interactive context (for testing or explicit CI mode)
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            raw_build_output: false,
        }
    }

    /// Stream build tool output verbatim
    pub fn with_raw_build_output(mut self, raw: bool) -> Self {
        self.raw_build_output = raw;
        self
    }

    /// Check if we're in an interactive terminal
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Check if we should use fancy output (spinners, colors)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    /// Whether build output should be passed through line by line
    pub fn raw_build_output(&self) -> bool {
        self.raw_build_output || !self.interactive
    }

    fn detect_interactive() -> bool {
        if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
            return false;
        }

        !CI_VARS.iter().any(|var| std::env::var_os(var).is_some())
    }
}
