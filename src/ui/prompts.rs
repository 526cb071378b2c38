//! Interactive prompts with non-interactive fallback

use super::context::UiContext;
use crate::error::{KilnError, KilnResult};

/// Ask a yes/no question. Returns `default` when not attached to a terminal.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> KilnResult<bool> {
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on terminal input
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| KilnError::Internal(format!("Prompt task failed: {}", e)))?;

    result.map_err(|e| KilnError::User(format!("Prompt failed: {}", e)))
}
