//! CLI output formatting

use console::Emoji;

use crate::core::PipelineStatus;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Pending => style("PENDING").dim().to_string(),
        PipelineStatus::Running => style("RUNNING").yellow().to_string(),
        PipelineStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        PipelineStatus::Failed(code) => style(format!("FAILED ({})", code)).red().to_string(),
        PipelineStatus::Errored => style("ERRORED").red().to_string(),
    }
}
