pub mod json;
pub mod markdown;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ChatSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

pub fn render(session: &ChatSession, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Markdown => Ok(markdown::to_markdown(session)),
        ExportFormat::Json => json::to_json(session),
    }
}

/// `chat.mhtml` becomes `chat.md` or `chat.json` next to the input.
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    input.with_extension(format.extension())
}

pub fn write(session: &ChatSession, format: ExportFormat, output: &Path) -> Result<()> {
    let rendered = render(session, format)?;
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(output, rendered).with_context(|| format!("Failed to write {}", output.display()))
}
