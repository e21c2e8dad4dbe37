//! Transcript export: the only durable artifact a debate produces.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::info;

use crate::core::transcript::Transcript;

const V1_SCHEMA: &str = include_str!("../../schemas/transcript/v1.schema.json");

/// Validate a transcript document against the bundled v1 schema
/// (Draft 2020-12).
pub fn validate_transcript_value(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(V1_SCHEMA).context("parse bundled schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile transcript schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Serialize the transcript to pretty-printed JSON with a trailing newline,
/// refusing to write a document that does not match the schema.
pub fn export_transcript(path: &Path, transcript: &Transcript) -> Result<()> {
    let value = serde_json::to_value(transcript).context("serialize transcript")?;
    validate_transcript_value(&value)?;

    let mut payload = serde_json::to_string_pretty(&value).context("render transcript json")?;
    payload.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "transcript exported");
    Ok(())
}
