//! Inference gateway for the local Ollama server.
//!
//! The [`Gateway`] trait decouples the debate orchestration from the actual
//! inference backend. Tests use scripted gateways that return predetermined
//! completions without touching the network. The production implementation
//! issues one blocking `curl` call per generation against `/api/generate`
//! and normalizes the response; retries are the repair protocol's concern,
//! one layer up.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::transcript::GenMetrics;
use crate::io::process::run_command_with_timeout;

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenRequest {
    /// Backend model identifier (e.g. `llama3:8b`).
    pub model: String,
    /// Full prompt text.
    pub prompt: String,
    /// Sampling temperature, within `[0, 2]`.
    pub temperature: f64,
    /// Maximum output tokens.
    pub num_predict: u32,
    /// Maximum time to wait for the call to complete.
    pub timeout: Duration,
}

/// A successful generation: trimmed completion text plus metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub metrics: GenMetrics,
}

/// Abstraction over text-generation backends.
pub trait Gateway {
    /// Issue one synchronous generation call.
    fn generate(&self, request: &GenRequest) -> Result<Generation>;
}

/// Gateway that drives the Ollama REST API through a `curl` child process.
pub struct OllamaGateway {
    base_url: String,
    output_limit_bytes: usize,
}

impl OllamaGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            output_limit_bytes: 1_000_000,
        }
    }

    /// Gateway against the default local server.
    pub fn local() -> Self {
        Self::new("http://localhost:11434")
    }
}

impl Gateway for OllamaGateway {
    #[instrument(skip_all, fields(model = %request.model, num_predict = request.num_predict, timeout_secs = request.timeout.as_secs()))]
    fn generate(&self, request: &GenRequest) -> Result<Generation> {
        info!("starting generation call");

        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.num_predict,
            },
        });
        let body = serde_json::to_vec(&payload).context("serialize generate payload")?;

        let mut cmd = Command::new("curl");
        cmd.arg("-s")
            .arg(format!("{}/api/generate", self.base_url))
            .arg("-d")
            .arg("@-");

        let output = run_command_with_timeout(
            cmd,
            Some(body.as_slice()),
            request.timeout,
            self.output_limit_bytes,
        )
        .context("run generate call")?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "generation timed out");
            bail!("timeout: model call exceeded {}s", request.timeout.as_secs());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "transport call failed");
            bail!(
                "backend connection failed (exit {:?}): {}",
                output.status.code(),
                stderr.trim()
            );
        }

        let generation = parse_backend_response(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            tokens_out = generation.metrics.tokens_out,
            tokens_per_s = generation.metrics.tokens_per_s,
            "generation complete"
        );
        Ok(generation)
    }
}

/// Classify a backend response body.
///
/// Three distinct failure shapes are kept apart so callers can tell them from
/// each other: an explicit `error` payload, a JSON body lacking both
/// `response` and `error` keys, and a body that is not JSON at all.
pub fn parse_backend_response(body: &str) -> Result<Generation> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| anyhow!("invalid JSON from backend: {}", truncate(body, 200)))?;

    if let Some(text) = value.get("response").and_then(Value::as_str) {
        return Ok(Generation {
            text: text.trim().to_string(),
            metrics: metrics_from_response(&value),
        });
    }
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        bail!("backend error: {err}");
    }
    bail!("unexpected backend response: missing both response and error fields");
}

/// Extract performance metrics from a successful response. Durations arrive
/// in nanoseconds and are converted to seconds with 2-decimal rounding.
fn metrics_from_response(value: &Value) -> GenMetrics {
    let ns = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0) as f64 / 1e9;
    let count = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0);

    let total_s = ns("total_duration");
    let load_s = ns("load_duration");
    let gen_s = ns("eval_duration");
    let tokens_in = count("prompt_eval_count");
    let tokens_out = count("eval_count");
    let tokens_per_s = if gen_s > 0.0 {
        tokens_out as f64 / gen_s
    } else {
        0.0
    };

    GenMetrics {
        time_total_s: round2(total_s),
        time_load_s: round2(load_s),
        time_gen_s: round2(gen_s),
        tokens_in,
        tokens_out,
        tokens_per_s: round2(tokens_per_s),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn truncate(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
