//! Post-debate critic audits.
//!
//! Three independent passes over a finalized transcript: a free-text verdict
//! judged from the two final statements alone, a structured hallucination
//! scan over the whole transcript, and the drift tally (arithmetic, computed
//! by the orchestrator and echoed here). Each generative pass records its
//! own failure instead of throwing, so a broken critic model still yields a
//! displayable report.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::core::transcript::{
    CriticReport, DriftAudit, GenMetrics, HallucinationAudit, Transcript,
};
use crate::io::config::{Budgets, CriticConfig};
use crate::io::gateway::{GenRequest, Gateway};
use crate::io::prompt::PromptEngine;

static MARKUP_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("<[^>]+>").expect("markup pattern is valid"));

/// Shape the hallucination pass demands from the critic model.
#[derive(Debug, Deserialize)]
struct HallucinationScan {
    potential_fabrications: Vec<String>,
}

/// Run the full critic suite over a finalized transcript.
///
/// `drift` is pre-computed by the orchestrator; this pipeline never
/// re-derives it.
#[instrument(skip_all, fields(model = %critic.model))]
pub fn run_critic_audits<G: Gateway>(
    gateway: &G,
    engine: &PromptEngine,
    critic: &CriticConfig,
    budgets: &Budgets,
    transcript: &Transcript,
    drift: DriftAudit,
) -> Result<CriticReport> {
    info!("running critic: verdict");
    let (verdict, verdict_metrics) = verdict_pass(gateway, engine, critic, budgets, transcript)?;

    info!("running critic: hallucination audit");
    let hallucination_audit = hallucination_pass(gateway, engine, critic, budgets, transcript)?;

    Ok(CriticReport {
        verdict,
        verdict_metrics,
        drift_audit: drift,
        hallucination_audit,
    })
}

/// Free-text judgment over the two final statements only.
fn verdict_pass<G: Gateway>(
    gateway: &G,
    engine: &PromptEngine,
    critic: &CriticConfig,
    budgets: &Budgets,
    transcript: &Transcript,
) -> Result<(String, GenMetrics)> {
    let (final_pro, final_con) = match &transcript.finals {
        Some(finals) => (
            finals.pro.output.final_statement.as_str(),
            finals.con.output.final_statement.as_str(),
        ),
        None => ("No argument", "No argument"),
    };
    let prompt = engine.render_verdict(
        &transcript.topic,
        &transcript.debate_config.pro.model,
        &transcript.debate_config.con.model,
        final_pro,
        final_con,
    )?;

    let result = gateway.generate(&GenRequest {
        model: critic.model.clone(),
        prompt,
        temperature: critic.temperature,
        num_predict: budgets.finalize.num_predict,
        timeout: budgets.finalize.timeout(),
    });

    match result {
        Ok(generation) => {
            // The critic is told not to use markup; scrub any it adds anyway.
            let verdict = MARKUP_RE
                .replace_all(&generation.text, "")
                .trim()
                .to_string();
            Ok((verdict, generation.metrics))
        }
        Err(err) => {
            warn!(err = %err, "verdict pass failed");
            Ok((
                format!("critic failed to render a verdict: {err}"),
                GenMetrics::default(),
            ))
        }
    }
}

/// Structured fabrication scan over the full transcript.
fn hallucination_pass<G: Gateway>(
    gateway: &G,
    engine: &PromptEngine,
    critic: &CriticConfig,
    budgets: &Budgets,
    transcript: &Transcript,
) -> Result<HallucinationAudit> {
    let transcript_json =
        serde_json::to_string_pretty(transcript).context("serialize transcript for critic")?;
    let prompt = engine.render_hallucination(&transcript_json)?;

    let result = gateway.generate(&GenRequest {
        model: critic.model.clone(),
        prompt,
        temperature: critic.temperature,
        num_predict: budgets.repair.num_predict,
        timeout: budgets.repair.timeout(),
    });

    let raw = match result {
        Ok(generation) => generation.text,
        Err(err) => {
            warn!(err = %err, "hallucination pass failed to run");
            return Ok(HallucinationAudit::Failure {
                error: format!("failed to run critic model: {err}"),
                raw: String::new(),
            });
        }
    };

    let cleaned = strip_code_fences(&raw);
    match serde_json::from_str::<HallucinationScan>(&cleaned) {
        Ok(scan) => Ok(HallucinationAudit::Flags {
            potential_fabrications: scan.potential_fabrications,
        }),
        Err(err) => {
            warn!(err = %err, "critic returned non-JSON output");
            Ok(HallucinationAudit::Failure {
                error: "critic returned non-JSON output".to_string(),
                raw,
            })
        }
    }
}

/// Strip surrounding markdown code fences, if present.
fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = text.split_once('\n').map_or("", |(_, rest)| rest);
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim().to_string()
}
