//! Format enforcement around a single generation call.
//!
//! A missing required tag does not discard an otherwise-good generation:
//! each missing tag gets one short, targeted follow-up call asking for just
//! that tag, and the result is merged back into the primary output. A second
//! failure degrades to an advisory note instead of a hard error.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::parse::extract_tag;
use crate::core::side::Side;
use crate::core::transcript::GenMetrics;
use crate::io::config::CallBudget;
use crate::io::gateway::{GenRequest, Gateway};
use crate::io::prompt::PromptEngine;

/// Required-tag set, selected by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredTags {
    /// Baseline/exchange turns.
    Turn,
    /// Finalize turns.
    Final,
}

impl RequiredTags {
    fn tags(self) -> &'static [&'static str] {
        match self {
            RequiredTags::Turn => &["REASONING", "SIDE_CONFIRM"],
            RequiredTags::Final => &["FINAL", "SIDE"],
        }
    }
}

fn repair_line_budget(tag: &str) -> usize {
    if tag == "FINAL" { 7 } else { 5 }
}

/// Everything a repaired call needs besides the prompt itself.
#[derive(Debug, Clone)]
pub struct RepairCall<'a> {
    pub model: &'a str,
    pub temperature: f64,
    pub side: Side,
    pub topic: &'a str,
    pub required: RequiredTags,
    /// Budget for the primary generation.
    pub budget: CallBudget,
    /// Short, fixed budget for each repair generation.
    pub repair_budget: CallBudget,
}

/// Outcome of a generation run through the repair protocol.
///
/// `advisory` is set when a repair attempt itself failed: the primary output
/// is still returned, flagged rather than discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedGeneration {
    pub raw: String,
    pub metrics: GenMetrics,
    pub advisory: Option<String>,
}

/// Run one generation and enforce the phase's required tags.
///
/// Transport failures of the primary call propagate untouched; no repair is
/// attempted for them. Tag presence is always checked against the *primary*
/// output, so one repair cannot satisfy another tag's check.
#[instrument(skip_all, fields(model = call.model, side = %call.side, required = ?call.required))]
pub fn generate_with_repair<G: Gateway>(
    gateway: &G,
    engine: &PromptEngine,
    prompt: &str,
    call: &RepairCall<'_>,
) -> Result<RepairedGeneration> {
    let primary = gateway.generate(&GenRequest {
        model: call.model.to_string(),
        prompt: prompt.to_string(),
        temperature: call.temperature,
        num_predict: call.budget.num_predict,
        timeout: call.budget.timeout(),
    })?;

    let original = primary.text;
    let mut raw = original.clone();
    let mut metrics = primary.metrics;

    for tag in call.required.tags() {
        if !extract_tag(&original, tag).is_empty() {
            continue;
        }
        warn!(tag, "required tag missing, attempting repair");

        let repair_prompt =
            engine.render_repair(tag, call.topic, call.side, repair_line_budget(tag))?;
        let repair = gateway.generate(&GenRequest {
            model: call.model.to_string(),
            prompt: repair_prompt,
            temperature: call.temperature,
            num_predict: call.repair_budget.num_predict,
            timeout: call.repair_budget.timeout(),
        });

        match repair {
            Ok(repaired) => {
                info!(tag, "repair successful");
                raw.push_str("\n\n\n");
                raw.push_str(&repaired.text);
                // Keep the repair call's metrics, but carry the accumulated
                // load time forward so it is not lost.
                let mut replaced = repaired.metrics;
                replaced.time_load_s += metrics.time_load_s;
                metrics = replaced;
            }
            Err(err) => {
                warn!(tag, err = %err, "repair failed, keeping primary output");
                return Ok(RepairedGeneration {
                    raw,
                    metrics,
                    advisory: Some(format!("primary output ok, but repair for <{tag}> failed")),
                });
            }
        }
    }

    Ok(RepairedGeneration {
        raw,
        metrics,
        advisory: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::parse_turn_output;
    use crate::test_support::{ScriptedGateway, ScriptedResult};

    fn call(required: RequiredTags) -> RepairCall<'static> {
        RepairCall {
            model: "llama3:8b",
            temperature: 0.4,
            side: Side::Pro,
            topic: "AI will create more jobs than it destroys",
            required,
            budget: CallBudget { num_predict: 500, timeout_secs: 60 },
            repair_budget: CallBudget { num_predict: 400, timeout_secs: 45 },
        }
    }

    #[test]
    fn no_repair_when_required_tags_present() {
        let gateway = ScriptedGateway::new(vec![ScriptedResult::ok(
            "<SIDE_CONFIRM>PRO</SIDE_CONFIRM><REASONING>Arg one\nArg two</REASONING>",
        )]);
        let engine = PromptEngine::new();

        let result = generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Turn))
            .expect("generate");

        assert_eq!(gateway.calls(), 1);
        assert!(result.advisory.is_none());
        assert!(result.raw.contains("Arg one"));
    }

    #[test]
    fn missing_tag_triggers_one_repair_and_merges_output() {
        let primary = "<REASONING>Arg one</REASONING>";
        let gateway = ScriptedGateway::new(vec![
            ScriptedResult::ok_with_metrics(
                primary,
                GenMetrics { time_load_s: 1.5, ..GenMetrics::default() },
            ),
            ScriptedResult::ok_with_metrics(
                "<SIDE_CONFIRM>PRO</SIDE_CONFIRM>",
                GenMetrics { time_load_s: 0.25, time_gen_s: 0.5, ..GenMetrics::default() },
            ),
        ]);
        let engine = PromptEngine::new();

        let result = generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Turn))
            .expect("generate");

        let requests = gateway.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("<SIDE_CONFIRM>...</SIDE_CONFIRM>"));
        assert_eq!(requests[1].num_predict, 400);
        assert_eq!(requests[1].timeout.as_secs(), 45);
        // Merged output carries both fragments and re-parses cleanly.
        assert!(result.raw.contains(primary));
        assert!(result.raw.contains("<SIDE_CONFIRM>PRO</SIDE_CONFIRM>"));
        let parsed = parse_turn_output(&result.raw, Side::Pro);
        assert!(!parsed.side_mismatch);
        // Metrics are the repair call's, plus the primary call's load time.
        assert_eq!(result.metrics.time_load_s, 1.75);
        assert_eq!(result.metrics.time_gen_s, 0.5);
        assert!(result.advisory.is_none());
    }

    #[test]
    fn presence_checks_use_the_primary_output_only() {
        // Primary is missing both tags; even though the first repair's output
        // happens to contain both, the second tag still gets its own repair.
        let gateway = ScriptedGateway::new(vec![
            ScriptedResult::ok("free-form rambling"),
            ScriptedResult::ok(
                "<REASONING>recovered</REASONING>\n<SIDE_CONFIRM>PRO</SIDE_CONFIRM>",
            ),
            ScriptedResult::ok("<SIDE_CONFIRM>PRO</SIDE_CONFIRM>"),
        ]);
        let engine = PromptEngine::new();

        let result = generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Turn))
            .expect("generate");

        assert_eq!(gateway.calls(), 3);
        assert!(result.advisory.is_none());
    }

    #[test]
    fn repair_failure_downgrades_to_advisory() {
        let gateway = ScriptedGateway::new(vec![
            ScriptedResult::ok("<REASONING>Arg one</REASONING>"),
            ScriptedResult::err("timeout: model call exceeded 45s"),
        ]);
        let engine = PromptEngine::new();

        let result = generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Turn))
            .expect("generate");

        assert_eq!(result.raw, "<REASONING>Arg one</REASONING>");
        let advisory = result.advisory.expect("advisory");
        assert!(advisory.contains("<SIDE_CONFIRM>"));
    }

    #[test]
    fn primary_transport_failure_propagates_without_repair() {
        let gateway = ScriptedGateway::new(vec![ScriptedResult::err(
            "timeout: model call exceeded 60s",
        )]);
        let engine = PromptEngine::new();

        let err = generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Turn))
            .unwrap_err();

        assert!(err.to_string().contains("timeout"));
        assert_eq!(gateway.calls(), 1);
    }

    #[test]
    fn final_tag_repair_uses_seven_line_budget() {
        let gateway = ScriptedGateway::new(vec![
            ScriptedResult::ok("<SIDE>PRO</SIDE>"),
            ScriptedResult::ok("<FINAL>closing</FINAL>"),
        ]);
        let engine = PromptEngine::new();

        generate_with_repair(&gateway, &engine, "prompt", &call(RequiredTags::Final))
            .expect("generate");

        let requests = gateway.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("<FINAL>...</FINAL>"));
        assert!(requests[1].prompt.contains("<=7 lines"));
    }
}
