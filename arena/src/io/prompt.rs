//! Prompt rendering for deterministic debater and critic input.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::side::Side;
use crate::core::transcript::Capsule;

const BASELINE_TEMPLATE: &str = include_str!("prompts/baseline.md");
const EXCHANGE_TEMPLATE: &str = include_str!("prompts/exchange.md");
const FINALIZE_TEMPLATE: &str = include_str!("prompts/finalize.md");
const REPAIR_TEMPLATE: &str = include_str!("prompts/repair.md");
const VERDICT_TEMPLATE: &str = include_str!("prompts/verdict.md");
const HALLUCINATION_TEMPLATE: &str = include_str!("prompts/hallucination.md");

/// Template engine wrapper around minijinja.
///
/// Rendering is deterministic: the same inputs always produce the same
/// prompt string.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("baseline", BASELINE_TEMPLATE)
            .expect("baseline template should be valid");
        env.add_template("exchange", EXCHANGE_TEMPLATE)
            .expect("exchange template should be valid");
        env.add_template("finalize", FINALIZE_TEMPLATE)
            .expect("finalize template should be valid");
        env.add_template("repair", REPAIR_TEMPLATE)
            .expect("repair template should be valid");
        env.add_template("verdict", VERDICT_TEMPLATE)
            .expect("verdict template should be valid");
        env.add_template("hallucination", HALLUCINATION_TEMPLATE)
            .expect("hallucination template should be valid");
        Self { env }
    }

    pub fn render_baseline(
        &self,
        topic: &str,
        side: Side,
        persona_instructions: &str,
    ) -> Result<String> {
        let template = self.env.get_template("baseline")?;
        let rendered = template.render(context! {
            topic => topic,
            side => side.label(),
            persona_instructions => persona_instructions,
        })?;
        Ok(rendered)
    }

    pub fn render_exchange(
        &self,
        capsule: &Capsule,
        persona_instructions: &str,
    ) -> Result<String> {
        let capsule_json =
            serde_json::to_string_pretty(capsule).context("serialize capsule")?;
        let template = self.env.get_template("exchange")?;
        let rendered = template.render(context! {
            topic => capsule.topic.as_str(),
            side => capsule.my_side.label(),
            capsule_json => capsule_json,
            persona_instructions => persona_instructions,
        })?;
        Ok(rendered)
    }

    pub fn render_finalize(
        &self,
        topic: &str,
        side: Side,
        summary: &[String],
        persona_instructions: &str,
    ) -> Result<String> {
        let summary_json =
            serde_json::to_string_pretty(summary).context("serialize debate summary")?;
        let template = self.env.get_template("finalize")?;
        let rendered = template.render(context! {
            topic => topic,
            side => side.label(),
            summary_json => summary_json,
            persona_instructions => persona_instructions,
        })?;
        Ok(rendered)
    }

    pub fn render_repair(
        &self,
        tag_name: &str,
        topic: &str,
        side: Side,
        max_lines: usize,
    ) -> Result<String> {
        let template = self.env.get_template("repair")?;
        let rendered = template.render(context! {
            tag_name => tag_name,
            topic => topic,
            side => side.label(),
            max_lines => max_lines,
        })?;
        Ok(rendered)
    }

    pub fn render_verdict(
        &self,
        topic: &str,
        model_pro: &str,
        model_con: &str,
        final_pro: &str,
        final_con: &str,
    ) -> Result<String> {
        let template = self.env.get_template("verdict")?;
        let rendered = template.render(context! {
            topic => topic,
            model_pro => model_pro,
            model_con => model_con,
            final_pro => final_pro,
            final_con => final_con,
        })?;
        Ok(rendered)
    }

    pub fn render_hallucination(&self, transcript_json: &str) -> Result<String> {
        let template = self.env.get_template("hallucination")?;
        let rendered = template.render(context! {
            transcript_json => transcript_json,
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
