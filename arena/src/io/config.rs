//! Debate configuration stored in `arena.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::persona::{ArgumentStyle, Complexity, Formality, StyleSelection, Tone};
use crate::core::transcript::{DebateConfig, DebaterConfig};

/// Token and wall-clock budget for one class of generation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallBudget {
    /// Maximum output tokens.
    pub num_predict: u32,
    /// Maximum time to wait before the call is treated as failed.
    pub timeout_secs: u64,
}

impl CallBudget {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-phase budgets. Warm-up calls are tiny; finalize gets the largest
/// budget; repair is deliberately short so a broken model cannot double the
/// round's cost.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Budgets {
    pub warmup: CallBudget,
    pub baseline: CallBudget,
    pub exchange: CallBudget,
    pub finalize: CallBudget,
    pub repair: CallBudget,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            warmup: CallBudget { num_predict: 5, timeout_secs: 60 },
            baseline: CallBudget { num_predict: 500, timeout_secs: 60 },
            exchange: CallBudget { num_predict: 500, timeout_secs: 60 },
            finalize: CallBudget { num_predict: 700, timeout_secs: 90 },
            repair: CallBudget { num_predict: 400, timeout_secs: 45 },
        }
    }
}

/// The critic model is a secondary auditor, never a debate participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CriticConfig {
    pub model: String,
    pub temperature: f64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            model: "critic:7b".to_string(),
            temperature: 0.3,
        }
    }
}

/// Full debate configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    /// Topic statement both debaters argue about.
    pub topic: String,

    /// Number of exchange rounds after the baseline.
    pub rounds: u32,

    /// Force both models to defend their assigned side even when they would
    /// rather not.
    pub adversarial: bool,

    pub pro: DebaterConfig,
    pub con: DebaterConfig,
    pub critic: CriticConfig,
    pub budgets: Budgets,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            topic: "AI will create more jobs than it destroys".to_string(),
            rounds: 2,
            adversarial: true,
            pro: DebaterConfig {
                model: "llama3:8b".to_string(),
                temperature: 0.4,
                persona: "You are an optimistic, data-driven, and visionary technologist."
                    .to_string(),
                style: StyleSelection {
                    tone: Some(Tone::Assertive),
                    argument: Some(ArgumentStyle::Logical),
                    formality: Some(Formality::Professional),
                    complexity: Some(Complexity::Standard),
                },
            },
            con: DebaterConfig {
                model: "mistral:7b".to_string(),
                temperature: 0.7,
                persona: "You are a cautious, pragmatic, and humanist philosopher.".to_string(),
                style: StyleSelection {
                    tone: Some(Tone::Assertive),
                    argument: Some(ArgumentStyle::Logical),
                    formality: Some(Formality::Professional),
                    complexity: Some(Complexity::Standard),
                },
            },
            critic: CriticConfig::default(),
            budgets: Budgets::default(),
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(anyhow!("topic must not be empty"));
        }
        for (label, model) in [
            ("pro", &self.pro.model),
            ("con", &self.con.model),
            ("critic", &self.critic.model),
        ] {
            if model.trim().is_empty() {
                return Err(anyhow!("{label}.model must not be empty"));
            }
        }
        for (label, temp) in [
            ("pro", self.pro.temperature),
            ("con", self.con.temperature),
            ("critic", self.critic.temperature),
        ] {
            if !(0.0..=2.0).contains(&temp) {
                return Err(anyhow!(
                    "{label}.temperature must be within [0, 2], got {temp}"
                ));
            }
        }
        for (label, budget) in [
            ("warmup", self.budgets.warmup),
            ("baseline", self.budgets.baseline),
            ("exchange", self.budgets.exchange),
            ("finalize", self.budgets.finalize),
            ("repair", self.budgets.repair),
        ] {
            if budget.num_predict == 0 {
                return Err(anyhow!("budgets.{label}.num_predict must be > 0"));
            }
            if budget.timeout_secs == 0 {
                return Err(anyhow!("budgets.{label}.timeout_secs must be > 0"));
            }
        }
        Ok(())
    }

    /// The slice of this configuration embedded into the exported transcript.
    pub fn debate_config(&self) -> DebateConfig {
        DebateConfig {
            pro: self.pro.clone(),
            con: self.con.clone(),
            adversarial: self.adversarial,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ArenaConfig::default()`.
pub fn load_config(path: &Path) -> Result<ArenaConfig> {
    if !path.exists() {
        let cfg = ArenaConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ArenaConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ArenaConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
