//! Transcript data model.
//!
//! These types define the stable contracts between the session orchestrator,
//! the critic pipeline, and the export document. They are pure data: records
//! are built once per round and never mutated after being appended.

use serde::{Deserialize, Serialize};

use crate::core::persona::StyleSelection;
use crate::core::side::Side;

/// Performance metrics for one generation call.
///
/// Times are seconds rounded to two decimals; zeros mean "no metrics
/// recorded" (failed or never-run calls).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenMetrics {
    pub time_total_s: f64,
    pub time_load_s: f64,
    pub time_gen_s: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens_per_s: f64,
}

/// Parsed result of one baseline/exchange generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutput {
    pub side_confirm: String,
    pub assumptions: String,
    pub reflection: String,
    pub stance: String,
    pub change: String,
    pub reasoning: String,
    pub side_mismatch: bool,
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parsed result of one finalize generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalOutput {
    pub side: String,
    #[serde(rename = "final")]
    pub final_statement: String,
    pub side_mismatch: bool,
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Prior-state payload handed to a debater before its next turn.
///
/// Round 0 has no prior state, so the opening capsule carries only topic and
/// side; from round 1 on, the reflection/reasoning fields are populated from
/// the previous round's outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub topic: String,
    pub my_side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_last_reflection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_last_reasoning: Option<String>,
}

impl Capsule {
    pub fn opening(topic: &str, side: Side) -> Self {
        Self {
            topic: topic.to_string(),
            my_side: side,
            my_last_reflection: None,
            opponent_last_reasoning: None,
        }
    }

    pub fn next(topic: &str, side: Side, own_reflection: &str, opponent_reasoning: &str) -> Self {
        Self {
            topic: topic.to_string(),
            my_side: side,
            my_last_reflection: Some(own_reflection.to_string()),
            opponent_last_reasoning: Some(opponent_reasoning.to_string()),
        }
    }
}

/// One side's slice of a round: what it was given, what it produced, and how
/// fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideRecord {
    pub capsule: Capsule,
    pub output: TurnOutput,
    pub metrics: GenMetrics,
}

/// One exchange step. Round 0 is the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub pro: SideRecord,
    pub con: SideRecord,
}

/// One side's final statement plus metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub output: FinalOutput,
    pub metrics: GenMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finals {
    pub pro: FinalRecord,
    pub con: FinalRecord,
}

/// Configuration of one debater.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebaterConfig {
    pub model: String,
    pub temperature: f64,
    pub persona: String,
    #[serde(default)]
    pub style: StyleSelection,
}

/// Session-wide debate configuration embedded into the export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateConfig {
    pub pro: DebaterConfig,
    pub con: DebaterConfig,
    pub adversarial: bool,
}

impl DebateConfig {
    pub fn debater(&self, side: Side) -> &DebaterConfig {
        match side {
            Side::Pro => &self.pro,
            Side::Con => &self.con,
        }
    }
}

/// Per-side mismatch tallies, pre-computed before the critic runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftAudit {
    pub total_pro_mismatches: u32,
    pub total_con_mismatches: u32,
}

/// Hallucination scan result: either a list of suspect fragments, or a record
/// of why the scan could not be parsed. Never discarded on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HallucinationAudit {
    Flags { potential_fabrications: Vec<String> },
    Failure { error: String, raw: String },
}

/// Combined critic output, embedded into the transcript once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticReport {
    pub verdict: String,
    pub verdict_metrics: GenMetrics,
    pub drift_audit: DriftAudit,
    pub hallucination_audit: HallucinationAudit,
}

/// The full debate: the only artifact the system exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub topic: String,
    pub debate_config: DebateConfig,
    pub history: Vec<RoundRecord>,
    pub finals: Option<Finals>,
    pub critic_report: Option<CriticReport>,
}

impl Transcript {
    pub fn new(topic: &str, debate_config: DebateConfig) -> Self {
        Self {
            topic: topic.to_string(),
            debate_config,
            history: Vec::new(),
            finals: None,
            critic_report: None,
        }
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        self.history.last()
    }

    /// Tally `side_mismatch` flags per side across every round and the
    /// finals.
    pub fn drift_counts(&self) -> DriftAudit {
        let mut audit = DriftAudit::default();
        for round in &self.history {
            if round.pro.output.side_mismatch {
                audit.total_pro_mismatches += 1;
            }
            if round.con.output.side_mismatch {
                audit.total_con_mismatches += 1;
            }
        }
        if let Some(finals) = &self.finals {
            if finals.pro.output.side_mismatch {
                audit.total_pro_mismatches += 1;
            }
            if finals.con.output.side_mismatch {
                audit.total_con_mismatches += 1;
            }
        }
        audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::parse_turn_output;

    fn record(side: Side, raw: &str) -> SideRecord {
        SideRecord {
            capsule: Capsule::opening("topic", side),
            output: parse_turn_output(raw, side),
            metrics: GenMetrics::default(),
        }
    }

    fn final_record(side: Side, mismatch: bool) -> FinalRecord {
        FinalRecord {
            output: FinalOutput {
                side: if mismatch { String::new() } else { side.label().to_string() },
                final_statement: "done".to_string(),
                side_mismatch: mismatch,
                raw_output: String::new(),
                error: None,
            },
            metrics: GenMetrics::default(),
        }
    }

    fn config() -> DebateConfig {
        DebateConfig {
            pro: DebaterConfig {
                model: "llama3:8b".to_string(),
                temperature: 0.4,
                persona: String::new(),
                style: StyleSelection::default(),
            },
            con: DebaterConfig {
                model: "mistral:7b".to_string(),
                temperature: 0.7,
                persona: String::new(),
                style: StyleSelection::default(),
            },
            adversarial: true,
        }
    }

    #[test]
    fn drift_counts_cover_history_and_finals() {
        let mut transcript = Transcript::new("topic", config());
        transcript.history.push(RoundRecord {
            round: 0,
            pro: record(Side::Pro, "<SIDE_CONFIRM>PRO</SIDE_CONFIRM>"),
            con: record(Side::Con, "<SIDE_CONFIRM>PRO</SIDE_CONFIRM>"),
        });
        transcript.history.push(RoundRecord {
            round: 1,
            pro: record(Side::Pro, "no tags"),
            con: record(Side::Con, "<SIDE_CONFIRM>con</SIDE_CONFIRM>"),
        });
        transcript.finals = Some(Finals {
            pro: final_record(Side::Pro, true),
            con: final_record(Side::Con, false),
        });

        let audit = transcript.drift_counts();
        assert_eq!(audit.total_pro_mismatches, 2);
        assert_eq!(audit.total_con_mismatches, 1);
    }

    #[test]
    fn opening_capsule_omits_prior_state() {
        let capsule = Capsule::opening("t", Side::Pro);
        let json = serde_json::to_value(&capsule).expect("json");
        assert!(json.get("my_last_reflection").is_none());
        assert!(json.get("opponent_last_reasoning").is_none());
        assert_eq!(json["my_side"], "PRO");
    }

    #[test]
    fn final_output_serializes_statement_as_final() {
        let out = FinalOutput {
            side: "PRO".to_string(),
            final_statement: "closing".to_string(),
            side_mismatch: false,
            raw_output: String::new(),
            error: None,
        };
        let json = serde_json::to_value(&out).expect("json");
        assert_eq!(json["final"], "closing");
    }

    #[test]
    fn hallucination_audit_serializes_untagged() {
        let flags = HallucinationAudit::Flags {
            potential_fabrications: vec!["87% of all".to_string()],
        };
        let json = serde_json::to_value(&flags).expect("json");
        assert!(json.get("potential_fabrications").is_some());

        let failure = HallucinationAudit::Failure {
            error: "bad json".to_string(),
            raw: "```oops```".to_string(),
        };
        let json = serde_json::to_value(&failure).expect("json");
        assert_eq!(json["error"], "bad json");
    }
}
