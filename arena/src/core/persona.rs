//! Persona instruction building.
//!
//! Each debater carries a base persona plus four style axes. The axes are
//! closed enums so an invalid selection is rejected when the config is
//! deserialized instead of silently contributing nothing to the prompt.

use serde::{Deserialize, Serialize};

use crate::core::side::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    Deferential,
    Polite,
    Assertive,
    Aggressive,
    Sarcastic,
}

impl Tone {
    fn directive(self) -> &'static str {
        match self {
            Tone::Deferential => "Your tone must be submissive, polite, and deferential.",
            Tone::Polite => "Your tone must be polite and respectful.",
            Tone::Assertive => "Your tone must be assertive, direct, and confident.",
            Tone::Aggressive => "Your tone must be aggressive and confrontational.",
            Tone::Sarcastic => "Your tone must be sarcastic and mocking.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgumentStyle {
    Emotional,
    Logical,
    DataDriven,
}

impl ArgumentStyle {
    fn directive(self) -> &'static str {
        match self {
            ArgumentStyle::Emotional => {
                "Your argument must be based on emotion, anecdotes, and pathos."
            }
            ArgumentStyle::Logical => {
                "Your argument must be based on step-by-step logic and reasoning (logos)."
            }
            ArgumentStyle::DataDriven => {
                "Your argument must be based on citing (invented) statistics, studies, and data."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Formality {
    Casual,
    Professional,
    Academic,
}

impl Formality {
    fn directive(self) -> &'static str {
        match self {
            Formality::Casual => "You must write in a casual, simple, and conversational style.",
            Formality::Professional => {
                "You must write in a formal, professional, and business-like style."
            }
            Formality::Academic => {
                "You must write in an academic, complex, and scholarly style."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    Superficial,
    Standard,
    Complex,
}

impl Complexity {
    fn directive(self) -> &'static str {
        match self {
            Complexity::Superficial => {
                "Your reasoning must be superficial and simple, using only one or two steps."
            }
            Complexity::Standard => "Your reasoning must be clear and well-explained.",
            Complexity::Complex => {
                "Your reasoning must be complex, multi-layered, and show deep thought."
            }
        }
    }
}

/// Per-debater style selection. Unset axes contribute nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<ArgumentStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formality: Option<Formality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
}

/// Build the consolidated instruction block injected into every prompt for
/// one debater. Pure and deterministic: same inputs, same string.
///
/// Component order: base persona, forced stance (when adversarial), then one
/// directive per set style axis.
pub fn build_instructions(
    persona_text: &str,
    style: &StyleSelection,
    adversarial: bool,
    side: Side,
) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let persona = persona_text.trim();
    if !persona.is_empty() {
        parts.push(persona);
    }

    if adversarial {
        parts.push(match side {
            Side::Pro => "You *must* agree with and argue in favor of the topic statement.",
            Side::Con => "You *must* disagree with and argue against the topic statement.",
        });
    }

    if let Some(tone) = style.tone {
        parts.push(tone.directive());
    }
    if let Some(argument) = style.argument {
        parts.push(argument.directive());
    }
    if let Some(formality) = style.formality {
        parts.push(formality.directive());
    }
    if let Some(complexity) = style.complexity {
        parts.push(complexity.directive());
    }

    if parts.is_empty() {
        return "You are a neutral debater.".to_string();
    }

    let bullets: Vec<String> = parts.iter().map(|p| format!("- {p}")).collect();
    format!("**YOUR PERSONA AND INSTRUCTIONS:**\n{}", bullets.join("\n"))
}
