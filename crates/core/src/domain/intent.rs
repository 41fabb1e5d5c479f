use serde::{Deserialize, Serialize};

use crate::domain::session::SlotName;

/// Active conversational goal. Each intent defines its own required-slot set
/// and completion behavior; unknown intent names are rejected at the dialog
/// boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    DiningSuggestion,
    Closing,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::DiningSuggestion => "dining_suggestion",
            Self::Closing => "closing",
        }
    }

    /// Accepts both our snake_case names and the upstream NLU's intent names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "greeting" | "greetingintent" => Some(Self::Greeting),
            "dining_suggestion" | "suggestion" | "diningsuggestionsintent" => {
                Some(Self::DiningSuggestion)
            }
            "closing" | "thank_you" | "thankyouintent" => Some(Self::Closing),
            _ => None,
        }
    }

    pub fn required_slots(&self) -> &'static [SlotName] {
        match self {
            Self::DiningSuggestion => &SlotName::VALIDATION_ORDER,
            Self::Greeting | Self::Closing => &[],
        }
    }
}
