use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::domain::request::TIME_FORMAT;
use crate::domain::session::SlotName;

pub const SUPPORTED_AREAS: [&str; 2] = ["manhattan", "nyc"];

pub const SUPPORTED_CUISINES: [&str; 9] = [
    "american", "italian", "french", "spanish", "chinese", "mexican", "japanese", "korean", "thai",
];

pub const MIN_PARTY_SIZE: u8 = 1;
pub const MAX_PARTY_SIZE: u8 = 12;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Valid,
    Invalid { field: SlotName, message: Option<String> },
}

impl ValidationOutcome {
    fn invalid(field: SlotName, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: Some(message.into()) }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validates every filled slot in the fixed field order and returns the first
/// violation, so the dialog manager never surfaces conflicting prompts in one
/// turn.
pub fn validate_filled(
    slots: &BTreeMap<SlotName, String>,
    clock: &dyn Clock,
) -> ValidationOutcome {
    for name in SlotName::VALIDATION_ORDER {
        if let Some(value) = slots.get(&name) {
            let outcome = validate_slot(name, value, slots, clock);
            if !outcome.is_valid() {
                return outcome;
            }
        }
    }
    ValidationOutcome::Valid
}

/// Validates one candidate value. Rules are per-field but may read
/// already-resolved sibling slots for cross-field checks (time needs date).
/// Pure and deterministic given the injected clock.
pub fn validate_slot(
    name: SlotName,
    value: &str,
    siblings: &BTreeMap<SlotName, String>,
    clock: &dyn Clock,
) -> ValidationOutcome {
    match name {
        SlotName::Area => validate_area(value),
        SlotName::Category => validate_category(value),
        SlotName::PartySize => validate_party_size(value),
        SlotName::Date => validate_date(value, clock),
        SlotName::Time => validate_time(value, siblings.get(&SlotName::Date), clock),
        SlotName::DeliveryAddress => validate_delivery_address(value),
    }
}

fn validate_area(value: &str) -> ValidationOutcome {
    let normalized = value.trim().to_ascii_lowercase();
    if SUPPORTED_AREAS.contains(&normalized.as_str()) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::invalid(
            SlotName::Area,
            format!("We do not have suggestions in {value}, you can choose Manhattan or NYC."),
        )
    }
}

fn validate_category(value: &str) -> ValidationOutcome {
    let normalized = value.trim().to_ascii_lowercase();
    if SUPPORTED_CUISINES.contains(&normalized.as_str()) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::invalid(
            SlotName::Category,
            format!("We do not have {value} suggestions, please try another cuisine."),
        )
    }
}

fn validate_party_size(value: &str) -> ValidationOutcome {
    let Ok(size) = value.trim().parse::<u32>() else {
        return ValidationOutcome::invalid(
            SlotName::PartySize,
            "I need the party size as a number, please try again.",
        );
    };

    if (u32::from(MIN_PARTY_SIZE)..=u32::from(MAX_PARTY_SIZE)).contains(&size) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::invalid(
            SlotName::PartySize,
            "We can only give suggestions for a party of 1-12 people, please try again.",
        )
    }
}

fn validate_date(value: &str, clock: &dyn Clock) -> ValidationOutcome {
    let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") else {
        return ValidationOutcome::invalid(
            SlotName::Date,
            "I did not understand that date, you can try today or tomorrow.",
        );
    };

    // Today is allowed; only strictly past dates are rejected.
    if date < clock.today() {
        ValidationOutcome::invalid(SlotName::Date, "The date can not be earlier than today.")
    } else {
        ValidationOutcome::Valid
    }
}

fn validate_time(value: &str, date: Option<&String>, clock: &dyn Clock) -> ValidationOutcome {
    let trimmed = value.trim();
    if trimmed.len() != 5 {
        return ValidationOutcome::Invalid { field: SlotName::Time, message: None };
    }
    let Ok(time) = NaiveTime::parse_from_str(trimmed, TIME_FORMAT) else {
        return ValidationOutcome::Invalid { field: SlotName::Time, message: None };
    };

    // Cross-field check: once the date is resolved, the combined timestamp must
    // not be in the past.
    if let Some(date) = date.and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    {
        if date.and_time(time) < clock.now().naive_utc() {
            return ValidationOutcome::invalid(
                SlotName::Time,
                "That time has already passed, please choose a later time.",
            );
        }
    }

    ValidationOutcome::Valid
}

fn validate_delivery_address(value: &str) -> ValidationOutcome {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|error| unreachable!("email pattern is a constant: {error}"))
    });

    if pattern.is_match(value.trim()) {
        ValidationOutcome::Valid
    } else {
        ValidationOutcome::invalid(
            SlotName::DeliveryAddress,
            "That does not look like a valid email address, please try again.",
        )
    }
}

/// Fallback elicitation prompts for violations where the rule itself has no
/// message to offer.
pub fn default_prompt(name: SlotName) -> &'static str {
    match name {
        SlotName::Area => "Which area would you like suggestions for?",
        SlotName::Category => "What cuisine are you in the mood for?",
        SlotName::PartySize => "How many people are in your party?",
        SlotName::Date => "What date would you like to dine?",
        SlotName::Time => "What time would you like to dine? Please use HH:MM.",
        SlotName::DeliveryAddress => "Which email address should the suggestions go to?",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};

    use crate::clock::FixedClock;
    use crate::domain::session::SlotName;

    use super::{validate_filled, validate_slot, ValidationOutcome};

    // 2026-08-25 18:30 UTC.
    fn clock() -> FixedClock {
        FixedClock(
            DateTime::parse_from_rfc3339("2026-08-25T18:30:00Z")
                .expect("valid rfc3339")
                .with_timezone(&Utc),
        )
    }

    fn no_siblings() -> BTreeMap<SlotName, String> {
        BTreeMap::new()
    }

    fn check(name: SlotName, value: &str) -> ValidationOutcome {
        validate_slot(name, value, &no_siblings(), &clock())
    }

    #[test]
    fn area_allow_list_is_case_insensitive() {
        assert!(check(SlotName::Area, "Manhattan").is_valid());
        assert!(check(SlotName::Area, "NYC").is_valid());
        assert!(check(SlotName::Area, "nyc").is_valid());

        let outcome = check(SlotName::Area, "Boston");
        let ValidationOutcome::Invalid { field, message } = outcome else {
            panic!("Boston should be rejected");
        };
        assert_eq!(field, SlotName::Area);
        let message = message.expect("area violations carry a message");
        assert!(message.contains("Manhattan"));
        assert!(message.contains("NYC"));
    }

    #[test]
    fn category_allow_list_is_case_insensitive() {
        assert!(check(SlotName::Category, "Japanese").is_valid());
        assert!(check(SlotName::Category, "THAI").is_valid());
        assert!(!check(SlotName::Category, "fusion").is_valid());
    }

    #[test]
    fn party_size_bounds_and_failure_modes() {
        for valid in ["1", "4", "12"] {
            assert!(check(SlotName::PartySize, valid).is_valid(), "{valid} should be valid");
        }

        let out_of_range = check(SlotName::PartySize, "13");
        let ValidationOutcome::Invalid { message: Some(range_message), .. } = out_of_range else {
            panic!("13 should be rejected with a message");
        };
        assert!(range_message.contains("1-12"));

        let non_numeric = check(SlotName::PartySize, "abc");
        let ValidationOutcome::Invalid { message: Some(numeric_message), .. } = non_numeric else {
            panic!("abc should be rejected with a message");
        };
        assert_ne!(numeric_message, range_message, "failure modes have distinct messages");

        assert!(!check(SlotName::PartySize, "0").is_valid());
    }

    #[test]
    fn date_accepts_today_and_rejects_the_past() {
        assert!(check(SlotName::Date, "2026-08-25").is_valid(), "today is allowed");
        assert!(check(SlotName::Date, "2026-08-26").is_valid());
        assert!(!check(SlotName::Date, "2026-08-24").is_valid());
        assert!(!check(SlotName::Date, "next friday").is_valid());
    }

    #[test]
    fn time_requires_exact_hh_mm_shape() {
        assert!(check(SlotName::Time, "18:30").is_valid());
        assert!(!check(SlotName::Time, "8:30").is_valid());
        assert!(!check(SlotName::Time, "18:30:00").is_valid());
        assert!(!check(SlotName::Time, "99:99").is_valid());
    }

    #[test]
    fn time_earlier_than_now_on_today_is_rejected() {
        let today = BTreeMap::from([(SlotName::Date, "2026-08-25".to_string())]);
        let outcome = validate_slot(SlotName::Time, "12:00", &today, &clock());
        assert!(!outcome.is_valid(), "12:00 today is before the 18:30 clock");

        let tomorrow = BTreeMap::from([(SlotName::Date, "2026-08-26".to_string())]);
        assert!(validate_slot(SlotName::Time, "12:00", &tomorrow, &clock()).is_valid());
        assert!(validate_slot(SlotName::Time, "19:00", &today, &clock()).is_valid());
    }

    #[test]
    fn delivery_address_must_look_like_an_email() {
        assert!(check(SlotName::DeliveryAddress, "a@b.com").is_valid());
        assert!(check(SlotName::DeliveryAddress, "user.name+tag@example.co.uk").is_valid());
        assert!(!check(SlotName::DeliveryAddress, "6469459688").is_valid());
        assert!(!check(SlotName::DeliveryAddress, "not-an-email").is_valid());
        assert!(!check(SlotName::DeliveryAddress, "a@b").is_valid());
    }

    #[test]
    fn validate_filled_reports_the_earliest_violation_only() {
        let slots = BTreeMap::from([
            (SlotName::Area, "Boston".to_string()),
            (SlotName::PartySize, "40".to_string()),
        ]);

        let outcome = validate_filled(&slots, &clock());
        assert!(
            matches!(outcome, ValidationOutcome::Invalid { field: SlotName::Area, .. }),
            "area precedes party_size in the fixed order"
        );
    }

    #[test]
    fn validate_filled_is_deterministic_under_a_fixed_clock() {
        let slots = BTreeMap::from([
            (SlotName::Area, "Manhattan".to_string()),
            (SlotName::Category, "Japanese".to_string()),
            (SlotName::PartySize, "4".to_string()),
            (SlotName::Date, "2026-08-26".to_string()),
            (SlotName::Time, "18:30".to_string()),
            (SlotName::DeliveryAddress, "a@b.com".to_string()),
        ]);

        let first = validate_filled(&slots, &clock());
        let second = validate_filled(&slots, &clock());
        assert_eq!(first, second);
        assert!(first.is_valid());
    }
}
