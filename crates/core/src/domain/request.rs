use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::SlotName;

pub const TIME_FORMAT: &str = "%H:%M";

/// Immutable snapshot of a completed suggestion request. Constructed only from
/// a fully-filled slot store; it never carries partial fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub category: String,
    pub area: String,
    pub party_size: u8,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    pub delivery_address: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` holds an unusable value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

impl SuggestionRequest {
    /// Builds the snapshot from validated slot values. Parse failures here mean
    /// the caller skipped validation, so they are surfaced as errors rather
    /// than re-prompted.
    pub fn from_slots(slots: &BTreeMap<SlotName, String>) -> Result<Self, RequestError> {
        let value = |name: SlotName| {
            slots.get(&name).cloned().ok_or(RequestError::MissingField(name.as_str()))
        };

        let party_size_raw = value(SlotName::PartySize)?;
        let party_size =
            party_size_raw.trim().parse::<u8>().map_err(|_| RequestError::InvalidField {
                field: SlotName::PartySize.as_str(),
                value: party_size_raw.clone(),
            })?;

        let date_raw = value(SlotName::Date)?;
        let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d").map_err(|_| {
            RequestError::InvalidField { field: SlotName::Date.as_str(), value: date_raw.clone() }
        })?;

        let time_raw = value(SlotName::Time)?;
        let time = NaiveTime::parse_from_str(time_raw.trim(), TIME_FORMAT).map_err(|_| {
            RequestError::InvalidField { field: SlotName::Time.as_str(), value: time_raw.clone() }
        })?;

        Ok(Self {
            category: value(SlotName::Category)?,
            area: value(SlotName::Area)?,
            party_size,
            date,
            time,
            delivery_address: value(SlotName::DeliveryAddress)?,
        })
    }

    /// String key/value attributes, the wire shape carried alongside the queue
    /// message body.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("category".to_string(), self.category.clone()),
            ("area".to_string(), self.area.clone()),
            ("party_size".to_string(), self.party_size.to_string()),
            ("date".to_string(), self.date.format("%Y-%m-%d").to_string()),
            ("time".to_string(), self.time.format(TIME_FORMAT).to_string()),
            ("delivery_address".to_string(), self.delivery_address.clone()),
        ])
    }

    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> Result<Self, RequestError> {
        let slots = attributes
            .iter()
            .filter_map(|(key, value)| SlotName::parse(key).map(|name| (name, value.clone())))
            .collect::<BTreeMap<_, _>>();
        Self::from_slots(&slots)
    }
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::domain::session::SlotName;

    use super::{RequestError, SuggestionRequest};

    fn slots() -> BTreeMap<SlotName, String> {
        BTreeMap::from([
            (SlotName::Area, "Manhattan".to_string()),
            (SlotName::Category, "Japanese".to_string()),
            (SlotName::PartySize, "4".to_string()),
            (SlotName::Date, "2026-08-26".to_string()),
            (SlotName::Time, "18:30".to_string()),
            (SlotName::DeliveryAddress, "a@b.com".to_string()),
        ])
    }

    #[test]
    fn builds_from_a_complete_slot_store_preserving_case() {
        let request = SuggestionRequest::from_slots(&slots()).expect("complete slots");
        assert_eq!(request.category, "Japanese");
        assert_eq!(request.area, "Manhattan");
        assert_eq!(request.party_size, 4);
        assert_eq!(request.date.to_string(), "2026-08-26");
        assert_eq!(request.delivery_address, "a@b.com");
    }

    #[test]
    fn rejects_a_missing_field() {
        let mut incomplete = slots();
        incomplete.remove(&SlotName::Time);

        let error = SuggestionRequest::from_slots(&incomplete).expect_err("time is missing");
        assert_eq!(error, RequestError::MissingField("time"));
    }

    #[test]
    fn rejects_an_unparsable_field() {
        let mut bad = slots();
        bad.insert(SlotName::Date, "tomorrow".to_string());

        let error = SuggestionRequest::from_slots(&bad).expect_err("date is not ISO");
        assert!(matches!(error, RequestError::InvalidField { field: "date", .. }));
    }

    #[test]
    fn attribute_map_round_trips_all_six_fields() {
        let request = SuggestionRequest::from_slots(&slots()).expect("complete slots");
        let attributes = request.to_attributes();

        assert_eq!(attributes.len(), 6);
        assert_eq!(attributes.get("category").map(String::as_str), Some("Japanese"));
        assert_eq!(attributes.get("time").map(String::as_str), Some("18:30"));

        let decoded = SuggestionRequest::from_attributes(&attributes).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn json_body_round_trips_with_hh_mm_time() {
        let request = SuggestionRequest::from_slots(&slots()).expect("complete slots");
        let body = serde_json::to_string(&request).expect("serialize");
        assert!(body.contains("\"18:30\""));

        let decoded: SuggestionRequest = serde_json::from_str(&body).expect("deserialize");
        assert_eq!(decoded, request);
    }
}
