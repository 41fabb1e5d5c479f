use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// The six request fields, in their fixed validation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Area,
    Category,
    PartySize,
    Date,
    Time,
    DeliveryAddress,
}

impl SlotName {
    pub const VALIDATION_ORDER: [SlotName; 6] = [
        SlotName::Area,
        SlotName::Category,
        SlotName::PartySize,
        SlotName::Date,
        SlotName::Time,
        SlotName::DeliveryAddress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Category => "category",
            Self::PartySize => "party_size",
            Self::Date => "date",
            Self::Time => "time",
            Self::DeliveryAddress => "delivery_address",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "area" | "location" => Some(Self::Area),
            "category" | "cuisine" => Some(Self::Category),
            "party_size" => Some(Self::PartySize),
            "date" => Some(Self::Date),
            "time" => Some(Self::Time),
            "delivery_address" | "email" => Some(Self::DeliveryAddress),
            _ => None,
        }
    }
}

/// Fill state of a single slot. A slot is filled iff it holds a resolved value;
/// there is no candidate-but-unvalidated middle state that a turn can proceed
/// with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotValue {
    Filled(String),
    Absent,
}

impl SlotValue {
    pub fn as_filled(&self) -> Option<&str> {
        match self {
            Self::Filled(value) => Some(value),
            Self::Absent => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: SlotName,
    pub raw_input: Option<String>,
    pub value: SlotValue,
}

impl Slot {
    pub fn absent(name: SlotName) -> Self {
        Self { name, raw_input: None, value: SlotValue::Absent }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogState {
    Eliciting(Intent),
    Delegating,
    Closed,
}

/// Per-conversation state: the active intent and its slot store. Created on the
/// first turn, mutated on every turn; expiry is the session store's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub intent: Intent,
    pub state: DialogState,
    slots: BTreeMap<SlotName, Slot>,
}

impl Session {
    pub fn new(id: SessionId, intent: Intent) -> Self {
        Self { id, intent, state: DialogState::Eliciting(intent), slots: BTreeMap::new() }
    }

    /// Switches the active intent, discarding every slot so values from the
    /// previous intent cannot leak into the new one.
    pub fn switch_intent(&mut self, intent: Intent) {
        if self.intent != intent {
            self.intent = intent;
            self.slots.clear();
        }
        self.state = DialogState::Eliciting(intent);
    }

    pub fn fill(&mut self, name: SlotName, raw_input: Option<String>, value: String) {
        self.slots.insert(name, Slot { name, raw_input, value: SlotValue::Filled(value) });
    }

    /// Resets a slot to absent; used after a validation failure so the field
    /// becomes the next elicitation target.
    pub fn clear(&mut self, name: SlotName) {
        self.slots.insert(name, Slot::absent(name));
    }

    pub fn value_of(&self, name: SlotName) -> Option<&str> {
        self.slots.get(&name).and_then(|slot| slot.value.as_filled())
    }

    pub fn filled_values(&self) -> BTreeMap<SlotName, String> {
        self.slots
            .iter()
            .filter_map(|(name, slot)| {
                slot.value.as_filled().map(|value| (*name, value.to_string()))
            })
            .collect()
    }

    pub fn missing_required(&self) -> Vec<SlotName> {
        self.intent
            .required_slots()
            .iter()
            .copied()
            .filter(|name| self.value_of(*name).is_none())
            .collect()
    }
}
