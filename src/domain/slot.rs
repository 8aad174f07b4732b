//! Per-conversation slot accumulation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ServiceType;

/// Structured requirement fields keyed by slot name (e.g. `"shopName"`).
pub type SlotData = BTreeMap<String, serde_json::Value>;

/// Returns `true` when a slot value counts as present.
///
/// `null`, empty strings, empty arrays and zero count as absent.
#[must_use]
pub fn is_filled(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Slot-filling state of one conversation.
///
/// `service_type` is fixed once set. `slot_data` only ever gains or
/// overwrites keys; `missing_fields` and `is_complete` are recomputed from it
/// after every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSlotState {
    /// Service type detected from the first message.
    pub service_type: ServiceType,
    /// Accumulated slot values.
    #[schema(value_type = Object)]
    pub slot_data: SlotData,
    /// Labels of required fields still absent, in schema order.
    pub missing_fields: Vec<String>,
    /// `true` iff `missing_fields` is empty.
    pub is_complete: bool,
}

impl ConversationSlotState {
    /// Creates an empty state for the given service type.
    #[must_use]
    pub fn new(service_type: ServiceType) -> Self {
        let mut state = Self {
            service_type,
            slot_data: SlotData::new(),
            missing_fields: Vec::new(),
            is_complete: false,
        };
        state.recompute();
        state
    }

    /// Merges extracted values into the slot data.
    ///
    /// Only filled values are written, so a merge can overwrite a field but
    /// never clear one.
    pub fn merge(&mut self, extracted: SlotData) {
        for (key, value) in extracted {
            if is_filled(&value) {
                self.slot_data.insert(key, value);
            }
        }
        self.recompute();
    }

    /// Recomputes `missing_fields` and `is_complete` from `slot_data`.
    pub fn recompute(&mut self) {
        self.missing_fields = self
            .service_type
            .required_slots()
            .filter(|s| !self.slot_data.get(s.field).is_some_and(is_filled))
            .map(|s| s.label.to_string())
            .collect();
        self.is_complete = self.missing_fields.is_empty();
    }
}
