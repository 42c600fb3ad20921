//! JSON action messages for connection-oriented consumers.
//!
//! Every message has the shape `{"action": {"type": ..., "param": {...}}}`.
//! Key names are fixed by existing consumers and must not change.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CastImageConfig;
use crate::cue::CueSet;
use crate::event::DispatchEvent;
use crate::viseme::{FALLBACK_INDEX, Viseme};

/// Envelope for an action message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: Action,
}

/// An action with its free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub param: Value,
}

impl ActionMessage {
    pub fn new(kind: impl Into<String>, param: Value) -> Self {
        Self {
            action: Action {
                kind: kind.into(),
                param,
            },
        }
    }

    /// Show the mouth image for the event's active cue.
    pub fn cast_image(event: &DispatchEvent, cast: &CastImageConfig) -> Self {
        let image_number = event.active_value().map_or(FALLBACK_INDEX, Viseme::index);
        Self::new(
            "cast_image",
            json!({
                "image_number": image_number,
                "device_number": cast.device_number,
                "class_name": cast.class_name,
                "fps_number": cast.fps_number,
                "duration_number": cast.duration_number,
            }),
        )
    }

    /// Greeting for the WebSocket consumer, optionally carrying the whole
    /// cue document.
    pub fn init_stream(cues: Option<&CueSet>) -> Self {
        let param = cues.map_or_else(
            || json!({ "metadata": "", "mouthCues": "" }),
            CueSet::to_document,
        );
        Self::new("init_wvs", param)
    }

    /// Greeting for the OSC consumer, optionally carrying the cue document.
    pub fn init_datagram(cues: Option<&CueSet>) -> Self {
        let param = cues.map_or_else(|| json!({}), CueSet::to_document);
        Self::new("init_osc", param)
    }

    /// Greeting for the automation host.
    pub fn init_automation() -> Self {
        Self::new(
            "init_cha",
            json!({ "connection": "true", "WLEDLipSync": "true" }),
        )
    }

    /// Canonical text encoding.
    pub fn to_text(&self) -> String {
        // Serializing a struct of String + Value cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<ActionMessage> for Value {
    fn from(message: ActionMessage) -> Self {
        json!({ "action": { "type": message.action.kind, "param": message.action.param } })
    }
}
