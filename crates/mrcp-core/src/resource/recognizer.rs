//! Speech recognizer resource tables (RFC 6787 section 9).

use super::{FieldKind, Resource, ResourceId, StaticHeaderTable};

const METHODS: &[&str] = &[
    "SET-PARAMS",
    "GET-PARAMS",
    "DEFINE-GRAMMAR",
    "RECOGNIZE",
    "INTERPRET",
    "GET-RESULT",
    "START-INPUT-TIMERS",
    "STOP",
];

const EVENTS: &[&str] = &[
    "START-OF-INPUT",
    "RECOGNITION-COMPLETE",
    "INTERPRETATION-COMPLETE",
];

const HEADER_NAMES: &[&str] = &[
    "Confidence-Threshold",
    "Sensitivity-Level",
    "Speed-Vs-Accuracy",
    "N-Best-List-Length",
    "No-Input-Timeout",
    "Recognition-Timeout",
    "Waveform-Uri",
    "Completion-Cause",
    "Completion-Reason",
    "Recognizer-Context-Block",
    "Start-Input-Timers",
    "Speech-Complete-Timeout",
    "Speech-Incomplete-Timeout",
    "Dtmf-Interdigit-Timeout",
    "Dtmf-Term-Timeout",
    "Dtmf-Term-Char",
    "Save-Waveform",
    "Speech-Language",
    "Media-Type",
    "Cancel-If-Queue",
];

const HEADER_KINDS: &[FieldKind] = &[
    FieldKind::Float,   // Confidence-Threshold
    FieldKind::Float,   // Sensitivity-Level
    FieldKind::Float,   // Speed-Vs-Accuracy
    FieldKind::Integer, // N-Best-List-Length
    FieldKind::Integer, // No-Input-Timeout
    FieldKind::Integer, // Recognition-Timeout
    FieldKind::Text,    // Waveform-Uri
    FieldKind::Integer, // Completion-Cause
    FieldKind::Text,    // Completion-Reason
    FieldKind::Text,    // Recognizer-Context-Block
    FieldKind::Boolean, // Start-Input-Timers
    FieldKind::Integer, // Speech-Complete-Timeout
    FieldKind::Integer, // Speech-Incomplete-Timeout
    FieldKind::Integer, // Dtmf-Interdigit-Timeout
    FieldKind::Integer, // Dtmf-Term-Timeout
    FieldKind::Text,    // Dtmf-Term-Char
    FieldKind::Boolean, // Save-Waveform
    FieldKind::Text,    // Speech-Language
    FieldKind::Text,    // Media-Type
    FieldKind::Boolean, // Cancel-If-Queue
];

static HEADER_TABLE: StaticHeaderTable = StaticHeaderTable::new(HEADER_NAMES, HEADER_KINDS);

/// The `speechrecog` resource entry.
pub fn recognizer_resource(id: ResourceId) -> Resource {
    Resource {
        id,
        name: "speechrecog",
        methods: METHODS,
        events: EVENTS,
        header_table: &HEADER_TABLE,
    }
}
