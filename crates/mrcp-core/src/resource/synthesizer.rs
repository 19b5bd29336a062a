//! Speech synthesizer resource tables (RFC 6787 section 8).

use super::{FieldKind, Resource, ResourceId, StaticHeaderTable};

const METHODS: &[&str] = &[
    "SET-PARAMS",
    "GET-PARAMS",
    "SPEAK",
    "STOP",
    "PAUSE",
    "RESUME",
    "BARGE-IN-OCCURRED",
    "CONTROL",
    "DEFINE-LEXICON",
];

const EVENTS: &[&str] = &["SPEECH-MARKER", "SPEAK-COMPLETE"];

const HEADER_NAMES: &[&str] = &[
    "Jump-Size",
    "Kill-On-Barge-In",
    "Speaker-Profile",
    "Completion-Cause",
    "Completion-Reason",
    "Voice-Gender",
    "Voice-Age",
    "Voice-Variant",
    "Voice-Name",
    "Prosody-Volume",
    "Prosody-Rate",
    "Speech-Marker",
    "Speech-Language",
    "Fetch-Hint",
    "Audio-Fetch-Hint",
    "Failed-Uri",
    "Failed-Uri-Cause",
    "Speak-Restart",
    "Speak-Length",
    "Load-Lexicon",
    "Lexicon-Search-Order",
];

const HEADER_KINDS: &[FieldKind] = &[
    FieldKind::Text,    // Jump-Size
    FieldKind::Boolean, // Kill-On-Barge-In
    FieldKind::Text,    // Speaker-Profile
    FieldKind::Integer, // Completion-Cause
    FieldKind::Text,    // Completion-Reason
    FieldKind::Text,    // Voice-Gender
    FieldKind::Integer, // Voice-Age
    FieldKind::Integer, // Voice-Variant
    FieldKind::Text,    // Voice-Name
    FieldKind::Text,    // Prosody-Volume
    FieldKind::Text,    // Prosody-Rate
    FieldKind::Text,    // Speech-Marker
    FieldKind::Text,    // Speech-Language
    FieldKind::Text,    // Fetch-Hint
    FieldKind::Text,    // Audio-Fetch-Hint
    FieldKind::Text,    // Failed-Uri
    FieldKind::Text,    // Failed-Uri-Cause
    FieldKind::Boolean, // Speak-Restart
    FieldKind::Text,    // Speak-Length
    FieldKind::Boolean, // Load-Lexicon
    FieldKind::Text,    // Lexicon-Search-Order
];

static HEADER_TABLE: StaticHeaderTable = StaticHeaderTable::new(HEADER_NAMES, HEADER_KINDS);

/// The `speechsynth` resource entry.
pub fn synthesizer_resource(id: ResourceId) -> Resource {
    Resource {
        id,
        name: "speechsynth",
        methods: METHODS,
        events: EVENTS,
        header_table: &HEADER_TABLE,
    }
}
