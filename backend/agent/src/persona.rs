//! Built-in companion personas and resolution of caller-supplied ones.
//!
//! The registry is built once at startup and shared read-only behind an `Arc`.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use homh_core::{PersonaDescriptor, PersonaInput};

/// Persona used when an id is unknown.
pub const DEFAULT_PERSONA_ID: &str = "mochi";

/// Ids with this prefix carry their own name, description and tone.
pub const CUSTOM_PREFIX: &str = "custom";

pub const CUSTOM_DEFAULT_NAME: &str = "Custom Persona";
pub const CUSTOM_DEFAULT_DESCRIPTION: &str = "A helpful companion.";
pub const CUSTOM_DEFAULT_TONE: &str = "a neutral tone.";

const BUILTIN_DEFAULT_NAME: &str = "Mochi";
const BUILTIN_DEFAULT_DESCRIPTION: &str = "A caring companion.";
const BUILTIN_DEFAULT_TONE: &str = "an empathetic tone.";

/// One built-in persona.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PersonaEntry {
    pub name: String,
    pub description: String,
    pub tone: String,
    /// Shown in the persona picker; never part of the instruction.
    pub approach: String,
}

impl PersonaEntry {
    fn new(name: &str, description: &str, tone: &str, approach: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            tone: tone.to_string(),
            approach: approach.to_string(),
        }
    }
}

/// Immutable id → persona table.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    entries: Vec<(String, PersonaEntry)>,
}

impl PersonaRegistry {
    /// The three built-in companions.
    pub fn builtin() -> Self {
        let entries = vec![
            (
                "mochi".to_string(),
                PersonaEntry::new(
                    "Mochi",
                    "A calm, patient, and deeply empathetic listener. Your purpose is to provide \
                     a safe space and validate the user's feelings without judgment. You listen more \
                     than you speak, offering warmth and reassurance.",
                    "Gentle, reassuring, and soft",
                    "Active listening, validation, emotional support",
                ),
            ),
            (
                "sukun".to_string(),
                PersonaEntry::new(
                    "Sukun",
                    "A calm and grounding guide to help you find tranquility (Sukun) and peace in \
                     the present moment through mindfulness. You teach breathing exercises, meditation \
                     techniques, and help users stay present.",
                    "Soothing, wise, and centered",
                    "Mindfulness practices, breathing exercises, present-moment awareness",
                ),
            ),
            (
                "diya".to_string(),
                PersonaEntry::new(
                    "Diya",
                    "A small lamp (Diya) of hope. Here to help you find a spark of light and celebrate \
                     small wins, even on difficult days. You focus on gratitude, positive reframing, \
                     and finding silver linings.",
                    "Hopeful, gentle, and optimistic",
                    "Gratitude practices, celebrating small wins, positive psychology",
                ),
            ),
        ];
        Self { entries }
    }

    /// Look up a built-in persona by its lowercase id.
    pub fn get(&self, id: &str) -> Option<&PersonaEntry> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the caller's persona selection. Never fails.
    pub fn resolve(&self, input: &PersonaInput) -> PersonaDescriptor {
        let id = input
            .id
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        if id.starts_with(CUSTOM_PREFIX) {
            return PersonaDescriptor {
                name: non_empty_or(input.name.as_deref(), CUSTOM_DEFAULT_NAME),
                description: non_empty_or(input.description.as_deref(), CUSTOM_DEFAULT_DESCRIPTION),
                tone: non_empty_or(input.tone.as_deref(), CUSTOM_DEFAULT_TONE),
            };
        }

        let entry = match self.get(&id) {
            Some(entry) => Some(entry),
            None => {
                warn!(persona_id = %id, fallback = DEFAULT_PERSONA_ID, "Unknown persona, using default");
                self.get(DEFAULT_PERSONA_ID)
            }
        };

        PersonaDescriptor {
            name: non_empty_or(entry.map(|e| e.name.as_str()), BUILTIN_DEFAULT_NAME),
            description: non_empty_or(
                entry.map(|e| e.description.as_str()),
                BUILTIN_DEFAULT_DESCRIPTION,
            ),
            tone: non_empty_or(entry.map(|e| e.tone.as_str()), BUILTIN_DEFAULT_TONE),
        }
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Serializes as `{ "<id>": { name, description, tone, approach }, ... }` in registry order.
impl Serialize for PersonaRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, entry) in &self.entries {
            map.serialize_entry(id, entry)?;
        }
        map.end()
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
