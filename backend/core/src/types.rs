use crate::error::HomhError;
use serde::{Deserialize, Serialize};

/// Inbound chat request, as posted by the web client to `/api/chat/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The current user utterance.
    pub message: String,
    #[serde(default)]
    pub persona: PersonaInput,
    /// Prior turns, oldest first. `null` entries are tolerated and skipped.
    #[serde(rename = "chatHistory", default)]
    pub chat_history: Vec<Option<ChatTurn>>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, persona: PersonaInput) -> Self {
        Self {
            message: message.into(),
            persona,
            chat_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, turns: impl IntoIterator<Item = ChatTurn>) -> Self {
        self.chat_history = turns.into_iter().map(Some).collect();
        self
    }

    /// Reject requests that can never produce a useful instruction.
    pub fn validate(&self) -> Result<(), HomhError> {
        if self.message.trim().is_empty() {
            return Err(HomhError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persona selection as sent by the caller.
///
/// For built-in personas only `id` is meaningful. Ids starting with `custom`
/// carry their own name, description and tone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

impl PersonaInput {
    pub fn builtin(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn custom(
        name: impl Into<String>,
        description: impl Into<String>,
        tone: impl Into<String>,
    ) -> Self {
        Self {
            id: Some("custom".to_string()),
            name: Some(name.into()),
            description: Some(description.into()),
            tone: Some(tone.into()),
        }
    }
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<String>,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![text.into()],
        }
    }

    /// The text used for history serialization. `None` only when the turn has no parts;
    /// an empty first part is still a turn.
    pub fn first_part(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }
}

/// A fully resolved persona. All fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDescriptor {
    pub name: String,
    pub description: String,
    pub tone: String,
}

/// A saved conversation document, stored verbatim as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedChat {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaInput>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_from_client_payload() {
        let raw = json!({
            "message": "hello",
            "persona": { "id": "sukun" },
            "chatHistory": [
                { "role": "user", "parts": ["hi"] },
                null,
                { "role": "model" }
            ]
        });
        let req: ChatRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.message, "hello");
        assert_eq!(req.persona.id.as_deref(), Some("sukun"));
        assert_eq!(req.chat_history.len(), 3);
        assert!(req.chat_history[1].is_none());
        assert!(req.chat_history[2].as_ref().unwrap().parts.is_empty());
    }

    #[test]
    fn test_missing_persona_defaults_to_empty() {
        let req: ChatRequest = serde_json::from_value(json!({ "message": "hey" })).unwrap();
        assert_eq!(req.persona, PersonaInput::default());
        assert!(req.chat_history.is_empty());
    }

    #[test]
    fn test_first_part_requires_parts_not_text() {
        assert_eq!(ChatTurn::new("user", "hi").first_part(), Some("hi"));
        assert_eq!(ChatTurn::new("user", "").first_part(), Some(""));
        assert_eq!(ChatTurn::default().first_part(), None);
    }
}
