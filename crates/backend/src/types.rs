use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role string the backend stores for the human side of an exchange.
pub const USER_ROLE: &str = "user";
/// Role string the backend stores for the agent side of an exchange.
pub const MODEL_ROLE: &str = "model";

/// One turn sent to the agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentTurn {
    pub content: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl AgentTurn {
    /// Builds a user turn carrying the timestamp of the transcript entry it
    /// mirrors, so the stored exchange and the on-screen entry agree.
    pub fn user(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            role: USER_ROLE.to_string(),
            created_at,
        }
    }
}

/// Agent endpoint response. The backend also sends a role field; it is not
/// part of the client contract and is ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentReply {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Identity minted by `POST /users`. The backend echoes an empty session
/// alongside the id; only the id is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MintedIdentity {
    pub id: String,
}

/// One persisted message inside a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub role: String,
}

impl StoredMessage {
    /// Both `model` and `assistant` identify the agent side in stored
    /// history; older sessions carry the latter.
    pub fn is_model_side(&self) -> bool {
        matches!(self.role.as_str(), MODEL_ROLE | "assistant")
    }
}

/// One historical chat session as returned by `GET /chats`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// `PUT /users/{id}` body: the user turn followed by the model turn of one
/// settled exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeUpload {
    pub messages: Vec<StoredMessage>,
}

impl ExchangeUpload {
    pub fn new(user_turn: StoredMessage, model_turn: StoredMessage) -> Self {
        Self {
            messages: vec![user_turn, model_turn],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_record_decodes_backend_document_shape() {
        let payload = r#"[{
            "_id": "1",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:05:00Z",
            "messages": [
                {"content": "hi", "role": "user", "created_at": "2024-01-01T00:00:00Z"}
            ]
        }]"#;

        let sessions: Vec<SessionRecord> = serde_json::from_str(payload).expect("valid payload");
        assert_eq!(sessions.len(), 1);

        let session = &sessions[0];
        assert_eq!(session.id, "1");
        assert_eq!(
            session.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "hi");
        assert_eq!(session.messages[0].role, "user");
    }

    #[test]
    fn session_record_tolerates_missing_messages_and_unknown_fields() {
        let payload = r#"{
            "_id": "abc",
            "created_at": "2024-03-10T12:30:00Z",
            "updated_at": "2024-03-10T12:31:00Z",
            "extra_backend_field": 42
        }"#;

        let session: SessionRecord = serde_json::from_str(payload).expect("valid payload");
        assert_eq!(session.id, "abc");
        assert!(session.messages.is_empty());
    }

    #[test]
    fn minted_identity_ignores_session_echo() {
        let payload = r#"{
            "id": "65f0c0ffee",
            "created_at": "2024-03-10T12:30:00Z",
            "updated_at": "2024-03-10T12:30:00Z",
            "messages": []
        }"#;

        let identity: MintedIdentity = serde_json::from_str(payload).expect("valid payload");
        assert_eq!(identity.id, "65f0c0ffee");
    }

    #[test]
    fn agent_turn_serializes_wire_fields() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let turn = AgentTurn::user("hello", at);
        let value = serde_json::to_value(&turn).expect("serializable");

        assert_eq!(value["content"], "hello");
        assert_eq!(value["role"], "user");
        assert!(
            value["created_at"]
                .as_str()
                .expect("timestamp string")
                .starts_with("2024-01-01T00:00:00")
        );
    }

    #[test]
    fn exchange_upload_keeps_user_then_model_order() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let upload = ExchangeUpload::new(
            StoredMessage {
                created_at: at,
                content: "question".to_string(),
                role: USER_ROLE.to_string(),
            },
            StoredMessage {
                created_at: at,
                content: "answer".to_string(),
                role: MODEL_ROLE.to_string(),
            },
        );

        assert_eq!(upload.messages.len(), 2);
        assert_eq!(upload.messages[0].role, "user");
        assert_eq!(upload.messages[1].role, "model");
    }

    #[test]
    fn model_side_accepts_both_agent_role_spellings() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (role, expected) in [
            ("model", true),
            ("assistant", true),
            ("user", false),
            ("system", false),
        ] {
            let message = StoredMessage {
                created_at: at,
                content: String::new(),
                role: role.to_string(),
            };
            assert_eq!(message.is_model_side(), expected, "role {role}");
        }
    }
}
