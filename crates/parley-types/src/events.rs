use serde::{Deserialize, Serialize};

/// Events pushed from the server to connected WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A new message was posted
    #[serde(rename = "newMessage")]
    NewMessage {
        sender: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The online-users roster changed
    #[serde(rename = "updateOnline")]
    UpdateOnline(Vec<String>),

    /// Someone is typing
    #[serde(rename = "userTyping")]
    UserTyping { username: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Announce this connection as a named online user
    #[serde(rename = "userOnline")]
    UserOnline { username: String },

    /// Indicate typing; relayed to everyone else
    #[serde(rename = "userTyping")]
    UserTyping { username: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_format() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"userOnline","data":{"username":"alice"}}"#).unwrap();
        match cmd {
            GatewayCommand::UserOnline { username } => assert_eq!(username, "alice"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn roster_event_serializes_as_plain_list() {
        let event = GatewayEvent::UpdateOnline(vec!["alice".into(), "bob".into()]);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"updateOnline","data":["alice","bob"]}"#);
    }
}
