use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type")]
pub enum ClientInboundMessage {
    /// First message a client must send: who it is.
    #[serde(rename = "identify")]
    Identify { user_id: Uuid },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgement sent once a client is identified and joined to its rooms.
pub struct IdentifyAck {
    pub user_id: Uuid,
    /// Rooms the connection was subscribed to.
    pub rooms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_message_parses() {
        let user_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"identify","user_id":"{user_id}"}}"#);
        let message: ClientInboundMessage = serde_json::from_str(&raw).unwrap();
        assert!(matches!(
            message,
            ClientInboundMessage::Identify { user_id: id } if id == user_id
        ));
    }

    #[test]
    fn unknown_messages_do_not_fail_parsing() {
        let message: ClientInboundMessage =
            serde_json::from_str(r#"{"type":"something-else"}"#).unwrap();
        assert!(matches!(message, ClientInboundMessage::Unknown));
    }
}
