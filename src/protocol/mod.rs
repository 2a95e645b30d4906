//! Newline-delimited JSON wire types for the control socket.

pub mod client_command;
pub mod error;
pub mod server_response;

use client_command::ClientCommand;
use error::ProtocolError;
use server_response::ServerResponse;

pub fn parse_command(json_str: &str) -> Result<ClientCommand, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(json_str)?;
    let Some(kind) = value.get("type").and_then(|kind| kind.as_str()) else {
        return Err(ProtocolError::MissingField("type".to_string()));
    };
    if !KNOWN_COMMANDS.contains(&kind) {
        return Err(ProtocolError::UnsupportedCommand(kind.to_string()));
    }
    serde_json::from_value(value).map_err(ProtocolError::from)
}

pub fn serialize_response(response: &ServerResponse) -> Result<String, ProtocolError> {
    serde_json::to_string(response).map_err(ProtocolError::from)
}

const KNOWN_COMMANDS: [&str; 12] = [
    "initialize",
    "shutdown",
    "home",
    "offset",
    "slew_hadec",
    "track_body",
    "set_focus",
    "stop",
    "stop_focus",
    "set_light",
    "report_status",
    "ping",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::command::CommandStatus;

    #[test]
    fn test_parse_slew_command() {
        let json = r#"{"type": "slew_hadec", "ha": -12.5, "dec": 40.0, "id": "req-1"}"#;
        let cmd = parse_command(json).unwrap();

        assert_eq!(cmd.id().map(String::as_str), Some("req-1"));
        match cmd {
            ClientCommand::SlewHadec { ha, dec, .. } => {
                assert_eq!(ha, -12.5);
                assert_eq!(dec, 40.0);
            }
            _ => panic!("Expected SlewHadec command"),
        }
    }

    #[test]
    fn test_parse_command_without_id() {
        let cmd = parse_command(r#"{"type": "track_body", "body": "sun"}"#).unwrap();
        assert!(cmd.id().is_none());
        assert_eq!(cmd.name(), "track_body");
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(matches!(
            parse_command(r#"{"type": "launch"}"#),
            Err(ProtocolError::UnsupportedCommand(kind)) if kind == "launch"
        ));
        assert!(matches!(
            parse_command(r#"{"ha": 1.0}"#),
            Err(ProtocolError::MissingField(_))
        ));
        assert!(matches!(
            parse_command("not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_command(r#"{"type": "set_focus"}"#),
            Err(ProtocolError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_status_response_shapes() {
        let ok = ServerResponse::from_status(Some("a".to_string()), CommandStatus::Succeeded);
        let json: serde_json::Value =
            serde_json::from_str(&serialize_response(&ok).unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["id"], "a");
        assert_eq!(json["data"]["code"], 0);

        let blocked = ServerResponse::from_status(None, CommandStatus::Blocked);
        let json: serde_json::Value =
            serde_json::from_str(&serialize_response(&blocked).unwrap()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "Blocked");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_serialize_error_response() {
        let response = ServerResponse::error(
            Some("test-id".to_string()),
            "Something went wrong".to_string(),
        );

        let json = serialize_response(&response).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
