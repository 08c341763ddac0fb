use serde_json::Value;

use crate::types::Direction;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello {
        name: String,
    },
    Start {
        level: Option<u32>,
        seed: Option<u32>,
    },
    Input {
        dir: Direction,
    },
    Pause,
    Resume,
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = object.get("name")?.as_str()?.to_string();
            Some(ParsedClientMessage::Hello { name })
        }
        "start" => {
            let level = match object.get("level") {
                None => None,
                Some(value) => {
                    let parsed = value.as_u64()?;
                    if parsed == 0 {
                        return None;
                    }
                    Some(u32::try_from(parsed).ok()?)
                }
            };
            let seed = match object.get("seed") {
                None => None,
                Some(value) => Some(u32::try_from(value.as_u64()?).ok()?),
            };
            Some(ParsedClientMessage::Start { level, seed })
        }
        "input" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Input { dir })
        }
        "pause" => Some(ParsedClientMessage::Pause),
        "resume" => Some(ParsedClientMessage::Resume),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_requires_a_name() {
        assert_eq!(
            parse_client_message(r#"{"type":"hello","name":"Alice"}"#),
            Some(ParsedClientMessage::Hello {
                name: "Alice".to_string()
            })
        );
        assert_eq!(parse_client_message(r#"{"type":"hello"}"#), None);
    }

    #[test]
    fn start_accepts_optional_level_and_seed() {
        assert_eq!(
            parse_client_message(r#"{"type":"start"}"#),
            Some(ParsedClientMessage::Start {
                level: None,
                seed: None
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"start","level":2,"seed":99}"#),
            Some(ParsedClientMessage::Start {
                level: Some(2),
                seed: Some(99)
            })
        );
        assert_eq!(parse_client_message(r#"{"type":"start","level":0}"#), None);
        assert_eq!(
            parse_client_message(r#"{"type":"start","level":"two"}"#),
            None
        );
    }

    #[test]
    fn input_parses_cardinal_directions() {
        assert_eq!(
            parse_client_message(r#"{"type":"input","dir":"left"}"#),
            Some(ParsedClientMessage::Input {
                dir: Direction::Left
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"input","dir":"sideways"}"#),
            None
        );
        assert_eq!(parse_client_message(r#"{"type":"input"}"#), None);
    }

    #[test]
    fn pause_resume_and_ping_round_trip() {
        assert_eq!(
            parse_client_message(r#"{"type":"pause"}"#),
            Some(ParsedClientMessage::Pause)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"resume"}"#),
            Some(ParsedClientMessage::Resume)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"ping","t":12.5}"#),
            Some(ParsedClientMessage::Ping { t: 12.5 })
        );
        assert_eq!(parse_client_message(r#"{"type":"ping","t":"NaN"}"#), None);
    }

    #[test]
    fn unknown_and_malformed_payloads_are_rejected() {
        assert_eq!(parse_client_message(r#"{"type":"teleport"}"#), None);
        assert_eq!(parse_client_message("not json"), None);
        assert_eq!(parse_client_message("[1,2,3]"), None);
    }
}
