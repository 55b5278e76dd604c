use anyhow::{Context as _, Result, anyhow};
use bot_core::{
    Anonymous, Event, MessageEvent, MessageScope, NoticeEvent, RequestEvent, SenderInfo,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_type: MessageScope,
    #[serde(default)]
    message_id: i64,
    user_id: i64,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    raw_message: Option<String>,
    #[serde(default)]
    sender: SenderInfo,
    #[serde(default)]
    anonymous: Option<Anonymous>,
}

/// Decodes one event-socket frame.
///
/// Frames that carry no event the bot cares about (heartbeats, api echoes,
/// unknown post types) decode to `None`.
///
/// # Errors
///
/// Returns an error for invalid JSON or a known post type with missing fields.
pub fn decode_frame(text: &str) -> Result<Option<Event>> {
    let value: Value = serde_json::from_str(text).context("frame is not JSON")?;
    let Some(post_type) = value.get("post_type").and_then(Value::as_str) else {
        return Ok(None);
    };
    match post_type {
        "message" => decode_message(value).map(|msg| Some(Event::Message(msg))),
        "notice" => Ok(Some(Event::Notice(NoticeEvent {
            notice_type: required_str(&value, "notice_type")?,
            sub_type: optional_str(&value, "sub_type"),
            payload: value,
        }))),
        "request" => Ok(Some(Event::Request(RequestEvent {
            request_type: required_str(&value, "request_type")?,
            sub_type: optional_str(&value, "sub_type"),
            payload: value,
        }))),
        "meta_event" => decode_meta(&value),
        _ => Ok(None),
    }
}

fn decode_message(value: Value) -> Result<MessageEvent> {
    let wire: WireMessage = serde_json::from_value(value).context("malformed message event")?;
    if wire.message_type == MessageScope::Group && wire.group_id.is_none() {
        return Err(anyhow!("group message without group_id"));
    }
    let raw_text = match wire.message {
        Value::String(text) => text,
        Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::Array(_)
        | Value::Object(_) => wire.raw_message.unwrap_or_default(),
    };
    Ok(MessageEvent {
        scope: wire.message_type,
        message_id: wire.message_id,
        actor_id: wire.user_id,
        group_id: match wire.message_type {
            MessageScope::Group => wire.group_id,
            MessageScope::Private => None,
        },
        raw_text,
        sender: wire.sender,
        anonymous: wire.anonymous,
    })
}

fn decode_meta(value: &Value) -> Result<Option<Event>> {
    let meta_type = value.get("meta_event_type").and_then(Value::as_str);
    let sub_type = value.get("sub_type").and_then(Value::as_str);
    if meta_type == Some("lifecycle") && sub_type == Some("connect") {
        let self_id = value
            .get("self_id")
            .and_then(Value::as_i64)
            .context("lifecycle event without self_id")?;
        return Ok(Some(Event::MetaConnect { self_id }));
    }
    Ok(None)
}

fn required_str(value: &Value, key: &str) -> Result<String> {
    optional_str(value, key).with_context(|| format!("event without {key}"))
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn group_message_decodes_sender_and_role() {
        let frame = json!({
            "post_type": "message",
            "message_type": "group",
            "sub_type": "normal",
            "message_id": 11,
            "group_id": 100,
            "user_id": 7,
            "anonymous": null,
            "message": "/ping [CQ:at,qq=1]",
            "raw_message": "/ping [CQ:at,qq=1]",
            "sender": {"user_id": 7, "nickname": "nick", "card": "", "role": "admin"}
        });
        let Some(Event::Message(msg)) = decode_frame(&frame.to_string()).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.scope, MessageScope::Group);
        assert_eq!(msg.target_id(), 100);
        assert_eq!(msg.raw_text, "/ping [CQ:at,qq=1]");
        assert_eq!(msg.sender.role.as_deref(), Some("admin"));
        assert!(msg.anonymous.is_none());
    }

    #[test]
    fn array_messages_fall_back_to_raw_message() {
        let frame = json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 5,
            "message": [{"type": "text", "data": {"text": "hi"}}],
            "raw_message": "hi",
            "sender": {"nickname": "n"}
        });
        let Some(Event::Message(msg)) = decode_frame(&frame.to_string()).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.raw_text, "hi");
        assert_eq!(msg.target_id(), 5);
    }

    #[test]
    fn group_message_needs_group_id() {
        let frame = json!({
            "post_type": "message",
            "message_type": "group",
            "user_id": 5,
            "message": "hi"
        });
        assert!(decode_frame(&frame.to_string()).is_err());
    }

    #[test]
    fn lifecycle_connect_carries_self_id() {
        let frame = json!({
            "post_type": "meta_event",
            "meta_event_type": "lifecycle",
            "sub_type": "connect",
            "self_id": 42
        });
        assert_eq!(
            decode_frame(&frame.to_string()).unwrap(),
            Some(Event::MetaConnect { self_id: 42 })
        );
        let heartbeat = json!({"post_type": "meta_event", "meta_event_type": "heartbeat", "self_id": 42});
        assert_eq!(decode_frame(&heartbeat.to_string()).unwrap(), None);
    }

    #[test]
    fn notices_keep_their_payload() {
        let frame = json!({
            "post_type": "notice",
            "notice_type": "group_decrease",
            "sub_type": "kick",
            "group_id": 100,
            "user_id": 9
        });
        let Some(Event::Notice(notice)) = decode_frame(&frame.to_string()).unwrap() else {
            panic!("expected a notice");
        };
        assert_eq!(notice.notice_type, "group_decrease");
        assert_eq!(notice.sub_type.as_deref(), Some("kick"));
        assert_eq!(notice.payload["user_id"], 9);
    }

    #[test]
    fn api_echoes_and_garbage() {
        assert_eq!(
            decode_frame(r#"{"status":"ok","retcode":0,"data":null}"#).unwrap(),
            None
        );
        assert!(decode_frame("not json").is_err());
    }
}
