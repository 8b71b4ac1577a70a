use crate::llm::SymptomAnalysis;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_CONTEXT: &str = "context";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Conversation partition. Records without one predate partitioning and read as `Chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    #[default]
    Chat,
    Mental,
}

impl Context {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Mental => "mental",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Context,
    pub role: Role,
    #[serde(rename = "message", alias = "content")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(
        rename = "timestamp",
        default,
        deserialize_with = "deserialize_server_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(user_id: String, role: Role, content: String, context: Context) -> Self {
        Self {
            id: None,
            user_id,
            context,
            role,
            content,
            created_at: client_now(),
            server_timestamp: None,
        }
    }

    pub fn user(user_id: String, content: String) -> Self {
        Self::new(user_id, Role::User, content, Context::Chat)
    }

    pub fn assistant(user_id: String, content: String) -> Self {
        Self::new(user_id, Role::Assistant, content, Context::Chat)
    }

    pub fn effective_timestamp(&self) -> i64 {
        effective_timestamp(self.server_timestamp, &self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub symptoms: String,
    pub analysis: SymptomAnalysis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(
        rename = "timestamp",
        default,
        deserialize_with = "deserialize_server_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl SymptomRecord {
    pub fn effective_timestamp(&self) -> i64 {
        effective_timestamp(self.server_timestamp, &self.created_at)
    }
}

/// Client clock in ISO-8601, the format of `createdAt`.
pub fn client_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Milliseconds since the epoch: server time if committed, else client time, else zero.
pub fn effective_timestamp(server: Option<DateTime<Utc>>, created_at: &str) -> i64 {
    server
        .or_else(|| parse_client_timestamp(created_at))
        .map(|ts| ts.timestamp_millis())
        .unwrap_or(0)
}

/// Same as [`effective_timestamp`], read straight from raw record fields.
pub fn effective_timestamp_of(data: &serde_json::Map<String, Value>) -> i64 {
    let server = data.get(FIELD_TIMESTAMP).and_then(parse_server_timestamp);
    let created_at = data
        .get(FIELD_CREATED_AT)
        .and_then(Value::as_str)
        .unwrap_or_default();
    effective_timestamp(server, created_at)
}

/// Accepts RFC 3339, a naive date-time (taken as UTC) or a bare date.
pub fn parse_client_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&ts));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| Utc.from_utc_datetime(&ts))
}

/// Server timestamps are stored as RFC 3339 strings; exported records may
/// carry `{seconds, nanoseconds}` objects or epoch milliseconds instead.
pub fn parse_server_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(obj) => {
            let seconds = obj.get("seconds").and_then(Value::as_i64)?;
            let nanos = obj
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).unwrap_or(0))
                .single()
        }
        _ => None,
    }
}

// Older records sometimes carry explicit nulls where the field is optional.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_server_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_server_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_legacy_record_reads_as_chat() {
        let msg: Message = serde_json::from_value(json!({
            "id": "a",
            "userId": "u1",
            "role": "user",
            "message": "hello",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(msg.context, Context::Chat);
        assert_eq!(msg.content, "hello");
        assert!(msg.server_timestamp.is_none());
    }

    #[test]
    fn test_null_context_and_created_at_read_as_defaults() {
        let msg: Message = serde_json::from_value(json!({
            "userId": "u1",
            "context": null,
            "role": "user",
            "message": "old",
            "createdAt": null
        }))
        .unwrap();
        assert_eq!(msg.context, Context::Chat);
        assert_eq!(msg.created_at, "");
        assert_eq!(msg.effective_timestamp(), 0);
    }

    #[test]
    fn test_content_alias_accepted() {
        let msg: Message = serde_json::from_value(json!({
            "userId": "u1",
            "context": "mental",
            "role": "assistant",
            "content": "breathe"
        }))
        .unwrap();
        assert_eq!(msg.context, Context::Mental);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "breathe");
    }

    #[test]
    fn test_server_timestamp_wins_over_created_at() {
        let mut msg = Message::user("u1".to_string(), "hi".to_string());
        msg.created_at = "2024-01-01T00:00:00Z".to_string();
        msg.server_timestamp = parse_client_timestamp("2024-06-01T00:00:00Z");
        assert_eq!(
            msg.effective_timestamp(),
            parse_client_timestamp("2024-06-01T00:00:00Z")
                .unwrap()
                .timestamp_millis()
        );
    }

    #[test]
    fn test_effective_timestamp_defaults_to_zero() {
        assert_eq!(effective_timestamp(None, ""), 0);
        assert_eq!(effective_timestamp(None, "yesterday"), 0);
    }

    #[test]
    fn test_parse_client_timestamp_formats() {
        let full = parse_client_timestamp("2024-01-02T00:00:00Z").unwrap();
        let naive = parse_client_timestamp("2024-01-02T00:00:00.000").unwrap();
        let date = parse_client_timestamp("2024-01-02").unwrap();
        assert_eq!(full, naive);
        assert_eq!(full, date);
    }

    #[test]
    fn test_parse_server_timestamp_shapes() {
        let expected = parse_client_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(
            parse_server_timestamp(&json!("2024-01-01T00:00:00.000000Z")),
            Some(expected)
        );
        assert_eq!(
            parse_server_timestamp(&json!({"seconds": 1704067200, "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(
            parse_server_timestamp(&json!(1704067200000_i64)),
            Some(expected)
        );
        assert_eq!(parse_server_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_effective_timestamp_of_raw_fields() {
        let data = json!({"createdAt": "2024-01-02T00:00:00Z"});
        let data = data.as_object().unwrap();
        assert_eq!(
            effective_timestamp_of(data),
            parse_client_timestamp("2024-01-02").unwrap().timestamp_millis()
        );
    }

    #[test]
    fn test_message_constructors() {
        let before = Utc::now().timestamp_millis();
        let msg = Message::assistant("u1".to_string(), "Hi there!".to_string());
        let after = Utc::now().timestamp_millis();

        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.context, Context::Chat);
        assert!(msg.id.is_none());
        let created = msg.effective_timestamp();
        assert!(created >= before - 1 && created <= after);
    }
}
