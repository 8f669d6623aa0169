//! 事件 Schema 模块
//!
//! 负责遥测事件的结构、格式与大小校验：
//! - agent：`(A-)?[0-9a-f]{1,8}`（不区分大小写）
//! - user：可选，26 位 Crockford base32 ULID（不含 I、L、O、U）
//! - time / bid / mult：非负整数
//! - data：扁平键值表（JSON 编码后 ≤ 1024 字节）或 base64 字符串（解码后 ≤ 1024 字节）
//!
//! 所有错误都是同步返回的，本层不做重试。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::utils::time::now_millis;

/// data 字段编码后的最大字节数
pub const MAX_DATA_BYTES: usize = 1024;

const ALLOWED_FIELDS: &[&str] = &["agent", "user", "time", "bid", "mult", "data"];

fn agent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(a-)?[0-9a-f]{1,8}$").expect("agent id pattern"))
}

fn ulid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^[0-9a-hjkmnp-tv-z]{26}$").expect("ulid pattern"))
}

/// 字段级校验错误；批量校验时携带出错元素的下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub index: Option<usize>,
    pub field: String,
    pub message: String,
}

impl SchemaError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            index: None,
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// 标注批量输入中的位置（0 起）
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "event at index {}: {}: {}", index, self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

impl std::error::Error for SchemaError {}

/// data 键值表中的值：字符串或数字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Text(String),
    Number(Number),
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Text(value)
    }
}

impl From<u64> for DataValue {
    fn from(value: u64) -> Self {
        DataValue::Number(Number::from(value))
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Number(Number::from(value))
    }
}

/// 事件负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    /// 扁平键值表
    Fields(BTreeMap<String, DataValue>),
    /// base64 编码的二进制负载
    Encoded(String),
}

impl Default for EventData {
    fn default() -> Self {
        EventData::Fields(BTreeMap::new())
    }
}

impl EventData {
    /// 计算编码后的字节数：键值表按 JSON 字符串计，base64 按解码后计
    pub fn encoded_len(&self) -> Result<usize, SchemaError> {
        match self {
            EventData::Fields(fields) => serde_json::to_vec(fields)
                .map(|bytes| bytes.len())
                .map_err(|e| SchemaError::new("data", format!("cannot be encoded as JSON: {}", e))),
            EventData::Encoded(encoded) => general_purpose::STANDARD
                .decode(encoded)
                .map(|bytes| bytes.len())
                .map_err(|_| SchemaError::new("data", "must be a valid base64 string")),
        }
    }
}

/// 已校验的遥测事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryEvent {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub time: u64,
    pub bid: u64,
    pub mult: u64,
    pub data: EventData,
}

impl TelemetryEvent {
    /// 对已构造的事件重新校验（投递前的防御性检查）
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_agent(&self.agent)?;
        if let Some(user) = &self.user {
            validate_user_id(user)?;
        }
        check_data_size(&self.data)
    }
}

/// 构造事件时的部分输入
#[derive(Debug, Clone, Default)]
pub struct PartialEvent {
    pub agent: String,
    pub user: Option<String>,
    pub time: Option<u64>,
    pub bid: Option<u64>,
    pub mult: Option<u64>,
    pub data: Option<EventData>,
}

impl PartialEvent {
    pub fn new<S: Into<String>>(agent: S) -> Self {
        Self {
            agent: agent.into(),
            ..Default::default()
        }
    }
}

/// 校验单个候选事件
pub fn validate_event(candidate: &Value) -> Result<TelemetryEvent, SchemaError> {
    let object = candidate
        .as_object()
        .ok_or_else(|| SchemaError::new("event", "must be a JSON object"))?;

    if let Some(unknown) = object.keys().find(|key| !ALLOWED_FIELDS.contains(&key.as_str())) {
        return Err(SchemaError::new(unknown, "unknown field"));
    }

    let agent = match object.get("agent") {
        Some(Value::String(agent)) => agent.clone(),
        Some(_) => return Err(SchemaError::new("agent", "must be a string")),
        None => return Err(SchemaError::new("agent", "is required")),
    };
    check_agent(&agent)?;

    let user = match object.get("user") {
        None | Some(Value::Null) => None,
        Some(Value::String(user)) => {
            validate_user_id(user)?;
            Some(user.clone())
        }
        Some(_) => return Err(SchemaError::new("user", "must be a string")),
    };

    let time = required_u64(object.get("time"), "time")?;
    let bid = required_u64(object.get("bid"), "bid")?;
    let mult = required_u64(object.get("mult"), "mult")?;

    let data = match object.get("data") {
        Some(value) => parse_data(value)?,
        None => return Err(SchemaError::new("data", "is required")),
    };
    check_data_size(&data)?;

    Ok(TelemetryEvent {
        agent,
        user,
        time,
        bid,
        mult,
        data,
    })
}

/// 批量校验；遇到第一个非法元素即返回，错误中携带其下标
pub fn validate_events(candidates: &[Value]) -> Result<Vec<TelemetryEvent>, SchemaError> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| validate_event(candidate).map_err(|e| e.at_index(index)))
        .collect()
}

/// 用默认值补全事件（不做校验，调用方需另行调用 `validate_event`）
pub fn build_event(partial: PartialEvent) -> TelemetryEvent {
    TelemetryEvent {
        agent: partial.agent,
        user: partial.user,
        time: partial.time.unwrap_or_else(now_millis),
        bid: partial.bid.unwrap_or(0),
        mult: partial.mult.unwrap_or(0),
        data: partial.data.unwrap_or_default(),
    }
}

/// 去掉开头的一个 `A-` / `a-` 前缀
pub fn normalize_agent_id(agent_id: &str) -> String {
    agent_id
        .strip_prefix("A-")
        .or_else(|| agent_id.strip_prefix("a-"))
        .unwrap_or(agent_id)
        .to_string()
}

fn check_agent(agent: &str) -> Result<(), SchemaError> {
    if agent_pattern().is_match(agent) {
        Ok(())
    } else {
        Err(SchemaError::new(
            "agent",
            format!("'{}' must match (A-)?[0-9a-fA-F]{{1,8}}", agent),
        ))
    }
}

/// 校验用户 ULID（26 位 Crockford base32，不区分大小写）
pub fn validate_user_id(user: &str) -> Result<(), SchemaError> {
    if ulid_pattern().is_match(user) {
        Ok(())
    } else {
        Err(SchemaError::new(
            "user",
            format!("'{}' is not a 26-character Crockford base32 ULID", user),
        ))
    }
}

fn required_u64(value: Option<&Value>, field: &str) -> Result<u64, SchemaError> {
    match value {
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
            if number.as_i64().is_some() {
                SchemaError::new(field, "must be non-negative")
            } else {
                SchemaError::new(field, "must be an integer")
            }
        }),
        Some(_) => Err(SchemaError::new(field, "must be a non-negative integer")),
        None => Err(SchemaError::new(field, "is required")),
    }
}

fn parse_data(value: &Value) -> Result<EventData, SchemaError> {
    match value {
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (key, value) in map {
                let value = match value {
                    Value::String(text) => DataValue::Text(text.clone()),
                    Value::Number(number) => DataValue::Number(number.clone()),
                    _ => {
                        return Err(SchemaError::new(
                            "data",
                            format!("value of '{}' must be a string or a number", key),
                        ))
                    }
                };
                fields.insert(key.clone(), value);
            }
            Ok(EventData::Fields(fields))
        }
        Value::String(encoded) => Ok(EventData::Encoded(encoded.clone())),
        _ => Err(SchemaError::new("data", "must be an object or a base64 string")),
    }
}

fn check_data_size(data: &EventData) -> Result<(), SchemaError> {
    let len = data.encoded_len()?;
    if len > MAX_DATA_BYTES {
        return Err(SchemaError::new(
            "data",
            format!("encoded size {} bytes exceeds {} bytes", len, MAX_DATA_BYTES),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_candidate() -> Value {
        json!({
            "agent": "A-12345",
            "time": 1_700_000_000_000u64,
            "bid": 0,
            "mult": 1,
            "data": { "model": "sonnet", "tokens": 42 }
        })
    }

    fn with_field(field: &str, value: Value) -> Value {
        let mut candidate = valid_candidate();
        candidate[field] = value;
        candidate
    }

    #[test]
    fn accepts_agent_ids_with_and_without_prefix() {
        for agent in ["A-12345", "a-deadbeef", "0", "FFFFFFFF", "A-abc", "c1a0de"] {
            let candidate = with_field("agent", json!(agent));
            assert!(validate_event(&candidate).is_ok(), "应接受 agent={}", agent);
        }
    }

    #[test]
    fn rejects_malformed_agent_ids() {
        for agent in ["", "A-", "123456789", "A-123456789", "xyz", "A_123", "12-34", "B-12", " 12"] {
            let candidate = with_field("agent", json!(agent));
            let err = validate_event(&candidate).unwrap_err();
            assert_eq!(err.field, "agent", "agent={}", agent);
        }
    }

    #[test]
    fn validates_user_ulid() {
        let ok = with_field("user", json!("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        assert_eq!(
            validate_event(&ok).unwrap().user.as_deref(),
            Some("01ARZ3NDEKTSV4RRFFQ69G5FAV")
        );

        for user in [
            "01ARZ3NDEKTSV4RRFFQ69G5FAI",
            "01ARZ3NDEKTSV4RRFFQ69G5FAL",
            "01ARZ3NDEKTSV4RRFFQ69G5FAO",
            "01ARZ3NDEKTSV4RRFFQ69G5FAU",
            "01ARZ3NDEKTSV4RRFFQ69G5FA",
            "01ARZ3NDEKTSV4RRFFQ69G5FAVV",
        ] {
            let err = validate_event(&with_field("user", json!(user))).unwrap_err();
            assert_eq!(err.field, "user", "user={}", user);
            assert!(validate_user_id(user).is_err(), "user={}", user);
        }
        assert!(validate_user_id("01arz3ndektsv4rrffq69g5fav").is_ok());
    }

    #[test]
    fn missing_user_is_allowed() {
        let event = validate_event(&valid_candidate()).unwrap();
        assert!(event.user.is_none());
        let wire = serde_json::to_value(&event).unwrap();
        assert!(wire.get("user").is_none());
    }

    #[test]
    fn integer_fields_must_be_non_negative_integers() {
        for field in ["time", "bid", "mult"] {
            assert!(validate_event(&with_field(field, json!(-1))).is_err());
            assert!(validate_event(&with_field(field, json!(1.5))).is_err());
            assert!(validate_event(&with_field(field, json!("7"))).is_err());
        }
        let mut missing = valid_candidate();
        missing.as_object_mut().unwrap().remove("bid");
        assert_eq!(validate_event(&missing).unwrap_err().field, "bid");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = validate_event(&with_field("extra", json!(true))).unwrap_err();
        assert_eq!(err.field, "extra");
    }

    #[test]
    fn rejects_nested_data_values() {
        let err = validate_event(&with_field("data", json!({ "nested": { "a": 1 } }))).unwrap_err();
        assert_eq!(err.field, "data");
        assert!(validate_event(&with_field("data", json!({ "flag": true }))).is_err());
        assert!(validate_event(&with_field("data", json!([1, 2]))).is_err());
    }

    #[test]
    fn data_map_size_boundary_is_exact() {
        // {"k":""} 本身 8 字节，补齐到正好 1024
        let base = serde_json::to_vec(&json!({ "k": "" })).unwrap().len();
        let exact = "x".repeat(MAX_DATA_BYTES - base);
        let candidate = with_field("data", json!({ "k": exact }));
        assert_eq!(serde_json::to_vec(&candidate["data"]).unwrap().len(), 1024);
        assert!(validate_event(&candidate).is_ok());

        let over = "x".repeat(MAX_DATA_BYTES - base + 1);
        let candidate = with_field("data", json!({ "k": over }));
        assert_eq!(serde_json::to_vec(&candidate["data"]).unwrap().len(), 1025);
        let err = validate_event(&candidate).unwrap_err();
        assert_eq!(err.field, "data");
    }

    #[test]
    fn base64_data_is_measured_after_decoding() {
        let exact = general_purpose::STANDARD.encode(vec![7u8; MAX_DATA_BYTES]);
        assert!(validate_event(&with_field("data", json!(exact))).is_ok());

        let over = general_purpose::STANDARD.encode(vec![7u8; MAX_DATA_BYTES + 1]);
        assert!(validate_event(&with_field("data", json!(over))).is_err());

        let err = validate_event(&with_field("data", json!("not base64!!"))).unwrap_err();
        assert_eq!(err.field, "data");
    }

    #[test]
    fn build_then_validate_round_trip() {
        let event = build_event(PartialEvent::new("A-12345"));
        let validated = validate_event(&serde_json::to_value(&event).unwrap()).unwrap();

        assert_eq!(validated.bid, 0);
        assert_eq!(validated.mult, 0);
        assert_eq!(validated.data, EventData::Fields(BTreeMap::new()));
        let now = now_millis();
        assert!(now >= validated.time && now - validated.time < 5_000);
    }

    #[test]
    fn validate_events_reports_first_invalid_index() {
        let candidates = vec![
            valid_candidate(),
            with_field("agent", json!("not-hex")),
            valid_candidate(),
        ];
        let err = validate_events(&candidates).unwrap_err();
        assert_eq!(err.index, Some(1));
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn typed_events_revalidate() {
        let mut event = build_event(PartialEvent::new("A-1"));
        assert!(event.validate().is_ok());
        event.agent = "zz".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn normalize_strips_a_single_leading_prefix() {
        assert_eq!(normalize_agent_id("A-12345"), "12345");
        assert_eq!(normalize_agent_id("a-ff"), "ff");
        assert_eq!(normalize_agent_id("A-A-1"), "A-1");
        assert_eq!(normalize_agent_id("12A-3"), "12A-3");
        assert_eq!(normalize_agent_id("beef"), "beef");
    }
}
