//! Commands, queries and their data transfer objects
//!
//! Every message carries a type tag (`message_type`) naming its variant
//! within a bounded context, e.g. `"create_user"`. Tags are case-sensitive
//! and only unique within one context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Normalized DTO key for the process correlation id.
pub const KEY_PROCESS_UUID: &str = "process_uuid";
/// Normalized DTO key for the entity id.
pub const KEY_UUID: &str = "uuid";
/// Normalized DTO key for the payload.
pub const KEY_PAYLOAD: &str = "payload";
/// Normalized DTO key for the schema version.
pub const KEY_VERSION: &str = "version";

/// Correlation id shared by every message of one business process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessUuid(Uuid);

impl ProcessUuid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProcessUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Free-form command payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Anything that can be dispatched.
pub trait Message: fmt::Debug + Send + Sync {
    /// The type tag this message was built for.
    fn message_type(&self) -> &str;

    /// Fully qualified Rust type of the concrete message.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn process_uuid(&self) -> Option<ProcessUuid>;
}

/// A state-changing message.
pub trait Command: Message {
    fn uuid(&self) -> Option<Uuid>;

    fn payload(&self) -> Option<&Payload>;

    fn version(&self) -> Option<u32> {
        None
    }
}

/// A read-only message.
pub trait Query: Message {}

/// Immutable attributes shared by concrete commands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandData {
    process_uuid: Option<ProcessUuid>,
    uuid: Option<Uuid>,
    payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
}

impl CommandData {
    pub fn new(process_uuid: Option<ProcessUuid>, uuid: Option<Uuid>, payload: Option<Payload>) -> Self {
        Self {
            process_uuid,
            uuid,
            payload,
            version: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn process_uuid(&self) -> Option<ProcessUuid> {
        self.process_uuid
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }
}

/// A data transfer object that can be flattened into ordered fields.
///
/// Field order matters: factories receive the values positionally, in
/// the order `normalize` returns them.
pub trait Dto {
    fn normalize(&self) -> Map<String, Value>;
}

impl Dto for Map<String, Value> {
    fn normalize(&self) -> Map<String, Value> {
        self.clone()
    }
}

impl Dto for CommandData {
    fn normalize(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            KEY_PROCESS_UUID.to_string(),
            self.process_uuid
                .map(|p| Value::String(p.to_string()))
                .unwrap_or(Value::Null),
        );
        fields.insert(
            KEY_UUID.to_string(),
            self.uuid.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null),
        );
        fields.insert(
            KEY_PAYLOAD.to_string(),
            self.payload
                .as_ref()
                .map(|p| Value::Object(p.as_map().clone()))
                .unwrap_or(Value::Null),
        );
        if let Some(version) = self.version {
            fields.insert(KEY_VERSION.to_string(), Value::from(version));
        }
        fields
    }
}
