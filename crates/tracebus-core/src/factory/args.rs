//! Typed access to positional factory arguments.

use serde_json::Value;
use uuid::Uuid;

use super::traits::{FactoryError, FactoryResult};
use crate::message::{Payload, ProcessUuid};

/// Derive the type tag from the first positional argument.
///
/// Strings are taken as-is, `null` and a missing argument give the empty
/// tag, other scalars use their JSON rendering.
pub fn tag_of(args: &[Value]) -> String {
    match args.first() {
        Some(Value::String(tag)) => tag.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Read-only view over a positional argument list.
///
/// Index 0 is the tag; the accessors below take indexes into the full
/// list. Optional accessors treat a missing index and `null` alike.
#[derive(Debug, Clone, Copy)]
pub struct PositionalArgs<'a> {
    args: &'a [Value],
}

impl<'a> PositionalArgs<'a> {
    pub fn new(args: &'a [Value]) -> Self {
        Self { args }
    }

    pub fn tag(&self) -> String {
        tag_of(self.args)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index).filter(|v| !v.is_null())
    }

    fn invalid(&self, index: usize, reason: &str) -> FactoryError {
        FactoryError::invalid_arguments(self.tag(), format!("argument {}: {}", index, reason))
    }

    pub fn string(&self, index: usize) -> FactoryResult<Option<&'a str>> {
        match self.get(index) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.invalid(index, "expected a string")),
        }
    }

    pub fn uuid(&self, index: usize) -> FactoryResult<Option<Uuid>> {
        match self.string(index)? {
            None => Ok(None),
            Some(s) => Uuid::parse_str(s)
                .map(Some)
                .map_err(|e| self.invalid(index, &e.to_string())),
        }
    }

    pub fn process_uuid(&self, index: usize) -> FactoryResult<Option<ProcessUuid>> {
        Ok(self.uuid(index)?.map(ProcessUuid::from_uuid))
    }

    pub fn payload(&self, index: usize) -> FactoryResult<Option<Payload>> {
        match self.get(index) {
            None => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(Payload::new(fields.clone()))),
            Some(_) => Err(self.invalid(index, "expected an object")),
        }
    }

    pub fn version(&self, index: usize) -> FactoryResult<Option<u32>> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(index, "expected an unsigned version number")),
        }
    }

    /// Fail unless the argument at `index` is present and not `null`.
    pub fn require(&self, index: usize) -> FactoryResult<&'a Value> {
        self.get(index).ok_or_else(|| self.invalid(index, "missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_of() {
        assert_eq!(tag_of(&[json!("create_user"), json!(1)]), "create_user");
        assert_eq!(tag_of(&[json!(42)]), "42");
        assert_eq!(tag_of(&[json!(null)]), "");
        assert_eq!(tag_of(&[]), "");
    }

    #[test]
    fn test_typed_accessors() {
        let uuid = Uuid::new_v4();
        let args = [
            json!("create_user"),
            json!(uuid.to_string()),
            json!({"name": "Ada"}),
            json!(2),
            json!(null),
        ];
        let args = PositionalArgs::new(&args);

        assert_eq!(args.tag(), "create_user");
        assert_eq!(args.uuid(1).unwrap(), Some(uuid));
        assert_eq!(args.payload(2).unwrap().unwrap().get("name"), Some(&json!("Ada")));
        assert_eq!(args.version(3).unwrap(), Some(2));
        assert_eq!(args.uuid(4).unwrap(), None);
        assert_eq!(args.payload(9).unwrap(), None);
    }

    #[test]
    fn test_invalid_arguments() {
        let args = [json!("create_user"), json!("not-a-uuid"), json!("text"), json!(-1)];
        let args = PositionalArgs::new(&args);

        assert!(matches!(args.uuid(1), Err(FactoryError::InvalidArguments { .. })));
        assert!(matches!(args.payload(2), Err(FactoryError::InvalidArguments { .. })));
        assert!(matches!(args.version(3), Err(FactoryError::InvalidArguments { .. })));
        assert!(matches!(args.require(7), Err(FactoryError::InvalidArguments { .. })));
    }
}
