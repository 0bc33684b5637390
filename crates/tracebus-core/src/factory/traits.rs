//! Core traits for message instance factories
//!
//! This module defines the contract every factory implements, whether it
//! builds one family of commands itself or delegates to a chain of other
//! factories. The design follows the provider pattern: factories declare
//! which type tags they accept and can be composed in priority order.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::message::Dto;

/// Errors that can occur while building a message instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// No factory in the chain accepts the type tag
    #[error("No factory found for type: {0}")]
    FactoryNotFound(String),

    /// A registration would make a type tag resolvable by two explicit allow-lists
    #[error("Type {tag} is already accepted by factory {existing}, refusing {added}")]
    AmbiguousType {
        tag: String,
        existing: String,
        added: String,
    },

    /// A leaf factory could not read its positional arguments
    #[error("Invalid arguments for {tag}: {reason}")]
    InvalidArguments { tag: String, reason: String },
}

impl FactoryError {
    /// Create an invalid arguments error
    pub fn invalid_arguments(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        FactoryError::InvalidArguments {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error means a registration is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, FactoryError::FactoryNotFound(_))
    }
}

/// Result type for factory operations
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Ordered set of type tags a factory accepts.
///
/// The empty set accepts every tag, which makes the factory a catch-all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedTypes(Vec<String>);

impl AllowedTypes {
    /// Accept every type tag
    pub fn open() -> Self {
        Self::default()
    }

    /// Accept exactly the given tags. Duplicates keep their first position.
    pub fn of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !set.contains(&tag) {
                set.push(tag);
            }
        }
        Self(set)
    }

    pub fn is_open(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allows(&self, tag: &str) -> bool {
        self.is_open() || self.0.iter().any(|t| t == tag)
    }

    /// Tags listed explicitly by both sets. Open sets never overlap.
    pub fn overlap<'a>(&'a self, other: &AllowedTypes) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|t| other.0.contains(t))
            .map(|t| t.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for AllowedTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            f.write_str("*")
        } else {
            f.write_str(&self.0.join(","))
        }
    }
}

/// Builds message instances of kind `T` from a type tag and its arguments.
///
/// # Arguments
///
/// Positional argument lists always start with the type tag; the remaining
/// values are whatever the concrete message needs, in the order the
/// normalized DTO listed them.
///
/// # Error Handling
///
/// A factory that accepts a tag but cannot read its arguments returns
/// `FactoryError::InvalidArguments`. Only chains return `FactoryNotFound`.
pub trait InstanceFactory<T: ?Sized>: Send + Sync {
    /// Identity of this factory within a chain
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Tags this factory accepts
    fn allowed_types(&self) -> &AllowedTypes;

    /// Check if `tag` is accepted by this factory
    fn is_type_allowed(&self, tag: &str) -> bool {
        self.allowed_types().allows(tag)
    }

    /// Build an instance from positional arguments, the first being the tag
    fn build_from_positional(&self, args: &[Value]) -> FactoryResult<Box<T>>;

    /// Build an instance from normalized fields
    ///
    /// The tag is prepended to the field values, taken in insertion order.
    fn build_from_normalized(&self, tag: &str, fields: &Map<String, Value>) -> FactoryResult<Box<T>> {
        let mut args = Vec::with_capacity(fields.len() + 1);
        args.push(Value::String(tag.to_string()));
        args.extend(fields.values().cloned());
        self.build_from_positional(&args)
    }

    /// Build an instance from a DTO
    fn build_from_dto(&self, tag: &str, dto: &dyn Dto) -> FactoryResult<Box<T>> {
        self.build_from_normalized(tag, &dto.normalize())
    }
}
