//! Factory Chain
//!
//! This module combines several instance factories into a priority-ordered
//! chain. When building a message, factories are probed in insertion order
//! and the first one that accepts the type tag builds it.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracebus_core::factory::{AllowedTypes, CommandFactoryChain};
//!
//! // User commands first, then a catch-all for everything else
//! let chain = CommandFactoryChain::new()
//!     .with_factory(UserCommandFactory::new())   // allows create_user, rename_user
//!     .with_factory(GenericCommandFactory::new()); // open allow-list
//!
//! let command = chain.build_from_positional(&[json!("create_user"), /* ... */])?;
//! ```
//!
//! # Precedence
//!
//! Insertion order is the only precedence rule. A factory added later is
//! consulted later even if its allow-list is more specific. Two explicit
//! allow-lists naming the same tag are reported when the second one is
//! registered: `add_factory` warns, `try_add_factory` refuses.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::args::tag_of;
use super::traits::{AllowedTypes, FactoryError, FactoryResult, InstanceFactory};
use crate::message::{Command, Query};

/// Name a chain reports when none was given.
pub const DEFAULT_CHAIN_NAME: &str = "chain";

/// A chain of instance factories with priority ordering
///
/// Factories are keyed by `InstanceFactory::name`. Registering a factory
/// whose name is already present replaces the earlier entry at its
/// original position.
pub struct FactoryChain<T: ?Sized + 'static> {
    name: String,
    allowed: AllowedTypes,
    factories: Vec<Arc<dyn InstanceFactory<T>>>,
}

/// Chain building commands
pub type CommandFactoryChain = FactoryChain<dyn Command>;

/// Chain building queries
pub type QueryFactoryChain = FactoryChain<dyn Query>;

impl<T: ?Sized + 'static> Default for FactoryChain<T> {
    fn default() -> Self {
        Self {
            name: DEFAULT_CHAIN_NAME.to_string(),
            allowed: AllowedTypes::open(),
            factories: Vec::new(),
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for FactoryChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryChain")
            .field("name", &self.name)
            .field("allowed", &self.allowed.to_string())
            .field("factories", &self.factory_names())
            .finish()
    }
}

impl<T: ?Sized + 'static> FactoryChain<T> {
    /// Create a new empty, open chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty chain with its own identity, needed when several
    /// chains are nested in one parent
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Restrict the tags this chain accepts when nested in another chain
    pub fn with_allowed_types(mut self, allowed: AllowedTypes) -> Self {
        self.allowed = allowed;
        self
    }

    /// Add a factory to the chain (builder pattern)
    ///
    /// Factories added first have higher priority.
    pub fn with_factory<F: InstanceFactory<T> + 'static>(mut self, factory: F) -> Self {
        self.add_factory(factory);
        self
    }

    /// Add a factory to the chain
    pub fn add_factory<F: InstanceFactory<T> + 'static>(&mut self, factory: F) {
        self.add_arc_factory(Arc::new(factory));
    }

    /// Add a pre-wrapped Arc factory
    pub fn add_arc_factory(&mut self, factory: Arc<dyn InstanceFactory<T>>) {
        if let Some(conflict) = self.explicit_conflict(factory.as_ref()) {
            tracing::warn!(
                chain = %self.name,
                tag = %conflict.0,
                existing = %conflict.1,
                added = %factory.name(),
                "Type accepted by more than one factory, the earlier one wins"
            );
        }
        self.insert(factory);
    }

    /// Add a factory, refusing it if an explicit allow-list already names
    /// one of its tags
    pub fn try_add_factory<F: InstanceFactory<T> + 'static>(&mut self, factory: F) -> FactoryResult<()> {
        if let Some((tag, existing)) = self.explicit_conflict(&factory) {
            return Err(FactoryError::AmbiguousType {
                tag,
                existing,
                added: factory.name().to_string(),
            });
        }
        self.insert(Arc::new(factory));
        Ok(())
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.factories.iter().position(|f| f.name() == name)
    }

    /// First tag explicitly listed by both `factory` and another entry
    fn explicit_conflict(&self, factory: &dyn InstanceFactory<T>) -> Option<(String, String)> {
        self.factories
            .iter()
            .filter(|f| f.name() != factory.name())
            .find_map(|existing| {
                existing
                    .allowed_types()
                    .overlap(factory.allowed_types())
                    .first()
                    .map(|tag| (tag.to_string(), existing.name().to_string()))
            })
    }

    fn insert(&mut self, factory: Arc<dyn InstanceFactory<T>>) {
        let position = match self.position_of(factory.name()) {
            Some(index) => {
                tracing::debug!(chain = %self.name, factory = %factory.name(), "Replacing factory in place");
                self.factories[index] = factory;
                index
            }
            None => {
                self.factories.push(factory);
                self.factories.len() - 1
            }
        };

        if let Some(open) = self.factories[..position]
            .iter()
            .find(|f| f.allowed_types().is_open())
        {
            tracing::warn!(
                chain = %self.name,
                shadowed = %self.factories[position].name(),
                catch_all = %open.name(),
                "Factory is shadowed by an earlier catch-all factory"
            );
        }
    }

    /// Get the number of factories in the chain
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Get a list of factory names in priority order
    pub fn factory_names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Iterate over the factories in priority order
    pub fn factories(&self) -> impl Iterator<Item = &dyn InstanceFactory<T>> + '_ {
        self.factories.iter().map(|f| f.as_ref())
    }

    /// Find the factory that would build `tag`, if any
    pub fn resolve(&self, tag: &str) -> Option<&dyn InstanceFactory<T>> {
        self.factories
            .iter()
            .find(|f| f.is_type_allowed(tag))
            .map(|f| f.as_ref())
    }
}

impl<T: ?Sized + 'static> InstanceFactory<T> for FactoryChain<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn allowed_types(&self) -> &AllowedTypes {
        &self.allowed
    }

    fn build_from_positional(&self, args: &[Value]) -> FactoryResult<Box<T>> {
        let tag = tag_of(args);

        match self.resolve(&tag) {
            Some(factory) => {
                tracing::debug!(chain = %self.name, tag = %tag, factory = %factory.name(), "Resolved factory");
                factory.build_from_positional(args)
            }
            None => {
                tracing::debug!(chain = %self.name, tag = %tag, "No factory accepts type");
                Err(FactoryError::FactoryNotFound(tag))
            }
        }
    }
}
