//! Message instance factories
//!
//! Builds typed commands and queries from a type tag plus either a
//! normalized DTO or a positional argument list.
//!
//! - `InstanceFactory`: the contract each bounded context implements.
//! - `FactoryChain`: first-match composition of factories, itself a factory.
//! - `PositionalArgs`: typed reads over positional arguments.

pub mod args;
pub mod chain;
pub mod traits;

pub use args::{tag_of, PositionalArgs};
pub use chain::{CommandFactoryChain, FactoryChain, QueryFactoryChain, DEFAULT_CHAIN_NAME};
pub use traits::{AllowedTypes, FactoryError, FactoryResult, InstanceFactory};
