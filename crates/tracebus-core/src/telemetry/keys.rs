//! Attribute keys, component tags and event names used on dispatch spans.

/// Process correlation id of the traced message.
pub const PROCESS_UUID: &str = "process_uuid";
/// Component kind that produced the span.
pub const COMPONENT: &str = "component";
/// Entity id the traced command targets.
pub const ENTITY_UUID: &str = "entity_uuid";
/// Concrete command type.
pub const COMMAND: &str = "command";
/// Type tag of the traced message.
pub const MESSAGE_TYPE: &str = "message_type";
/// Type name of the command whose handler failed.
pub const COMMAND_FAILED: &str = "command.failed";

/// Option flag controlling whether operation names get a caller prefix.
pub const ADD_CLASSNAME_TO_OPERATION: &str = "add_classname_to_operation";

pub mod component {
    pub const COMMAND_BUS: &str = "command_bus";
}

pub mod event {
    /// Emitted on a dispatch span when its handler fails.
    pub const COMMAND_ERROR: &str = "command.error";

    pub const MESSAGE: &str = "message";
    pub const CODE: &str = "code";
    pub const FILE: &str = "file";
    pub const LINE: &str = "line";
}
