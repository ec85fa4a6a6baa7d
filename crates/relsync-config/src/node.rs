// Helper functions for extracting values from KDL nodes

use kdl::{KdlDocument, KdlNode};

use crate::{ConfigError, ConfigResult};

pub(crate) fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// First positional argument as a non-negative integer.
pub(crate) fn get_first_u64_arg(node: &KdlNode) -> ConfigResult<u64> {
    let field = node.name().value();
    let value = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?
        .value();

    let int = value
        .as_integer()
        .ok_or_else(|| ConfigError::invalid(field, format!("expected an integer, got {}", value)))?;
    u64::try_from(int).map_err(|_| ConfigError::invalid(field, format!("{} is out of range", int)))
}

/// String argument of the child node called `name`, if present.
pub(crate) fn child_string(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name).and_then(get_first_string_arg)
}

/// Like [`child_string`], but the field must be present and non-empty.
pub(crate) fn required_child_string(doc: &KdlDocument, name: &str) -> ConfigResult<String> {
    child_string(doc, name)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingField(name.to_string()))
}
