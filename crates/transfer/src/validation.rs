use std::path::{Component, Path};

use crate::TransferError;

/// Validates a file name announced by a sender.
///
/// The receiver writes every transfer directly into its output directory, so
/// the name must be exactly one plain path component: no separators, no `.`
/// or `..`, no root or drive prefix.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }
    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}
