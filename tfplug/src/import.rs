//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, PrivateStateData};
use std::collections::HashMap;

/// Private state key recording that the next read follows an import
pub const IMPORT_READ_KEY: &str = "isimportread";

/// Sets the import ID to a specific attribute in state and marks the
/// private state so the following read can tell it came from an import.
///
/// Example: ID "pcv1" -> state.validator_id = "pcv1"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::new(Dynamic::Map(HashMap::new()));

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    let private = match mark_import_read(PrivateStateData::new()) {
        Ok(private) => private,
        Err(diag) => {
            response.diagnostics.push(diag);
            return;
        }
    };

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private,
    });
}

/// Returns encoded private state carrying the import marker
pub fn mark_import_read(
    mut private: PrivateStateData,
) -> std::result::Result<Vec<u8>, Diagnostic> {
    private.set_key(IMPORT_READ_KEY, b"true".to_vec());
    private
        .encode()
        .map_err(|e| Diagnostic::error("Failed to encode private state", e.to_string()))
}

/// True when the private state carries the import marker. Undecodable
/// private state is treated as not imported.
pub fn is_import_read(private: &[u8]) -> bool {
    PrivateStateData::decode(private)
        .ok()
        .and_then(|p| p.get_key(IMPORT_READ_KEY).map(|v| v == b"true"))
        .unwrap_or(false)
}

/// Removes the import marker, keeping any other private keys
pub fn clear_import_read(private: &[u8]) -> std::result::Result<Vec<u8>, Diagnostic> {
    let mut p = PrivateStateData::decode(private)
        .map_err(|e| Diagnostic::error("Failed to decode private state", e.to_string()))?;
    p.remove_key(IMPORT_READ_KEY);
    p.encode()
        .map_err(|e| Diagnostic::error("Failed to encode private state", e.to_string()))
}
