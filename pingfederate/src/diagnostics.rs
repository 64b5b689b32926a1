//! Conversion of API failures into Terraform diagnostics

use regex::Regex;
use std::sync::OnceLock;
use tfplug::types::{AttributePath, Diagnostic};

use crate::api::ApiError;

pub const INVALID_PROVIDER_CONFIGURATION: &str = "Invalid provider configuration";
pub const INVALID_ATTRIBUTE_CONFIGURATION: &str = "Invalid attribute configuration";
pub const CONFIGURATION_WARNING: &str = "Configuration warning";
pub const PINGFEDERATE_API_ERROR: &str = "PingFederate API error";
pub const PINGFEDERATE_VALIDATION_ERROR: &str = "PingFederate validation error";
pub const INTERNAL_PROVIDER_ERROR: &str = "Internal provider error";
pub const RESOURCE_NOT_FOUND: &str = "Resource not found";

fn lower_or_digit_to_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("identifier pattern is valid"))
}

/// `pluginDescriptorRef.id` -> `plugin_descriptor_ref.id`
pub fn to_terraform_identifier(pf_identifier: &str) -> String {
    lower_or_digit_to_upper()
        .replace_all(pf_identifier, "${1}_${2}")
        .to_lowercase()
}

/// Maps a PingFederate field path onto a Terraform attribute path. The first
/// segment becomes the root attribute and the rest map keys.
pub fn field_path_to_attribute_path(field_path: &str, custom_id: Option<&str>) -> AttributePath {
    let field_path = match custom_id {
        Some(id) if field_path == "id" => id,
        _ => field_path,
    };
    let identifier = to_terraform_identifier(field_path);
    let mut steps = identifier.split('.');
    let mut path = AttributePath::new(steps.next().unwrap_or_default());
    for step in steps {
        path = path.key(step);
    }
    path
}

fn http_status(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status) {
        Ok(code) => match code.canonical_reason() {
            Some(reason) => format!("{} {}", status, reason),
            None => status.to_string(),
        },
        Err(_) => status.to_string(),
    }
}

/// Converts an API error into diagnostics. Validation errors are reported one
/// per entry, attributed to the matching attribute when the server named a
/// field. `custom_id` names the attribute that holds the server's `id`.
pub fn report_api_error(
    summary: &str,
    error: &ApiError,
    custom_id: Option<&str>,
) -> Vec<Diagnostic> {
    let (status, body, details) = match error {
        ApiError::ApiError {
            status,
            body,
            details,
        } => (*status, body.as_str(), details.as_deref().cloned()),
        ApiError::NotFound { body } => (
            404,
            body.as_str(),
            serde_json::from_str(body).ok(),
        ),
        _ => {
            return vec![Diagnostic::error(
                PINGFEDERATE_API_ERROR,
                format!("{}\n{}", summary, error),
            )]
        }
    };

    tracing::debug!("Error HTTP response body: {}", body);

    let Some(details) = details else {
        return vec![Diagnostic::error(
            PINGFEDERATE_API_ERROR,
            format!("{}\n{} - Detail:\n{}", summary, error, body),
        )];
    };

    let status = http_status(status);

    if details.validation_errors.is_empty() {
        return vec![Diagnostic::error(
            PINGFEDERATE_API_ERROR,
            format!(
                "Error summary: {}\nMessage: {}\nHTTP status: {}\nResult ID: {}",
                summary, details.message, status, details.result_id
            ),
        )];
    }

    details
        .validation_errors
        .iter()
        .map(|validation| {
            let mut detail = format!(
                "Error summary: {}\nMessage: {}\nHTTP status: {}",
                summary, validation.message, status
            );
            if !validation.field_path.is_empty() {
                detail.push_str("\nPingFederate field path: ");
                detail.push_str(&validation.field_path);
            }
            if !validation.error_id.is_empty() {
                detail.push_str("\nError ID: ");
                detail.push_str(&validation.error_id);
            }
            if !validation.developer_message.is_empty() {
                detail.push_str("\nDeveloper message: ");
                detail.push_str(&validation.developer_message);
            }

            let diag = Diagnostic::error(PINGFEDERATE_VALIDATION_ERROR, detail);
            if validation.field_path.is_empty() {
                diag
            } else {
                diag.with_attribute(field_path_to_attribute_path(
                    &validation.field_path,
                    custom_id,
                ))
            }
        })
        .collect()
}

/// Warning emitted when a read finds the object gone from the server
pub fn resource_not_found_warning(resource_type: &str) -> Diagnostic {
    Diagnostic::warning(
        RESOURCE_NOT_FOUND,
        format!(
            "The requested {} resource configuration cannot be found in the PingFederate service.  If the requested resource is managed in Terraform's state, it may have been removed outside of Terraform.",
            resource_type
        ),
    )
}

/// Error for values that could not be converted to or from Terraform values
pub fn internal_error(detail: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error(INTERNAL_PROVIDER_ERROR, detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::{PingFederateErrorResponse, ValidationError};
    use tfplug::types::DiagnosticSeverity;

    fn validation_failure(errors: Vec<ValidationError>) -> ApiError {
        ApiError::ApiError {
            status: 422,
            body: "{}".to_string(),
            details: Some(Box::new(PingFederateErrorResponse {
                result_id: "validation_error".to_string(),
                message: "Validation error(s) occurred.".to_string(),
                validation_errors: errors,
            })),
        }
    }

    #[test]
    fn identifiers_become_snake_case() {
        assert_eq!(
            to_terraform_identifier("pluginDescriptorRef.id"),
            "plugin_descriptor_ref.id"
        );
        assert_eq!(to_terraform_identifier("x509File"), "x509_file");
        assert_eq!(to_terraform_identifier("name"), "name");
    }

    #[test]
    fn field_paths_split_into_root_and_keys() {
        let path = field_path_to_attribute_path("attributeContract.extendedAttributes", None);
        assert_eq!(
            path.to_string(),
            "attribute_contract[\"extended_attributes\"]"
        );

        let id_path = field_path_to_attribute_path("id", Some("validator_id"));
        assert_eq!(id_path.to_string(), "validator_id");
    }

    #[test]
    fn each_validation_error_is_reported() {
        let error = validation_failure(vec![
            ValidationError {
                message: "Duplicate id".to_string(),
                field_path: "id".to_string(),
                error_id: "duplicate_id".to_string(),
                ..Default::default()
            },
            ValidationError {
                message: "Bad value".to_string(),
                developer_message: "check the docs".to_string(),
                ..Default::default()
            },
        ]);

        let diags = report_api_error(
            "An error occurred while creating the Password Credential Validator",
            &error,
            Some("validator_id"),
        );

        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].summary, PINGFEDERATE_VALIDATION_ERROR);
        assert_eq!(
            diags[0].detail,
            "Error summary: An error occurred while creating the Password Credential Validator\nMessage: Duplicate id\nHTTP status: 422 Unprocessable Entity\nPingFederate field path: id\nError ID: duplicate_id"
        );
        assert_eq!(
            diags[0].attribute.as_ref().map(|p| p.to_string()),
            Some("validator_id".to_string())
        );
        assert!(diags[1].attribute.is_none());
        assert!(diags[1].detail.ends_with("\nDeveloper message: check the docs"));
    }

    #[test]
    fn error_body_without_validation_errors_is_one_diagnostic() {
        let error = validation_failure(vec![]);
        let diags = report_api_error("summary", &error, None);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, PINGFEDERATE_API_ERROR);
        assert!(diags[0].detail.ends_with("Result ID: validation_error"));
    }

    #[test]
    fn unparsable_body_is_included_verbatim() {
        let error = ApiError::ApiError {
            status: 500,
            body: "<html>oops</html>".to_string(),
            details: None,
        };
        let diags = report_api_error("summary", &error, None);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.starts_with("summary\n"));
        assert!(diags[0].detail.ends_with(" - Detail:\n<html>oops</html>"));
    }

    #[test]
    fn errors_without_response_report_the_error() {
        let diags = report_api_error("summary", &ApiError::Timeout(30), None);
        assert_eq!(diags[0].detail, "summary\nRequest timeout after 30 seconds");
    }

    #[test]
    fn not_found_warning_is_a_warning() {
        let diag = resource_not_found_warning("Password Credential Validator");
        assert_eq!(diag.severity, DiagnosticSeverity::Warning);
        assert!(diag.detail.contains("Password Credential Validator"));
    }
}
