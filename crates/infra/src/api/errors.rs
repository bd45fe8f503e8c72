//! Backend error envelope parsing and classification
//!
//! Every non-2xx response is turned into a [`DomainError`] here. The rules,
//! applied in order:
//!
//! 1. `validation_error` envelopes → `Validation` with field details
//! 2. 401, or an authorization code → `Authorization`
//! 3. status >= 500 → `Server` (envelope or not)
//! 4. any other envelope code → `BusinessRule`
//! 5. no envelope → `Unknown`

use medool_domain::error_codes::{
    message_for_code, AUTHORIZATION_CODES, GENERIC_ERROR_MESSAGE, UNAUTHORIZED, VALIDATION_ERROR,
};
use medool_domain::{DomainError, ErrorKind, FieldErrors};
use serde::Deserialize;

/// `{ "error": { "code", "message", "details"? } }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<FieldErrors>,
}

impl ErrorEnvelope {
    /// `None` for anything that is not exactly the envelope shape.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// Map a failed response onto the error taxonomy.
pub fn classify_response(status: u16, body: &[u8]) -> DomainError {
    let envelope = ErrorEnvelope::parse(body);

    let error = match envelope {
        Some(ErrorEnvelope { error }) => classify_envelope(status, error),
        None if status == 401 => {
            DomainError::new(ErrorKind::Authorization, message_for_code(Some(UNAUTHORIZED)))
                .with_technical(opaque_technical(status, body))
        }
        None if status >= 500 => DomainError::new(ErrorKind::Server, GENERIC_ERROR_MESSAGE)
            .with_technical(opaque_technical(status, body)),
        None => DomainError::unknown(opaque_technical(status, body)),
    };

    error.with_status(status)
}

fn classify_envelope(status: u16, body: ErrorBody) -> DomainError {
    let ErrorBody { code, message, details } = body;
    let technical = format!("{code}: {message}");

    if code == VALIDATION_ERROR {
        return DomainError::validation(details).with_technical(technical);
    }

    let kind = if status == 401 || AUTHORIZATION_CODES.contains(&code.as_str()) {
        ErrorKind::Authorization
    } else if status >= 500 {
        ErrorKind::Server
    } else {
        ErrorKind::BusinessRule
    };

    DomainError::from_code(kind, code).with_technical(technical)
}

fn opaque_technical(status: u16, body: &[u8]) -> String {
    const PREVIEW: usize = 200;
    let text = String::from_utf8_lossy(body);
    let preview: String = text.chars().take(PREVIEW).collect();
    format!("HTTP {status} without error envelope: {preview}")
}

#[cfg(test)]
mod tests {
    use medool_domain::error_codes::VALIDATION_FALLBACK_MESSAGE;
    use serde_json::json;

    use super::*;

    fn envelope(code: &str, details: Option<serde_json::Value>) -> Vec<u8> {
        let mut error = json!({"code": code, "message": format!("server says {code}")});
        if let Some(details) = details {
            error["details"] = details;
        }
        serde_json::to_vec(&json!({ "error": error })).unwrap()
    }

    /// Validates validation envelope mapping.
    ///
    /// Assertions:
    /// - Kind is `Validation` and the message names the first field.
    /// - Field messages keep server order.
    #[test]
    fn validation_envelope_surfaces_first_field() {
        let body = envelope(
            "validation_error",
            Some(json!({"phone": ["must be 10 digits"], "city": ["is required"]})),
        );

        let error = classify_response(422, &body);

        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.user_message, "Phone: must be 10 digits");
        assert_eq!(error.status, Some(422));
        assert_eq!(
            error.field_messages(),
            vec![
                ("phone".to_string(), "must be 10 digits".to_string()),
                ("city".to_string(), "is required".to_string()),
            ]
        );
    }

    #[test]
    fn validation_envelope_without_details_uses_fallback() {
        let error = classify_response(400, &envelope("validation_error", None));
        assert_eq!(error.user_message, VALIDATION_FALLBACK_MESSAGE);
    }

    #[test]
    fn business_rule_codes_use_message_table() {
        let error = classify_response(409, &envelope("quote_expired", None));

        assert_eq!(error.kind, ErrorKind::BusinessRule);
        assert_eq!(error.code.as_deref(), Some("quote_expired"));
        assert_eq!(error.user_message, "Quote expired. Please create a new quote.");
        assert!(error.technical.as_deref().unwrap_or_default().contains("server says"));
    }

    #[test]
    fn unknown_codes_fall_back_to_generic_message() {
        let error = classify_response(400, &envelope("shiny_new_rule", None));

        assert_eq!(error.kind, ErrorKind::BusinessRule);
        assert_eq!(error.user_message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn authorization_by_status_or_code() {
        let by_status = classify_response(401, &envelope("invalid_otp", None));
        assert_eq!(by_status.kind, ErrorKind::Authorization);
        assert_eq!(by_status.user_message, "Invalid OTP. Please try again.");

        let by_code = classify_response(400, &envelope("token_expired", None));
        assert_eq!(by_code.kind, ErrorKind::Authorization);

        assert_eq!(classify_response(401, b"").kind, ErrorKind::Authorization);
    }

    #[test]
    fn permission_denial_is_a_business_rule() {
        let error = classify_response(403, &envelope("forbidden", None));

        assert_eq!(error.kind, ErrorKind::BusinessRule);
        assert_eq!(error.user_message, "You don't have permission to do this.");
        assert!(!error.is_transient());
    }

    /// Validates responses without an envelope.
    ///
    /// Assertions:
    /// - 5xx is `Server` and transient.
    /// - Other statuses are `Unknown` with the generic message.
    /// - The raw body is kept only in `technical`.
    #[test]
    fn opaque_responses() {
        let server = classify_response(502, b"<html>Bad Gateway</html>");
        assert_eq!(server.kind, ErrorKind::Server);
        assert!(server.is_transient());
        assert_eq!(server.user_message, GENERIC_ERROR_MESSAGE);

        let other = classify_response(404, b"not json");
        assert_eq!(other.kind, ErrorKind::Unknown);
        assert_eq!(other.status, Some(404));
        assert!(!other.user_message.contains("not json"));
        assert!(other.technical.unwrap().contains("not json"));
    }

    #[test]
    fn envelope_with_5xx_is_server() {
        let error = classify_response(500, &envelope("internal_error", None));
        assert_eq!(error.kind, ErrorKind::Server);
        assert_eq!(error.user_message, GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn envelope_missing_message_is_opaque() {
        let body = serde_json::to_vec(&json!({"error": {"code": "quote_expired"}})).unwrap();
        assert_eq!(classify_response(409, &body).kind, ErrorKind::Unknown);
    }
}
