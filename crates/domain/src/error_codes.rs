//! Backend error code → user-facing message table

use crate::errors::FieldErrors;

/// Shown when no response reached the client.
pub const NETWORK_ERROR_MESSAGE: &str =
    "No internet connection. Please check your connection and try again.";
/// Shown when refresh-and-replay fails and the user must sign in again.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";
/// Fallback for unmapped codes and opaque failures.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
/// Validation error without usable field details.
pub const VALIDATION_FALLBACK_MESSAGE: &str = "Please check your input and try again.";

// Authentication
pub const INVALID_OTP: &str = "invalid_otp";
pub const TOO_MANY_ATTEMPTS: &str = "attempts_exceeded";
pub const OTP_COOLDOWN: &str = "otp_cooldown";
pub const RATE_LIMIT: &str = "rate_limit";
pub const RATE_LIMITED: &str = "rate_limited";
pub const TOKEN_EXPIRED: &str = "token_expired";
pub const INVALID_REFRESH_TOKEN: &str = "invalid_token";
pub const UNAUTHORIZED: &str = "unauthorized";

// Profile & address
pub const USER_TYPE_LOCKED: &str = "user_type_locked";
pub const PROFILE_INACTIVE: &str = "profile_inactive";
pub const DUPLICATE_SELF: &str = "duplicate_self_profile";

// Quote & order
pub const QUOTE_EXPIRED: &str = "quote_expired";
pub const QUOTE_NOT_DRAFT: &str = "quote_not_draft";
pub const QUOTE_NOT_FINALIZED: &str = "quote_not_finalized";
pub const INVALID_LAB_SELECTION: &str = "invalid_lab_selection";
pub const COUPON_LIMIT_EXCEEDED: &str = "coupon_limit_exceeded";
pub const CAPACITY_EXCEEDED: &str = "capacity_exceeded";

// Cancellation
pub const CANNOT_CANCEL_AFTER_DISPATCH: &str = "cannot_cancel_after_dispatch";
pub const CANNOT_CANCEL_AFTER_COLLECTION: &str = "cannot_cancel_after_collection";
pub const ORDER_NOT_CANCELLABLE: &str = "order_not_cancellable";

// Generic
pub const VALIDATION_ERROR: &str = "validation_error";
pub const FORBIDDEN: &str = "forbidden";
pub const NOT_FOUND: &str = "not_found";
pub const INTERNAL_ERROR: &str = "internal_error";

const MESSAGES: &[(&str, &str)] = &[
    (INVALID_OTP, "Invalid OTP. Please try again."),
    (TOO_MANY_ATTEMPTS, "Too many failed attempts. Request a new OTP."),
    (OTP_COOLDOWN, "Please wait before requesting another OTP."),
    (RATE_LIMIT, "Too many requests. Please wait a moment."),
    (RATE_LIMITED, "Too many requests. Please wait a moment."),
    (TOKEN_EXPIRED, "Session expired. Refreshing..."),
    (INVALID_REFRESH_TOKEN, "Session expired. Please log in again."),
    (UNAUTHORIZED, "Please log in again."),
    (USER_TYPE_LOCKED, "Cannot change patient type after booking."),
    (PROFILE_INACTIVE, "This profile is no longer active."),
    (DUPLICATE_SELF, "Only one Self profile allowed."),
    (NOT_FOUND, "Not found."),
    (QUOTE_EXPIRED, "Quote expired. Please create a new quote."),
    (QUOTE_NOT_DRAFT, "Quote already finalized."),
    (QUOTE_NOT_FINALIZED, "Please select a lab first."),
    (INVALID_LAB_SELECTION, "Selected lab is no longer available."),
    (COUPON_LIMIT_EXCEEDED, "Coupon limit reached. Please remove coupon."),
    (CAPACITY_EXCEEDED, "Selected slot is no longer available."),
    (CANNOT_CANCEL_AFTER_DISPATCH, "Cannot cancel, rider already assigned."),
    (CANNOT_CANCEL_AFTER_COLLECTION, "Cannot cancel, samples already collected."),
    (ORDER_NOT_CANCELLABLE, "This order cannot be cancelled."),
    (VALIDATION_ERROR, "Validation error"),
    (FORBIDDEN, "You don't have permission to do this."),
    (INTERNAL_ERROR, GENERIC_ERROR_MESSAGE),
];

/// Codes that describe a rejected credential rather than a business rule.
/// `forbidden` is a permission denial and stays a business rule.
pub const AUTHORIZATION_CODES: &[&str] = &[UNAUTHORIZED, TOKEN_EXPIRED, INVALID_REFRESH_TOKEN];

/// Whether the code has an entry in the message table.
pub fn is_known_code(code: &str) -> bool {
    MESSAGES.iter().any(|(known, _)| *known == code)
}

/// Resolve the display message for a server code, with a generic fallback.
pub fn message_for_code(code: Option<&str>) -> &'static str {
    code.and_then(|code| MESSAGES.iter().find(|(known, _)| *known == code))
        .map_or(GENERIC_ERROR_MESSAGE, |(_, message)| message)
}

/// Render the first offending field as `"Field name: message"`.
pub fn format_validation_error(details: Option<&FieldErrors>) -> String {
    let Some((field, messages)) = details.and_then(FieldErrors::first) else {
        return VALIDATION_FALLBACK_MESSAGE.to_string();
    };
    let Some(first) = messages.first() else {
        return VALIDATION_FALLBACK_MESSAGE.to_string();
    };

    format!("{}: {first}", humanize_field(field))
}

/// Field → first message pairs, `"Invalid value"` when a field has none.
pub fn parse_validation_errors(details: Option<&FieldErrors>) -> Vec<(String, String)> {
    details
        .map(|details| {
            details
                .iter()
                .map(|(field, messages)| {
                    let message =
                        messages.first().cloned().unwrap_or_else(|| "Invalid value".to_string());
                    (field.to_string(), message)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn humanize_field(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}
