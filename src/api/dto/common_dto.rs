//! Shared DTO types and request defaults used across endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::domain::ServiceType;
use crate::domain::money::round_cents;
use crate::error::GatewayError;

/// User id assumed when a request omits one.
pub const DEFAULT_USER_ID: &str = "demo-user";

/// Resolves an optional user id to [`DEFAULT_USER_ID`].
#[must_use]
pub fn user_or_default(user_id: Option<String>) -> String {
    user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}

/// Rounds a request amount to cents, rejecting non-positive values.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] naming `field` when the rounded
/// amount is zero or negative.
pub fn positive_amount(field: &str, amount: Decimal) -> Result<Decimal, GatewayError> {
    let rounded = round_cents(amount);
    if rounded <= Decimal::ZERO {
        return Err(GatewayError::InvalidRequest(format!(
            "{field} must be positive"
        )));
    }
    Ok(rounded)
}

/// Deserializes a service type, reading names it does not know as
/// [`ServiceType::OpenRequest`].
///
/// # Errors
///
/// Fails only when the value is not a string.
pub fn service_type_or_open_request<'de, D>(deserializer: D) -> Result<ServiceType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().unwrap_or_else(|_| {
        tracing::debug!(service_type = %raw, "unrecognized service type priced as open request");
        ServiceType::OpenRequest
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::cents;

    #[test]
    fn blank_user_falls_back() {
        assert_eq!(user_or_default(None), DEFAULT_USER_ID);
        assert_eq!(user_or_default(Some(" ".to_string())), DEFAULT_USER_ID);
        assert_eq!(user_or_default(Some("u7".to_string())), "u7");
    }

    #[derive(Debug, Deserialize)]
    struct Typed {
        #[serde(deserialize_with = "service_type_or_open_request")]
        kind: ServiceType,
    }

    #[test]
    fn unknown_service_types_become_open_requests() {
        let parse = |v: serde_json::Value| serde_json::from_value::<Typed>(v).ok().map(|t| t.kind);
        assert_eq!(parse(serde_json::json!({ "kind": "errand" })), Some(ServiceType::Errand));
        assert_eq!(parse(serde_json::json!({ "kind": "laundry" })), Some(ServiceType::OpenRequest));
        assert_eq!(parse(serde_json::json!({ "kind": 3 })), None);
    }

    #[test]
    fn amounts_round_before_validation() {
        assert_eq!(positive_amount("amount", Decimal::new(12345, 3)).ok(), Some(cents(1235)));
        assert!(positive_amount("amount", Decimal::new(4, 3)).is_err());
    }
}
