use serde::Serialize;

use crate::storage::BackendError;

// ============================================================================
// Order Error Taxonomy
// ============================================================================
//
// Closed set of failure kinds shared by the store, the service and the HTTP
// layer. Callers branch on the variant, never on the message text.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<FieldError>),
}

impl OrderError {
    pub fn not_found(order_id: &str) -> Self {
        OrderError::NotFound(format!("order not found with id {}", order_id))
    }

    pub fn conflict(order_id: &str) -> Self {
        OrderError::Conflict(format!("order already exists with id {}", order_id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        OrderError::Internal(message.into())
    }

    /// Short machine-readable name, used in metrics labels and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) => "not_found",
            OrderError::Conflict(_) => "conflict",
            OrderError::Internal(_) => "internal",
            OrderError::ValidationFailed(_) => "validation_failed",
        }
    }
}

impl From<BackendError> for OrderError {
    fn from(err: BackendError) -> Self {
        OrderError::Internal(err.to_string())
    }
}

/// A single rejected field, e.g. `line_items.quantity: must be greater than zero`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects field errors and turns them into a single `ValidationFailed`
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), OrderError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(OrderError::ValidationFailed(self.errors))
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_is_ok() {
        assert_eq!(ValidationErrors::new().into_result(), Ok(()));
    }

    #[test]
    fn test_builder_collects_every_field() {
        let mut ve = ValidationErrors::new();
        ve.add("user_id", "cannot be empty");
        ve.add("line_items", "cannot be empty");
        assert!(!ve.is_empty());

        match ve.into_result() {
            Err(OrderError::ValidationFailed(fields)) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "user_id");
                assert_eq!(fields[1].message, "cannot be empty");
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = OrderError::ValidationFailed(vec![FieldError {
            field: "order_id".to_string(),
            message: "must be empty during creation".to_string(),
        }]);
        assert_eq!(
            err.to_string(),
            "validation failed: order_id: must be empty during creation"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OrderError::not_found("a").kind(), "not_found");
        assert_eq!(OrderError::conflict("a").kind(), "conflict");
        assert_eq!(OrderError::internal("boom").kind(), "internal");
        assert_eq!(OrderError::ValidationFailed(vec![]).kind(), "validation_failed");
    }
}
