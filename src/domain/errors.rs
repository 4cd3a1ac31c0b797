use thiserror::Error;

use super::order::OrderStatus;

/// Failure reported by an external collaborator (cart, payment gateway, ...).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    /// The collaborator understood the call and refused it.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Customer id is required")]
    CustomerIdRequired,
    #[error("Order id is required")]
    OrderIdRequired,
    #[error("Address not found")]
    AddressNotFound,
    #[error("Cart is empty")]
    CartEmpty,
    #[error("Cart error: {0}")]
    Cart(ServiceError),
    #[error("Error creating order: {0}")]
    Creating(String),
    #[error("Order not found")]
    NotFound,
    #[error("Order is already cancelled")]
    AlreadyCancelled,
    #[error("Order cannot be cancelled in status {0}")]
    CannotBeCancelled(OrderStatus),
    #[error("Order is not pending")]
    NotPending,
    #[error("Error refunding order: {0}")]
    Refunding(String),
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Error updating order: {0}")]
    Updating(String),
    /// The order store failed; never the caller's fault.
    #[error("Error persisting order: {0}")]
    Storage(String),
    #[error("Could not allocate a unique order reference after {0} attempts")]
    ReferenceUnavailable(u32),
    #[error("Payment provider error: {0}")]
    Payment(ServiceError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable machine-readable code returned to API clients.
    pub fn code(&self) -> &str {
        match self {
            DomainError::CustomerIdRequired => "CUSTOMER_ID_REQUIRED",
            DomainError::OrderIdRequired => "ORDER_ID_REQUIRED",
            DomainError::AddressNotFound => "ADDRESS_NOT_FOUND",
            DomainError::CartEmpty => "CART_EMPTY",
            DomainError::Cart(ServiceError::Rejected { code, .. }) => code,
            DomainError::Cart(_) => "CART_ERROR",
            DomainError::Creating(_) => "ORDER_ERROR_CREATING",
            DomainError::NotFound => "ORDER_NOT_FOUND",
            DomainError::AlreadyCancelled => "ORDER_IS_ALREADY_CANCELLED",
            DomainError::CannotBeCancelled(_) => "ORDER_CANNOT_BE_CANCELLED",
            DomainError::NotPending => "ORDER_IS_NOT_PENDING",
            DomainError::Refunding(_) => "ORDER_REFUNDING_ERROR",
            DomainError::InvalidTransition { .. } => "ORDER_INVALID_STATUS_TRANSITION",
            DomainError::Updating(_) => "ORDER_ERROR_UPDATING",
            DomainError::Storage(_) => "ORDER_ERROR_STORAGE",
            DomainError::ReferenceUnavailable(_) => "ORDER_REFERENCE_UNAVAILABLE",
            DomainError::Payment(_) => "PAYMENT_PROVIDER_ERROR",
            DomainError::InvalidInput(_) => "INVALID_INPUT",
            DomainError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
