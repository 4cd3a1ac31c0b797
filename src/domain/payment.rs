//! Provider-neutral payment contract.
//!
//! Provider specifics are confined to two places on [`ProviderKind`]:
//! building the charge/refund payload from a neutral request, and mapping the
//! provider's status string back to [`PaymentStatus`] / [`RefundStatus`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{DomainError, ServiceError};
use super::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Stripe,
    AuthorizeNet,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::AuthorizeNet => "authorize_net",
        }
    }

    pub fn charge_payload(&self, request: &CreatePaymentRequest) -> Result<ProviderCharge, DomainError> {
        Ok(match self {
            ProviderKind::Stripe => ProviderCharge::Stripe {
                amount: minor_units(&request.amount)?,
                currency: request.currency.to_lowercase(),
                payment_method: request.payment_token.clone(),
                customer: request.stripe_customer_id.clone(),
                confirm: true,
            },
            ProviderKind::AuthorizeNet => ProviderCharge::AuthorizeNet {
                amount: decimal_string(&request.amount),
                currency_code: request.currency.to_uppercase(),
                payment_profile_id: request.payment_token.clone(),
                customer_profile_id: Some(request.customer_id.to_string()),
            },
        })
    }

    pub fn refund_payload(&self, request: &RefundRequest) -> Result<ProviderRefund, DomainError> {
        Ok(match self {
            ProviderKind::Stripe => ProviderRefund::Stripe {
                payment_intent: request.payment_id.clone(),
                amount: request.amount.as_ref().map(minor_units).transpose()?,
            },
            ProviderKind::AuthorizeNet => ProviderRefund::AuthorizeNet {
                ref_trans_id: request.payment_id.clone(),
                amount: request.amount.as_ref().map(decimal_string),
            },
        })
    }

    pub fn payment_status(&self, raw: &str) -> PaymentStatus {
        match self {
            ProviderKind::Stripe => match raw {
                "succeeded" => PaymentStatus::Succeeded,
                "canceled" | "requires_payment_method" => PaymentStatus::Failed,
                _ => PaymentStatus::Pending,
            },
            // Authorize.Net response codes: 1 approved, 2 declined, 3 error, 4 held for review.
            ProviderKind::AuthorizeNet => match raw {
                "1" => PaymentStatus::Succeeded,
                "2" | "3" => PaymentStatus::Failed,
                _ => PaymentStatus::Pending,
            },
        }
    }

    pub fn refund_status(&self, raw: &str) -> RefundStatus {
        match self {
            ProviderKind::Stripe => match raw {
                "succeeded" => RefundStatus::Succeeded,
                "failed" | "canceled" => RefundStatus::Failed,
                _ => RefundStatus::Pending,
            },
            ProviderKind::AuthorizeNet => match raw {
                "1" => RefundStatus::Succeeded,
                "2" | "3" => RefundStatus::Failed,
                _ => RefundStatus::Pending,
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "authorize_net" | "authorizenet" => Ok(ProviderKind::AuthorizeNet),
            other => Err(DomainError::InvalidInput(format!(
                "unknown payment provider '{}'",
                other
            ))),
        }
    }
}

fn minor_units(amount: &BigDecimal) -> Result<i64, DomainError> {
    (amount * BigDecimal::from(100))
        .round(0)
        .to_i64()
        .filter(|cents| *cents >= 0)
        .ok_or_else(|| DomainError::InvalidInput(format!("amount {} out of range", amount)))
}

fn decimal_string(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// Charge request independent of any gateway's wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentRequest {
    pub amount: BigDecimal,
    pub currency: String,
    /// Customer's saved payment method at the provider.
    pub payment_token: String,
    pub customer_id: Uuid,
    pub stripe_customer_id: Option<String>,
}

/// `amount == None` refunds the whole payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub payment_id: String,
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderCharge {
    Stripe {
        amount: i64,
        currency: String,
        payment_method: String,
        customer: Option<String>,
        confirm: bool,
    },
    AuthorizeNet {
        amount: String,
        currency_code: String,
        payment_profile_id: String,
        customer_profile_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderRefund {
    Stripe {
        payment_intent: String,
        amount: Option<i64>,
    },
    AuthorizeNet {
        ref_trans_id: String,
        amount: Option<String>,
    },
}

/// Raw gateway answer; `status` is still in the provider's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Pending,
}

impl PaymentStatus {
    pub fn initial_order_status(&self) -> OrderStatus {
        match self {
            PaymentStatus::Succeeded => OrderStatus::PaymentSuccess,
            PaymentStatus::Failed => OrderStatus::PaymentFailed,
            PaymentStatus::Pending => OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Succeeded,
    Failed,
    Pending,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn create_payment(&self, charge: ProviderCharge) -> Result<GatewayResponse, ServiceError>;

    async fn refund(&self, refund: ProviderRefund) -> Result<GatewayResponse, ServiceError>;
}
