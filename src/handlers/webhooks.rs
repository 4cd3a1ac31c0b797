//! Payment gateway callbacks.
//!
//! Gateways deliver at least once. A replay that finds the order already
//! resolved is acknowledged as `ignored` rather than failed, so the gateway
//! stops retrying.

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::SharedOrderService;
use crate::domain::errors::DomainError;
use crate::errors::AppError;

/// Provider event, already translated by the payment adapter.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    PaymentSucceeded {
        /// Gateway payment id.
        id: String,
    },
    PaymentFailed {
        id: String,
    },
    RefundSucceeded {
        /// Gateway refund id.
        id: String,
        #[schema(value_type = String, example = "20.00")]
        amount: BigDecimal,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// `processed` or `ignored`.
    pub status: String,
    pub code: Option<String>,
}

/// POST /webhooks/payments
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    request_body = PaymentEvent,
    responses(
        (status = 200, description = "Event processed or ignored as a replay", body = WebhookAck),
        (status = 404, description = "No order for this payment"),
    ),
    tag = "webhooks"
)]
pub async fn payment_events(
    service: web::Data<SharedOrderService>,
    body: web::Json<PaymentEvent>,
) -> Result<HttpResponse, AppError> {
    let result = match body.into_inner() {
        PaymentEvent::PaymentSucceeded { id } => {
            service.process_payment_succeeded(&id).await.map(|_| ())
        }
        PaymentEvent::PaymentFailed { id } => service.process_payment_failed(&id).await.map(|_| ()),
        PaymentEvent::RefundSucceeded { id, amount } => {
            service.process_refund_succeeded(&id, amount).await
        }
    };

    match result {
        Ok(()) => Ok(HttpResponse::Ok().json(WebhookAck {
            status: "processed".to_string(),
            code: None,
        })),
        Err(DomainError::NotPending) => Ok(HttpResponse::Ok().json(WebhookAck {
            status: "ignored".to_string(),
            code: Some(DomainError::NotPending.code().to_string()),
        })),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_event_parses_amount() {
        let event: PaymentEvent =
            serde_json::from_str(r#"{"type":"refund_succeeded","id":"re_1","amount":"20.00"}"#)
                .unwrap();
        match event {
            PaymentEvent::RefundSucceeded { id, amount } => {
                assert_eq!(id, "re_1");
                assert_eq!(amount, "20.00".parse::<BigDecimal>().unwrap());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let parsed = serde_json::from_str::<PaymentEvent>(r#"{"type":"dispute_opened","id":"x"}"#);
        assert!(parsed.is_err());
    }
}
