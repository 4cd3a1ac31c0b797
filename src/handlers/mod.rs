pub mod orders;
pub mod webhooks;

use std::sync::Arc;

use actix_web::HttpRequest;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::application::order_service::OrderService;
use crate::domain::ports::OrderRepository;
use crate::errors::AppError;

/// Set by the authenticating gateway in front of this service.
pub const CUSTOMER_HEADER: &str = "X-Customer-Id";

pub type SharedOrderService = OrderService<Arc<dyn OrderRepository>>;

/// A missing header is passed on as `None` so the service reports it; a
/// malformed one is rejected here.
pub(crate) fn customer_id(req: &HttpRequest) -> Result<Option<Uuid>, AppError> {
    let Some(value) = req.headers().get(CUSTOMER_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::bad_request(format!("{} must be a UUID", CUSTOMER_HEADER)))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::update_order,
        orders::refund_order,
        webhooks::payment_events,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CreateOrderResponse,
        orders::OrderResponse,
        orders::OrderItemResponse,
        orders::ListOrdersResponse,
        orders::UpdateOrderRequest,
        orders::OrderItemPatchRequest,
        orders::RefundOrderRequest,
        orders::RefundLineRequest,
        orders::RefundOrderResponseBody,
        orders::RefundableItemResponse,
        webhooks::PaymentEvent,
        webhooks::WebhookAck,
    )),
    tags(
        (name = "orders", description = "Order lifecycle"),
        (name = "webhooks", description = "Payment gateway callbacks"),
    )
)]
pub struct ApiDoc;
