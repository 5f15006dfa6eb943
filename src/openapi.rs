use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
E-commerce storefront backend: product catalog, carts, wishlists, order
placement (cash on delivery or hosted payment gateways) and payment
confirmation.

## Authentication

Customer and admin endpoints require a bearer JWT:

```
Authorization: Bearer <token>
```

`POST /api/v1/orders/confirm` is unauthenticated; callbacks are authorized by
provider-side verification, never by the caller's identity.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order placement and payment confirmation"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::orders::place_order,
        crate::handlers::orders::confirm_payment,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::handlers::products::ProductResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::reconciliation::PlaceOrderInput,
            crate::services::reconciliation::OrderItemInput,
            crate::services::reconciliation::ShippingAddress,
            crate::services::reconciliation::PlaceOrderOutcome,
            crate::services::reconciliation::ConfirmOutcome,
            crate::gateways::CallbackPayload,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentState,
            crate::entities::order::PaymentMethod,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/orders/confirm"));
    }
}
