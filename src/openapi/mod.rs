use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Affirm Checkout API",
        version = "1.0.0",
        description = r#"
Storefront callbacks for Affirm financed checkouts.

Affirm posts the shopper's browser to `/affirm/confirm` once the loan is
approved. The service captures the charge, records the payment and redirects
the shopper to the next checkout step. `/affirm/cancel` returns the shopper
to their cart.

Both callbacks answer with `302 Found`. Errors that cannot be expressed as a
redirect use this body:

```json
{
  "error": "Not Found",
  "message": "Not found: Order 42 not found",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
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
        (name = "Affirm", description = "Affirm checkout callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::affirm::confirm,
        crate::handlers::affirm::cancel,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::handlers::affirm::ConfirmForm,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

pub fn openapi_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
