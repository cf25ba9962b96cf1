use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::{
    errors::ServiceError,
    services::affirm_confirmation::{CheckoutRedirect, ConfirmRequest},
    AppState,
};

/// Fields posted by the Affirm checkout callback.
///
/// Everything is optional at the extractor level so malformed callbacks reach
/// the handler and get a proper error instead of a bare rejection.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfirmForm {
    #[schema(example = "1")]
    pub order_id: Option<String>,
    #[schema(example = "1")]
    pub payment_method_id: Option<String>,
    #[schema(example = "ABCDEFGHIJKLMNOP")]
    pub checkout_token: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CancelParams {
    pub order_id: Option<String>,
    pub payment_method_id: Option<String>,
}

pub fn affirm_routes() -> Router<AppState> {
    Router::new()
        .route("/confirm", post(confirm))
        .route("/cancel", get(cancel))
}

/// Finalizes an Affirm checkout and redirects the shopper to the next step
#[utoipa::path(
    post,
    path = "/affirm/confirm",
    request_body(content = ConfirmForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Redirect to the cart, order, confirm or payment step"),
        (status = 400, description = "Body is not a form submission", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or payment method not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "Affirm"
)]
pub async fn confirm(
    State(state): State<AppState>,
    form: Result<Form<ConfirmForm>, FormRejection>,
) -> Result<Response, ServiceError> {
    let Form(form) = form.map_err(|rejection| {
        debug!(error = %rejection, "Rejected confirmation body");
        ServiceError::InvalidRequest(rejection.body_text())
    })?;
    let order_id = parse_id(form.order_id.as_deref())
        .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

    let redirect = state
        .confirmation
        .confirm(ConfirmRequest {
            order_id,
            payment_method_id: parse_id(form.payment_method_id.as_deref()),
            checkout_token: form.checkout_token,
        })
        .await?;

    Ok(found(&state, &redirect))
}

/// Returns a shopper who abandoned the Affirm flow to their cart
#[utoipa::path(
    get,
    path = "/affirm/cancel",
    params(CancelParams),
    responses(
        (status = 302, description = "Redirect to the cart")
    ),
    tag = "Affirm"
)]
pub async fn cancel(State(state): State<AppState>, Query(params): Query<CancelParams>) -> Response {
    let redirect = state.confirmation.cancel(
        params.order_id.as_deref(),
        params.payment_method_id.as_deref(),
    );
    found(&state, &redirect)
}

fn parse_id(raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    match raw.parse::<i32>() {
        Ok(id) => Some(id),
        Err(_) => {
            debug!(value = raw, "Ignoring unparseable id");
            None
        }
    }
}

/// `302 Found` to a storefront path.
fn found(state: &AppState, redirect: &CheckoutRedirect) -> Response {
    let location = redirect.location(&state.config.storefront);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
