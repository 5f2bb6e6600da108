use crate::error::Error;
use crate::functions::{Function, Functions, Invocation};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

const ALLOW_HEADERS: &str = "Content-Type";
const ALLOW_ORIGIN: &str = "*";

/// Status, CORS methods and optional JSON body of a function response.
///
/// ```text
/// Access-Control-Allow-Headers: Content-Type
/// Access-Control-Allow-Origin:  *
/// Access-Control-Allow-Methods: GET            (OPTIONS,GET on /tokens)
/// ```
#[derive(Debug)]
pub struct GatewayResponse {
    status: StatusCode,
    allow_methods: &'static str,
    body: Option<Value>,
}

impl GatewayResponse {
    pub fn ok(allow_methods: &'static str, body: Option<Value>) -> Self {
        Self {
            status: StatusCode::OK,
            allow_methods,
            body,
        }
    }

    pub fn error(allow_methods: &'static str, err: &Error) -> Self {
        let body = serde_json::to_value(ErrorResponse {
            error: err.to_string(),
            kind: err.kind(),
        })
        .ok();
        Self {
            status: err.status_code(),
            allow_methods,
            body,
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(self.allow_methods),
        );
        response
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

pub fn create_router(functions: Functions) -> Router {
    Router::new()
        .route("/tokens", get(read_tokens).options(tokens_preflight))
        .route(
            "/base/refresh",
            get(refresh_base_token).post(refresh_base_token),
        )
        .route(
            "/instagram/refresh",
            get(refresh_instagram_token).post(refresh_instagram_token),
        )
        .route("/base/items", get(fetch_base_items))
        .layer(TraceLayer::new_for_http())
        .with_state(functions)
}

/// GET /tokens
async fn read_tokens(State(functions): State<Functions>) -> GatewayResponse {
    run(&functions, Function::ReadTokens, "OPTIONS,GET").await
}

/// OPTIONS /tokens: CORS preflight, no function runs.
async fn tokens_preflight() -> GatewayResponse {
    GatewayResponse::ok("OPTIONS,GET", None)
}

/// GET|POST /base/refresh
async fn refresh_base_token(State(functions): State<Functions>) -> GatewayResponse {
    run(&functions, Function::RefreshBaseToken, "GET").await
}

/// GET|POST /instagram/refresh
async fn refresh_instagram_token(State(functions): State<Functions>) -> GatewayResponse {
    run(&functions, Function::RefreshInstagramToken, "GET").await
}

/// GET /base/items
async fn fetch_base_items(State(functions): State<Functions>) -> GatewayResponse {
    run(&functions, Function::FetchBaseItems, "GET").await
}

async fn run(
    functions: &Functions,
    function: Function,
    allow_methods: &'static str,
) -> GatewayResponse {
    let invocation = Invocation::new(function);
    match functions.invoke(&invocation).await {
        Ok(body) => GatewayResponse::ok(allow_methods, body),
        // Already logged inside the invocation span.
        Err(e) => GatewayResponse::error(allow_methods, &e),
    }
}
