//! HTTP request handlers
//!
//! Axum handlers for the cases-per-test API.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Query, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tasso::{CacheStatus, StateSeries, format_date};

use crate::AppState;
use crate::error::ApiError;

/// A ratio series keyed by `MM-dd-yyyy`, emitted in calendar order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatedSeries(pub StateSeries<f64>);

impl Serialize for DatedSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, ratio) in &self.0 {
            map.serialize_entry(&format_date(*date), ratio)?;
        }
        map.end()
    }
}

/// Query string of the historical endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    /// State name as it appears in the daily files.
    pub state: Option<String>,
}

/// Latest ratio per state
pub async fn latest_cases_per_test(
    State(app): State<AppState>,
) -> Result<Json<BTreeMap<String, f64>>, ApiError> {
    Ok(Json(app.query.latest_cases_per_test().await?))
}

/// Full ratio history for one state; `{}` for an unknown state.
pub async fn historical_cases_per_test(
    State(app): State<AppState>,
    Query(params): Query<HistoricalParams>,
) -> Result<Json<DatedSeries>, ApiError> {
    let state = params
        .state
        .ok_or_else(|| ApiError::bad_request("missing query parameter 'state'"))?;
    let series = app.query.historical_cases_per_test(&state).await?;
    Ok(Json(DatedSeries(series.unwrap_or_default())))
}

/// Preload status
pub async fn health(State(app): State<AppState>) -> (StatusCode, Json<CacheStatus>) {
    let status = app.query.status();
    let code = match status {
        CacheStatus::Failed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(status))
}

/// CORS preflight: echo the requested headers and method back.
pub async fn preflight(headers: HeaderMap) -> Response {
    let mut resp = "OK".into_response();
    let out = resp.headers_mut();
    if let Some(h) = headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        out.insert(ACCESS_CONTROL_ALLOW_HEADERS, h.clone());
    }
    if let Some(m) = headers.get(ACCESS_CONTROL_REQUEST_METHOD) {
        out.insert(ACCESS_CONTROL_ALLOW_METHODS, m.clone());
    }
    resp
}

/// Anything unrouted: preflight for `OPTIONS`, 404 otherwise.
pub async fn fallback(method: Method, headers: HeaderMap) -> Response {
    if method == Method::OPTIONS {
        preflight(headers).await
    } else {
        ApiError::not_found("no such endpoint").into_response()
    }
}

/// Stamp the configured allowed origin on every response.
pub async fn allow_origin(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    if let Some(origin) = &app.allowed_origin {
        resp.headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    resp
}

/// Parse the configured origin into a header value.
///
/// # Errors
/// Returns the rejected value if it is not a valid header value.
pub fn origin_header(origin: Option<&str>) -> Result<Option<HeaderValue>, String> {
    origin
        .map(|o| HeaderValue::from_str(o).map_err(|_| o.to_string()))
        .transpose()
}
