// # HTTP surface
//
// Thin axum layer over roster-core. Every handler parses the request, calls
// one ResourceService operation and maps the outcome to a status code.
//
// ## Routes
//
// - `POST   /api/candidates`             create (201 + Location)
// - `PUT    /api/candidates/{id}`        full replace
// - `PATCH  /api/candidates/{id}`        merge-patch
// - `GET    /api/candidates`             list (JSON array or NDJSON stream)
// - `GET    /api/candidates/{id}`        fetch one
// - `DELETE /api/candidates/{id}`        idempotent delete (204)
//
// The same set is served under `/api/employee-details`.

use anyhow::Result;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use roster_core::error::{Error, ErrorKey};
use roster_core::model::{Candidate, EmployeeDetails, Entity};
use roster_core::resource::{ResourceService, Sort};
use roster_core::traits::RecordStream;
use roster_core::Roster;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

const APPLICATION_JSON: &str = "application/json";
const MERGE_PATCH_JSON: &str = "application/merge-patch+json";
const NDJSON: &str = "application/x-ndjson";

/// A record type exposed over HTTP
trait Resource: Entity {
    /// Collection path, without trailing slash
    const PATH: &'static str;

    fn service(roster: &Roster) -> &ResourceService<Self>;
}

impl Resource for Candidate {
    const PATH: &'static str = "/api/candidates";

    fn service(roster: &Roster) -> &ResourceService<Self> {
        roster.candidates()
    }
}

impl Resource for EmployeeDetails {
    const PATH: &'static str = "/api/employee-details";

    fn service(roster: &Roster) -> &ResourceService<Self> {
        roster.employee_details()
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    roster: Roster,
    alerts: Arc<AlertHeaders>,
}

impl AppState {
    pub fn new(roster: Roster, application_name: &str) -> Result<Self> {
        Ok(Self {
            roster,
            alerts: Arc::new(AlertHeaders::new(application_name)?),
        })
    }
}

/// `X-{app}-alert` / `X-{app}-params` headers attached to mutations
struct AlertHeaders {
    application_name: String,
    alert: HeaderName,
    params: HeaderName,
}

impl AlertHeaders {
    fn new(application_name: &str) -> Result<Self> {
        let prefix = application_name.to_ascii_lowercase();
        Ok(Self {
            application_name: application_name.to_string(),
            alert: HeaderName::try_from(format!("x-{prefix}-alert"))?,
            params: HeaderName::try_from(format!("x-{prefix}-params"))?,
        })
    }

    fn headers(&self, entity: &str, action: &str, id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let message = format!("{}.{}.{}", self.application_name, entity, action);
        if let Ok(value) = HeaderValue::from_str(&message) {
            headers.insert(self.alert.clone(), value);
        }
        if let Ok(value) = HeaderValue::from_str(id) {
            headers.insert(self.params.clone(), value);
        }
        headers
    }
}

/// Build the application router
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(resource_routes::<Candidate>())
        .merge(resource_routes::<EmployeeDetails>())
        .layer(middleware::from_fn_with_state(request_timeout, track_request))
        .with_state(state)
}

fn resource_routes<T: Resource>() -> Router<AppState> {
    Router::new()
        .route(T::PATH, get(list::<T>).post(create::<T>))
        .route(
            &format!("{}/{{id}}", T::PATH),
            get(fetch::<T>)
                .put(replace::<T>)
                .patch(merge_patch::<T>)
                .delete(remove::<T>),
        )
}

/// Log every request and answer 408 when it outlives the timeout
async fn track_request(State(timeout): State<Duration>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %uri, "Request timed out after {:?}", timeout);
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
    };

    debug!(
        %method,
        %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    response
}

async fn create<T: Resource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let record: T = parse_body(&headers, &body, &[APPLICATION_JSON])?;
    let saved = T::service(&state.roster).create(record).await?;

    let id = saved.id().unwrap_or_default().to_string();
    let mut response_headers = state.alerts.headers(T::ENTITY_NAME, "created", &id);
    if let Ok(location) = HeaderValue::from_str(&format!("{}/{}", T::PATH, id)) {
        response_headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, response_headers, Json(saved)).into_response())
}

async fn replace<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let record: T = parse_body(&headers, &body, &[APPLICATION_JSON])?;
    let saved = T::service(&state.roster).replace(&id, record).await?;

    let alert = state.alerts.headers(T::ENTITY_NAME, "updated", &id);
    Ok((StatusCode::OK, alert, Json(saved)).into_response())
}

async fn merge_patch<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let patch: T::Patch = parse_body(&headers, &body, &[APPLICATION_JSON, MERGE_PATCH_JSON])?;
    let saved = T::service(&state.roster).merge_patch(&id, patch).await?;

    let alert = state.alerts.headers(T::ENTITY_NAME, "updated", &id);
    Ok((StatusCode::OK, alert, Json(saved)).into_response())
}

async fn fetch<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match T::service(&state.roster).get(&id).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(ApiError::not_found()),
    }
}

async fn remove<T: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    T::service(&state.roster).delete(&id).await?;

    let alert = state.alerts.headers(T::ENTITY_NAME, "deleted", &id);
    Ok((StatusCode::NO_CONTENT, alert).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    filter: Option<String>,
    sort: Option<String>,
}

async fn list<T: Resource>(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let service = T::service(&state.roster);

    let filter = params.filter.as_deref().and_then(|name| {
        let filter = T::named_filter(name);
        if filter.is_none() {
            debug!(entity = T::ENTITY_NAME, "Ignoring unknown filter '{}'", name);
        }
        filter
    });

    let mut records: RecordStream<T> = match params.sort.as_deref() {
        Some(sort) => {
            let sort = Sort::parse::<T>(sort)?;
            let sorted = service.list_sorted(filter, &sort).await?;
            Box::pin(tokio_stream::iter(sorted.into_iter().map(Ok)))
        }
        None => service.list(filter).await?,
    };

    if accepts(&headers, NDJSON) {
        let lines = records.map(|record| {
            let mut line = serde_json::to_vec(&record?)?;
            line.push(b'\n');
            Ok::<_, Error>(Bytes::from(line))
        });
        return Ok(([(CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response());
    }

    let mut all = Vec::new();
    while let Some(record) = records.next().await {
        all.push(record?);
    }
    Ok(Json(all).into_response())
}

fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

fn accepts(headers: &HeaderMap, wanted: &str) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|candidate| media_type(candidate).eq_ignore_ascii_case(wanted))
}

fn parse_body<B: DeserializeOwned>(
    headers: &HeaderMap,
    body: &[u8],
    accepted: &[&str],
) -> Result<B, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(media_type)
        .unwrap_or_default();
    if !accepted
        .iter()
        .any(|media| content_type.eq_ignore_ascii_case(media))
    {
        return Err(ApiError::unsupported_media_type(content_type));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::malformed_body(&e))
}

/// Field error entry of an error payload
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrorBody {
    pub object_name: String,
    pub field: String,
    pub message: String,
}

/// JSON error payload
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_key: Option<String>,
    pub message: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldErrorBody>,
}

/// Handler error, rendered as an [`ErrorBody`]
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn plain(status: StatusCode, message: &str, title: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                entity_name: None,
                error_key: None,
                message: message.to_string(),
                title: title.into(),
                status: status.as_u16(),
                field_errors: Vec::new(),
            },
        }
    }

    fn not_found() -> Self {
        Self::plain(StatusCode::NOT_FOUND, "error.http.404", "Not Found")
    }

    fn unsupported_media_type(content_type: &str) -> Self {
        Self::plain(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "error.http.415",
            format!("Content type '{content_type}' not supported"),
        )
    }

    fn malformed_body(err: &serde_json::Error) -> Self {
        Self::plain(StatusCode::BAD_REQUEST, "error.http.400", err.to_string())
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let entity_name = err.entity().map(str::to_string);
        match err {
            Error::Validation { key, message, .. } => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    entity_name,
                    error_key: Some(key.to_string()),
                    message: format!("error.{key}"),
                    title: message,
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    field_errors: Vec::new(),
                },
            },
            Error::NotFound { .. } => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    entity_name,
                    error_key: Some(ErrorKey::IdNotFound.to_string()),
                    message: format!("error.{}", ErrorKey::IdNotFound),
                    title: "Entity not found".to_string(),
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    field_errors: Vec::new(),
                },
            },
            Error::Constraint { entity, violations } => Self {
                status: StatusCode::BAD_REQUEST,
                body: ErrorBody {
                    entity_name,
                    error_key: None,
                    message: "error.validation".to_string(),
                    title: "Method argument not valid".to_string(),
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    field_errors: violations
                        .into_iter()
                        .map(|violation| FieldErrorBody {
                            object_name: entity.to_string(),
                            field: violation.field.to_string(),
                            message: violation.message,
                        })
                        .collect(),
                },
            },
            Error::Vanished { .. } => {
                let mut gone = Self::not_found();
                gone.body.entity_name = entity_name;
                gone
            }
            Error::Conflict { .. } => {
                let mut conflict = Self::plain(
                    StatusCode::CONFLICT,
                    "error.concurrencyFailure",
                    err.to_string(),
                );
                conflict.body.entity_name = entity_name;
                conflict
            }
            other => {
                error!("Request failed: {}", other);
                Self::plain(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error.http.500",
                    "Internal Server Error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            debug!(status = self.status.as_u16(), "{}", self.body.title);
        }
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Method;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        let (roster, _rx) = Roster::in_memory(64);
        let state = AppState::new(roster, "roster").unwrap();
        router(state, Duration::from_secs(5))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = axum::http::Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        let body = body.map_or_else(Body::empty, |value| Body::from(value.to_string()));
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(app: &Router, path: &str, body: Value) -> Value {
        let response = send(app, Method::POST, path, Some(APPLICATION_JSON), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await
    }

    #[tokio::test]
    async fn create_returns_location_and_alert() {
        let app = app();
        let response = send(
            &app,
            Method::POST,
            "/api/candidates",
            Some(APPLICATION_JSON),
            Some(json!({ "firstName": "Ann" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let alert = response.headers().get("x-roster-alert").unwrap();
        assert_eq!(alert, "roster.candidate.created");
        let id = response
            .headers()
            .get("x-roster-params")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            format!("/api/candidates/{id}").as_str()
        );
        let body = json_body(response).await;
        assert_eq!(body["id"], id.as_str());
        assert_eq!(body["firstName"], "Ann");
    }

    #[tokio::test]
    async fn create_with_id_is_bad_request() {
        let app = app();
        let response = send(
            &app,
            Method::POST,
            "/api/candidates",
            Some(APPLICATION_JSON),
            Some(json!({ "id": "c1", "firstName": "Ann" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.entity_name.as_deref(), Some("candidate"));
        assert_eq!(body.error_key.as_deref(), Some("idexists"));
        assert_eq!(body.message, "error.idexists");
    }

    #[tokio::test]
    async fn constraint_violation_lists_field_errors() {
        let app = app();
        let response = send(
            &app,
            Method::POST,
            "/api/employee-details",
            Some(APPLICATION_JSON),
            Some(json!({ "taxId": "short" })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.field_errors.len(), 1);
        assert_eq!(body.field_errors[0].field, "taxId");
        assert_eq!(body.field_errors[0].object_name, "employeeDetails");
    }

    #[tokio::test]
    async fn patch_requires_json_content_type() {
        let app = app();
        let created = create(&app, "/api/candidates", json!({ "firstName": "Ann" })).await;
        let id = created["id"].as_str().unwrap();

        let response = send(
            &app,
            Method::PATCH,
            &format!("/api/candidates/{id}"),
            Some("text/plain"),
            Some(json!({ "id": id, "login": "ann" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = send(
            &app,
            Method::PATCH,
            &format!("/api/candidates/{id}"),
            Some("application/merge-patch+json; charset=utf-8"),
            Some(json!({ "id": id, "login": "ann" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["login"], "ann");
        assert_eq!(body["firstName"], "Ann");
    }

    #[tokio::test]
    async fn linking_is_visible_from_both_sides() {
        let app = app();
        let candidate = create(&app, "/api/candidates", json!({ "firstName": "Ann" })).await;
        let details = create(&app, "/api/employee-details", json!({ "taxId": "TAX-000000001" })).await;
        let candidate_id = candidate["id"].as_str().unwrap();
        let details_id = details["id"].as_str().unwrap();

        let response = send(
            &app,
            Method::PATCH,
            &format!("/api/employee-details/{details_id}"),
            Some(MERGE_PATCH_JSON),
            Some(json!({ "id": details_id, "child": candidate_id })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["child"], candidate_id);

        let response = send(
            &app,
            Method::GET,
            &format!("/api/candidates/{candidate_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(json_body(response).await["parent"], details_id);

        let response = send(
            &app,
            Method::GET,
            "/api/employee-details?filter=child-is-null",
            None,
            None,
        )
        .await;
        assert_eq!(json_body(response).await, json!([]));

        let response = send(&app, Method::GET, "/api/employee-details?filter=bogus", None, None).await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_streams_ndjson_on_request() {
        let app = app();
        for name in ["Ann", "Bob"] {
            create(&app, "/api/candidates", json!({ "firstName": name })).await;
        }

        let request = axum::http::Request::builder()
            .uri("/api/candidates?sort=firstName,desc")
            .header(ACCEPT, NDJSON)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), NDJSON);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let names: Vec<String> = String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|line| {
                let value: Value = serde_json::from_str(line).unwrap();
                value["firstName"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(names, vec!["Bob", "Ann"]);
    }

    #[tokio::test]
    async fn unknown_sort_is_bad_request() {
        let app = app();
        let response = send(&app, Method::GET, "/api/candidates?sort=salary", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["errorKey"], "sortinvalid");
    }

    #[tokio::test]
    async fn missing_records_and_repeated_deletes() {
        let app = app();
        let response = send(&app, Method::GET, "/api/candidates/ghost", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            Method::PUT,
            "/api/candidates/ghost",
            Some(APPLICATION_JSON),
            Some(json!({ "id": "ghost", "firstName": "Eve" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["errorKey"], "idnotfound");

        let created = create(&app, "/api/candidates", json!({ "firstName": "Ann" })).await;
        let path = format!("/api/candidates/{}", created["id"].as_str().unwrap());
        for _ in 0..2 {
            let response = send(&app, Method::DELETE, &path, None, None).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(response.headers().contains_key("x-roster-alert"));
        }
    }

    #[tokio::test]
    async fn conflict_and_vanished_map_to_409_and_404() {
        let conflict = ApiError::from(Error::conflict("candidate", "c1", 1, 2));
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.message, "error.concurrencyFailure");

        let vanished = ApiError::from(Error::vanished("candidate", "c1"));
        assert_eq!(vanished.status, StatusCode::NOT_FOUND);
        assert_eq!(vanished.body.entity_name.as_deref(), Some("candidate"));

        let store = ApiError::from(Error::store("disk full"));
        assert_eq!(store.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn slow_requests_time_out() {
        let slow = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "done"
                }),
            )
            .layer(middleware::from_fn_with_state(
                Duration::from_millis(20),
                track_request,
            ));

        let request = axum::http::Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = slow.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
