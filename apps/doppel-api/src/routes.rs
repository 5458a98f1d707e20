use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use doppel_service::{Error as ServiceError, IngestOutcome, WebhookRequest};

use crate::state::AppState;

const HEADER_SIGNATURE: &str = "x-hub-signature-256";
const HEADER_EVENT: &str = "x-github-event";
const HEADER_DELIVERY: &str = "x-github-delivery";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/webhooks/github", post(github_webhook))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	job_id: Option<Uuid>,
	#[serde(skip_serializing_if = "Option::is_none")]
	reason: Option<&'static str>,
}

async fn github_webhook(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), ApiError> {
	let request = WebhookRequest {
		delivery_id: header_str(&headers, HEADER_DELIVERY),
		event: header_str(&headers, HEADER_EVENT),
		signature: header_str(&headers, HEADER_SIGNATURE),
		body: &body,
	};
	let outcome = state.service.ingest_webhook(request).await?;
	let (status, response) = webhook_response(outcome);

	Ok((status, Json(response)))
}

// Accept-or-ignore is always 200; only signature and payload failures get
// error statuses.
fn webhook_response(outcome: IngestOutcome) -> (StatusCode, WebhookResponse) {
	match outcome {
		IngestOutcome::Queued { job_id } =>
			(StatusCode::OK, WebhookResponse { status: "queued", job_id: Some(job_id), reason: None }),
		IngestOutcome::Duplicate =>
			(StatusCode::OK, WebhookResponse { status: "duplicate", job_id: None, reason: None }),
		IngestOutcome::Ignored { reason } => (
			StatusCode::OK,
			WebhookResponse { status: "ignored", job_id: None, reason: Some(reason) },
		),
	}
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidSignature => Self {
				status: StatusCode::UNAUTHORIZED,
				error_code: "invalid_signature".to_string(),
				message: err.to_string(),
			},
			ServiceError::MalformedPayload { .. } => Self {
				status: StatusCode::BAD_REQUEST,
				error_code: "malformed_payload".to_string(),
				message: err.to_string(),
			},
			other => {
				tracing::error!(error = %other, "Webhook ingest failed.");

				Self {
					status: StatusCode::INTERNAL_SERVER_ERROR,
					error_code: "internal".to_string(),
					message: "Internal error.".to_string(),
				}
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepted_and_ignored_webhooks_return_ok() {
		let (status, response) = webhook_response(IngestOutcome::Queued { job_id: Uuid::new_v4() });

		assert_eq!(status, StatusCode::OK);
		assert_eq!(response.status, "queued");
		assert!(response.job_id.is_some());

		let (status, _) = webhook_response(IngestOutcome::Duplicate);

		assert_eq!(status, StatusCode::OK);

		let (status, response) =
			webhook_response(IngestOutcome::Ignored { reason: "unsupported event type" });

		assert_eq!(status, StatusCode::OK);
		assert_eq!(response.reason, Some("unsupported event type"));
	}

	#[test]
	fn signature_failures_map_to_unauthorized() {
		let err = ApiError::from(ServiceError::InvalidSignature);

		assert_eq!(err.status, StatusCode::UNAUTHORIZED);
		assert_eq!(err.error_code, "invalid_signature");
	}

	#[test]
	fn malformed_payloads_map_to_bad_request() {
		let err =
			ApiError::from(ServiceError::MalformedPayload { message: "Missing issue.".to_string() });

		assert_eq!(err.status, StatusCode::BAD_REQUEST);
		assert_eq!(err.error_code, "malformed_payload");
	}

	#[test]
	fn internal_failures_hide_details() {
		let err = ApiError::from(ServiceError::EmptyInput);

		assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(err.message, "Internal error.");
	}
}
