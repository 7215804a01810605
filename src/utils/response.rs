//! Response envelopes and the application error type.
//!
//! Success bodies are wrapped as `{ "data": ... }`. Validation failures use
//! the `{ "message": ..., "errors": { field: [msg, ...] } }` shape on 422.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Application error: an HTTP status plus the exact body to return.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = serde_json::Map::new();
        errors.insert(field.to_string(), json!([message]));
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({
                "message": "The given data was invalid.",
                "errors": errors,
            }),
        }
    }

    pub fn from_validation_errors(errors: &validator::ValidationErrors) -> Self {
        let mut fields = serde_json::Map::new();
        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), json!(messages));
        }
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({
                "message": "The given data was invalid.",
                "errors": fields,
            }),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "message": message }),
        }
    }

    pub fn conflict(message: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            body: json!({ "message": message }),
        }
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "message": message }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
