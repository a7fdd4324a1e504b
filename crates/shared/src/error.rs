use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            details: None,
            hint: None,
        }
    }
}

#[derive(Debug, Error)]
#[error("query service returned {status}: {}", describe(.body))]
pub struct ServiceException {
    pub status: u16,
    pub body: Option<ServiceError>,
}

fn describe(body: &Option<ServiceError>) -> String {
    match body {
        Some(ServiceError {
            code: Some(code),
            message,
            ..
        }) if !message.is_empty() => format!("{code} {message}"),
        Some(ServiceError {
            code: Some(code), ..
        }) => code.clone(),
        Some(ServiceError { message, .. }) if !message.is_empty() => message.clone(),
        _ => "no error body".to_string(),
    }
}

impl ServiceException {
    pub fn new(status: u16, body: Option<ServiceError>) -> Self {
        Self { status, body }
    }
}
