use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header::CONTENT_TYPE};
use strum::{Display, IntoStaticStr};

use crate::http::headers::X_ERROR_CAUSE;

// Categorized possible causes for request processing failures
// Not using Error as inner type since it's not cloneable
#[derive(Debug, Clone, Display, IntoStaticStr, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCause {
    MalformedRequest(String),
    BackendErrorConnect,
    BackendTimeout,
    BackendError(String),
    BackendBodyError(String),
}

impl ErrorCause {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::BackendErrorConnect | Self::BackendError(_) | Self::BackendBodyError(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            Self::MalformedRequest(x) => Some(x.clone()),
            Self::BackendError(x) => Some(x.clone()),
            Self::BackendBodyError(x) => Some(x.clone()),
            _ => None,
        }
    }
}

// Creates the response from ErrorCause and injects itself into extensions to be visible by middleware
impl IntoResponse for ErrorCause {
    fn into_response(self) -> Response {
        #[cfg(not(feature = "debug"))]
        let body = format!("error: {self}\n");
        #[cfg(feature = "debug")]
        let body = format!(
            "error: {self}\ndetails: {}\n",
            self.details().unwrap_or_default()
        );

        let cause: &'static str = (&self).into();
        let mut resp = (
            self.status_code(),
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            body,
        )
            .into_response();

        resp.headers_mut()
            .insert(X_ERROR_CAUSE, HeaderValue::from_static(cause));
        resp.extensions_mut().insert(self);
        resp
    }
}

impl From<&reqwest::Error> for ErrorCause {
    fn from(e: &reqwest::Error) -> Self {
        if e.is_connect() {
            return Self::BackendErrorConnect;
        }

        if e.is_timeout() {
            return Self::BackendTimeout;
        }

        if e.is_body() || e.is_decode() {
            return Self::BackendBodyError(e.to_string());
        }

        Self::BackendError(e.to_string())
    }
}
