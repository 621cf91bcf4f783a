// Clippy complains that these are interior-mutable.
// We don't mutate them, so silence it.
// https://rust-lang.github.io/rust-clippy/master/index.html#/declare_interior_mutable_const
#![allow(clippy::declare_interior_mutable_const)]
#![allow(clippy::borrow_interior_mutable_const)]

use http::header::{HeaderName, HeaderValue};

// Header names
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_GEOBLOCK_REASON: HeaderName = HeaderName::from_static("x-geoblock-reason");
pub const X_ERROR_CAUSE: HeaderName = HeaderName::from_static("x-error-cause");

// Header values
pub const CONTENT_TYPE_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
pub const CONTENT_TYPE_JSON: HeaderValue = HeaderValue::from_static("application/json");
pub const CACHE_CONTROL_NO_STORE: HeaderValue = HeaderValue::from_static("no-store");
pub const X_CONTENT_TYPE_OPTIONS_NO_SNIFF: HeaderValue = HeaderValue::from_static("nosniff");
