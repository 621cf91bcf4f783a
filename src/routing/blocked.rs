use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, VARY, X_CONTENT_TYPE_OPTIONS},
};
use serde_json::json;

use super::i18n::Locale;
use crate::{
    http::headers::{
        CACHE_CONTROL_NO_STORE, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON,
        X_CONTENT_TYPE_OPTIONS_NO_SNIFF,
    },
    policy::engine::ResponseFormat,
};

const BLOCKED_PAGE_TEMPLATE: &str = include_str!("blocked_page/template.html");

// Minimal escaping for the text that goes into the page
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_page(locale: Locale) -> String {
    let lang: &'static str = locale.into();

    BLOCKED_PAGE_TEMPLATE
        .replace("{{LANG}}", lang)
        .replace("{{TITLE}}", &escape_html(locale.title()))
        .replace("{{MESSAGE}}", &escape_html(locale.blocked_message()))
}

/// Builds the response for a blocked request.
/// This is the only place that decides what a blocked client gets to see.
#[derive(Debug, Clone)]
pub struct BlockedResponder {
    default_locale: Locale,
}

impl BlockedResponder {
    pub const fn new(default_locale: Locale) -> Self {
        Self { default_locale }
    }

    pub fn respond(
        &self,
        format: ResponseFormat,
        redirect: Option<&str>,
        headers: &HeaderMap,
    ) -> Response {
        let mut response = self.build(format, redirect, headers);

        let h = response.headers_mut();
        h.insert(CACHE_CONTROL, CACHE_CONTROL_NO_STORE);
        h.insert(X_CONTENT_TYPE_OPTIONS, X_CONTENT_TYPE_OPTIONS_NO_SNIFF);
        // The outcome depends on the client's location, don't let caches mix them up
        h.insert(VARY, HeaderValue::from_static("accept, accept-language"));

        response
    }

    fn build(
        &self,
        format: ResponseFormat,
        redirect: Option<&str>,
        headers: &HeaderMap,
    ) -> Response {
        if format == ResponseFormat::Html {
            // Invalid URL falls through to the page
            if let Some(v) = redirect.and_then(|x| HeaderValue::from_str(x).ok()) {
                return (StatusCode::FOUND, [(LOCATION, v)]).into_response();
            }
        }

        match format {
            ResponseFormat::Html => {
                let locale = super::i18n::negotiate(headers, self.default_locale);

                (
                    StatusCode::FORBIDDEN,
                    [(CONTENT_TYPE, CONTENT_TYPE_HTML)],
                    render_page(locale),
                )
                    .into_response()
            }

            ResponseFormat::Json => {
                let locale = super::i18n::negotiate(headers, self.default_locale);
                let body = json!({ "errors": [locale.blocked_message()] }).to_string();

                (
                    StatusCode::FORBIDDEN,
                    [(CONTENT_TYPE, CONTENT_TYPE_JSON)],
                    body,
                )
                    .into_response()
            }

            ResponseFormat::Other => {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::FORBIDDEN;
                response
            }
        }
    }
}
