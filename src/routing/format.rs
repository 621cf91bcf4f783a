use http::{HeaderMap, header::ACCEPT};

use crate::policy::engine::ResponseFormat;

/// Figures out what kind of response the client wants.
///
/// A `.json` path wins, then the `Accept` header is consulted in order.
/// Browsers always send `text/html` or at least `*/*`.
pub fn negotiate(path: &str, headers: &HeaderMap) -> ResponseFormat {
    if path.ends_with(".json") {
        return ResponseFormat::Json;
    }

    for media in headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|x| x.to_str().ok())
        .flat_map(|x| x.split(','))
        // Drop the parameters like q=0.9
        .filter_map(|x| x.split(';').next())
        .map(str::trim)
        .filter(|x| !x.is_empty())
    {
        if media.eq_ignore_ascii_case("text/html")
            || media.eq_ignore_ascii_case("application/xhtml+xml")
            || media == "*/*"
        {
            return ResponseFormat::Html;
        }

        if media.eq_ignore_ascii_case("application/json") {
            return ResponseFormat::Json;
        }
    }

    // Either nothing was asked for, or something we don't render
    ResponseFormat::Other
}
