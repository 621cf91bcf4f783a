use ahash::AHashSet;

use super::split_list;

/// Asset delivery uses nested subpaths, so these are matched by prefix
pub const STATIC_PATHS: [&str; 5] = [
    "assets/",
    "images/",
    "uploads/",
    "stylesheets/",
    "service-worker/",
];

/// Operational routes that must stay reachable regardless of the policy.
/// Matched exactly to avoid opening up whole subtrees.
pub const ALWAYS_OPEN_PATHS: [&str; 7] = [
    "srv/status",
    "u/admin-login",
    "users/admin-login",
    "session/email-login",
    "session/csrf",
    "logs/report_js_error",
    "manifest.webmanifest",
];

/// Classifies request paths that bypass geoblocking
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    // Normalized to "" or "/forum"
    prefix: String,
    always_open: AHashSet<&'static str>,
}

impl RouteClassifier {
    pub fn new(url_prefix: &str) -> Self {
        let prefix = url_prefix.trim().trim_matches('/');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("/{prefix}")
        };

        Self {
            prefix,
            always_open: ALWAYS_OPEN_PATHS.into_iter().collect(),
        }
    }

    /// Returns the path relative to the deployment prefix without the leading slash.
    /// Paths outside of the prefix give `None`.
    fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
    }

    pub fn is_static(&self, path: &str) -> bool {
        self.relative(path)
            .is_some_and(|x| STATIC_PATHS.iter().any(|p| x.starts_with(p)))
    }

    pub fn is_always_open(&self, path: &str) -> bool {
        self.relative(path)
            .is_some_and(|x| !x.is_empty() && self.always_open.contains(x))
    }

    /// Exact match against the pipe-delimited list from the settings
    pub fn is_explicitly_allowed(&self, path: &str, allowed_paths: &str) -> bool {
        let Some(path) = self.relative(path).filter(|x| !x.is_empty()) else {
            return false;
        };

        split_list(allowed_paths).any(|x| x.trim_start_matches('/') == path)
    }
}
