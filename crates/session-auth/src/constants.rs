//! Wire and storage constants shared with the learning platform backend

/// Fallback API base when none is configured. Matches the backend's dev port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8001/api";

/// Path of the refresh exchange, relative to the API base.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Storage key of the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Full refresh exchange URL for a given API base.
pub fn refresh_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH)
}

/// Whether a request path or URL targets the refresh exchange itself.
///
/// Substring match: the path may be absolute, relative to the base, or
/// carry a query string.
pub fn is_refresh_path(path: &str) -> bool {
    path.contains(REFRESH_PATH)
}
