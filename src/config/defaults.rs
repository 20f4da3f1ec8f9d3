//! Default configuration values

/// Fixed engine user agent sent with every request
pub const USER_AGENT: &str = "ProductName/211 CFNetwork/1568.100.1.2.1 Darwin/24.0.0";

/// Content type of encrypted MessagePack bodies, both directions
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type prefix the server uses for plain JSON responses
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default user agent, for serde
pub fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

/// Default URL scheme for both API surfaces
pub fn default_scheme() -> String {
    "https".to_string()
}

/// Default request timeout in seconds
pub const fn default_timeout() -> u64 {
    30
}

/// Default connect timeout in seconds
pub const fn default_connect_timeout() -> u64 {
    10
}
