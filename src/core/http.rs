use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING};
use reqwest::Client;

pub const DEFAULT_USER_AGENT: &str = concat!("launch-profile/", env!("CARGO_PKG_VERSION"));

/// Client shared by every network-backed provider.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(user_agent)
        .default_headers(default_headers)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_agent() {
        assert!(build_http_client(DEFAULT_USER_AGENT).is_ok());
        assert!(DEFAULT_USER_AGENT.starts_with("launch-profile/"));
    }
}
