//! Shared utility functions for the indexer service

use axum::http::StatusCode;
use election_core::state::Address;
use tracing::info;

/// Parse a path or query address, mapping failures to 400
pub fn parse_address(raw: &str) -> Result<Address, StatusCode> {
    raw.parse().map_err(|e| {
        info!("Rejecting address '{}': {}", raw, e);
        StatusCode::BAD_REQUEST
    })
}

/// Parse an environment variable into a type implementing FromStr, with a default fallback
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read an environment variable, treating empty values as unset
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_normalizes_case() {
        let addr = parse_address("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_parse_address_invalid() {
        assert_eq!(parse_address("0x1234"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_address("not-an-address"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_address(""), Err(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("INDEXER_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse("INDEXER_TEST_ENV_PARSE", 7u16), 7);
        std::env::set_var("INDEXER_TEST_ENV_PARSE", "8080");
        assert_eq!(env_parse("INDEXER_TEST_ENV_PARSE", 7u16), 8080);
        std::env::remove_var("INDEXER_TEST_ENV_PARSE");
    }
}
