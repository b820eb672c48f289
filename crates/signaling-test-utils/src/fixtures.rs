//! Fixed secrets and configuration for tests.

use signaling_server::config::Config;
use std::collections::HashMap;

/// HS256 secret used by every test server and token.
pub const TEST_JWT_SECRET: &str = "signaling-test-secret-do-not-use-in-prod";

/// 32 bytes of chat key material, base64 encoded.
pub const TEST_CHAT_KEY_B64: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

/// Environment variables for a test server bound to an ephemeral port.
pub fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        (
            "SIGNALING_JWT_SECRET".to_string(),
            TEST_JWT_SECRET.to_string(),
        ),
        (
            "SIGNALING_CHAT_ENCRYPTION_KEY".to_string(),
            TEST_CHAT_KEY_B64.to_string(),
        ),
        (
            "SIGNALING_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        ),
        (
            "SIGNALING_HEALTH_BIND_ADDRESS".to_string(),
            "127.0.0.1:0".to_string(),
        ),
        (
            "SIGNALING_INSTANCE_ID".to_string(),
            "signaling-test".to_string(),
        ),
    ])
}

/// Configuration built from [`test_vars`].
pub fn test_config() -> Config {
    Config::from_vars(&test_vars()).expect("test configuration should be valid")
}
