use std::time::Duration;
use ureq::{Agent, Error as UreqError};

use crate::error::AiError;

const TIMEOUT_GLOBAL: Duration = Duration::from_secs(60);
const TIMEOUT_RESOLVE: Duration = Duration::from_secs(5);
const TIMEOUT_CONNECT: Duration = Duration::from_secs(5);
const TIMEOUT_SEND_REQUEST: Duration = Duration::from_secs(5);
const TIMEOUT_SEND_BODY: Duration = Duration::from_secs(10);
const TIMEOUT_RECV_RESPONSE: Duration = Duration::from_secs(30);
const TIMEOUT_RECV_BODY: Duration = Duration::from_secs(30);

pub fn default_agent() -> Agent {
    let config = Agent::config_builder()
        .timeout_global(Some(TIMEOUT_GLOBAL))
        .timeout_resolve(Some(TIMEOUT_RESOLVE))
        .timeout_connect(Some(TIMEOUT_CONNECT))
        .timeout_send_request(Some(TIMEOUT_SEND_REQUEST))
        .timeout_send_body(Some(TIMEOUT_SEND_BODY))
        .timeout_recv_response(Some(TIMEOUT_RECV_RESPONSE))
        .timeout_recv_body(Some(TIMEOUT_RECV_BODY))
        .build();
    config.into()
}

/// 429 is the only status that pauses a provider; everything else is a
/// plain failure for this call.
pub fn classify_error(err: UreqError) -> AiError {
    match err {
        UreqError::StatusCode(429) => AiError::QuotaExceeded,
        UreqError::StatusCode(code) => AiError::Network(format!("http status {code}")),
        other => AiError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert!(matches!(classify_error(UreqError::StatusCode(429)), AiError::QuotaExceeded));
        assert!(matches!(classify_error(UreqError::StatusCode(503)), AiError::Network(_)));
        assert!(matches!(classify_error(UreqError::HostNotFound), AiError::Network(_)));
    }
}
