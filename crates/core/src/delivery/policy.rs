//! Delivery outcome classification
//!
//! Maps a failed delivery attempt to the action the worker takes next. The
//! only retried case is an expired credential (401): force a fresh login and
//! retry the same request exactly once. Everything else is archived and
//! picked up by a later drain, trading latency for guaranteed non-loss
//! without a generic backoff scheduler.

use roadwatch_domain::DeviceError;

/// What to do with a failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// Force a fresh login, then retry the same request once
    RetryAfterLogin,
    /// Write the event to the offline store and count the attempt as failed
    Archive,
}

/// Classify a failed delivery attempt
pub fn classify(error: &DeviceError) -> DeliveryDecision {
    match error {
        DeviceError::Unauthorized(_) => DeliveryDecision::RetryAfterLogin,
        _ => DeliveryDecision::Archive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_triggers_single_reauth_retry() {
        let error = DeviceError::Unauthorized("token expired".to_string());
        assert_eq!(classify(&error), DeliveryDecision::RetryAfterLogin);
    }

    #[test]
    fn test_forbidden_archives_without_retry() {
        let error = DeviceError::Rejected { status: 403, message: "forbidden".to_string() };
        assert_eq!(classify(&error), DeliveryDecision::Archive);
    }

    #[test]
    fn test_rate_limit_archives_without_retry() {
        let error = DeviceError::Rejected { status: 429, message: "slow down".to_string() };
        assert_eq!(classify(&error), DeliveryDecision::Archive);
    }

    #[test]
    fn test_server_error_archives() {
        let error = DeviceError::Rejected { status: 500, message: "boom".to_string() };
        assert_eq!(classify(&error), DeliveryDecision::Archive);
    }

    #[test]
    fn test_transport_failure_archives() {
        let error = DeviceError::Transport("connection refused".to_string());
        assert_eq!(classify(&error), DeliveryDecision::Archive);
    }

    #[test]
    fn test_auth_failure_archives() {
        // Headers unavailable before the request even went out
        let error = DeviceError::Auth("login and refresh both failed".to_string());
        assert_eq!(classify(&error), DeliveryDecision::Archive);
    }
}
