//! Pipeline counters
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! installs a recorder.
//!
//! - `dispatch_token_refresh_total` (counter): label `outcome`
//! - `dispatch_retry_decisions_total` (counter): label `decision`
//! - `dispatch_requests_total` (counter): label `outcome`
//! - `dispatch_request_errors_total` (counter): label `error_type`

use crate::coordinator::RetryDecision;
use crate::error::NetworkError;

/// Record the end of a refresh round (`success`, `failure` or `timeout`).
pub fn record_refresh(outcome: &'static str) {
    ::metrics::counter!("dispatch_token_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_retry_decision(decision: &RetryDecision) {
    ::metrics::counter!("dispatch_retry_decisions_total", "decision" => decision.label())
        .increment(1);
}

/// Record the final outcome of a logical request, after any replays.
pub fn record_request(result: Result<(), &NetworkError>) {
    match result {
        Ok(()) => {
            ::metrics::counter!("dispatch_requests_total", "outcome" => "success").increment(1);
        }
        Err(err) => {
            ::metrics::counter!("dispatch_requests_total", "outcome" => "error").increment(1);
            ::metrics::counter!("dispatch_request_errors_total", "error_type" => err.label())
                .increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_refresh("success");
        record_retry_decision(&RetryDecision::Retry);
        record_retry_decision(&RetryDecision::DoNotRetryWithError(NetworkError::NotFound));
        record_request(Ok(()));
        record_request(Err(&NetworkError::ServerError(502)));
    }
}
