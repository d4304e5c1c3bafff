//! Client-side counters for the refresh path
//!
//! Emitted through the `metrics` facade; a host that installs no recorder
//! pays nothing. Exposed names:
//!
//! - `api_client_token_refresh_total` (counter): label `outcome`
//!   (`success`, `failure` or `logged_out`)
//! - `api_client_refresh_waiters` (histogram): calls released per exchange
//! - `api_client_replays_total` (counter)
//! - `api_client_unauthorized_total` (counter): label `disposition`

/// Record a settled refresh exchange and how many calls it released.
pub fn record_refresh(outcome: &'static str, released: usize) {
    metrics::counter!("api_client_token_refresh_total", "outcome" => outcome).increment(1);
    metrics::histogram!("api_client_refresh_waiters").record(released as f64);
}

/// Record a call being replayed with a fresh access token.
pub fn record_replay() {
    metrics::counter!("api_client_replays_total").increment(1);
}

/// Record what happened to a 401: `refresh`, `queued`, `stale`, `rejected`
/// or `no_refresh_token`.
pub fn record_unauthorized(disposition: &'static str) {
    metrics::counter!("api_client_unauthorized_total", "disposition" => disposition).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_refresh("success", 3);
        record_replay();
        record_unauthorized("queued");
    }

    #[test]
    fn refresh_outcomes_are_labelled() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh("success", 5);
        record_refresh("failure", 2);

        let output = handle.render();
        assert!(output.contains("api_client_token_refresh_total"));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("api_client_refresh_waiters"));
    }

    #[test]
    fn unauthorized_dispositions_are_labelled() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_unauthorized("refresh");
        record_unauthorized("rejected");
        record_replay();

        let output = handle.render();
        assert!(output.contains("disposition=\"refresh\""));
        assert!(output.contains("disposition=\"rejected\""));
        assert!(output.contains("api_client_replays_total"));
    }
}
