use std::time::Duration;

use crate::error::Error;

pub(crate) fn record_ok(netfn: u8, cmd: u8, elapsed: Duration) {
    let _ = (netfn, cmd, elapsed);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("ipmilan_requests_total", "outcome" => "ok").increment(1);
        metrics::histogram!("ipmilan_request_seconds").record(elapsed.as_secs_f64());
    }

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            netfn,
            cmd,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request ok"
        );
    }
}

pub(crate) fn record_err(netfn: u8, cmd: u8, elapsed: Duration, err: &Error) {
    let _ = (netfn, cmd, elapsed, err);

    #[cfg(feature = "metrics")]
    {
        metrics::counter!("ipmilan_requests_total", "outcome" => "err").increment(1);
        metrics::counter!("ipmilan_request_errors_total", "kind" => error_kind(err)).increment(1);
        metrics::histogram!("ipmilan_request_seconds").record(elapsed.as_secs_f64());
    }

    #[cfg(feature = "tracing")]
    {
        tracing::warn!(
            netfn,
            cmd,
            error = %err,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "ipmi request failed"
        );
    }
}

#[cfg(feature = "metrics")]
fn error_kind(err: &Error) -> &'static str {
    match err {
        Error::Io(_) => "io",
        Error::Timeout => "timeout",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::Message(_) | Error::MessageOwned(_) => "message",
        Error::AuthenticationFailed(_) => "authentication",
        Error::Crypto(_) => "crypto",
        Error::Unsupported(_) => "unsupported",
        Error::Command { .. } => "completion_code",
    }
}
