//! Reachability diagnostics for the configured backend.

use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::backends::{self, is_success_status};
use crate::config::{BackendConfig, BackendMode};
use crate::executor::{Completion, RequestExecutor};

/// Outcome of one probe request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub mode: BackendMode,
    /// URL that was probed
    pub target: String,
    /// An HTTP response of any status came back
    pub reachable: bool,
    pub status: Option<u16>,
    #[serde(with = "millis")]
    pub latency: Duration,
    pub detail: String,
}

impl ProbeReport {
    /// Reachable and answered with a 2xx status
    pub fn is_healthy(&self) -> bool {
        self.reachable && self.status.is_some_and(is_success_status)
    }
}

/// Issue the backend's probe request and time it
pub async fn probe(
    executor: &RequestExecutor,
    config: &BackendConfig,
    cancel: &CancellationToken,
) -> ProbeReport {
    let backend = backends::for_config(config);
    let spec = backend.probe_request();
    let target = spec.url.clone();

    let started = Instant::now();
    let completion = executor.execute_with(spec, cancel).completion().await;
    let latency = started.elapsed();

    let (reachable, status, detail) = match completion {
        Completion::Success { status, .. } => {
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("");
            (true, Some(status), format!("HTTP {} {}", status, reason).trim().to_string())
        }
        Completion::Failure(e) => (false, None, e.to_string()),
        Completion::Cancelled => (false, None, "cancelled".to_string()),
    };

    tracing::debug!(
        url = %target,
        reachable,
        ?status,
        latency_ms = latency.as_millis() as u64,
        "Probe finished"
    );

    ProbeReport {
        mode: config.mode(),
        target,
        reachable,
        status,
        latency,
        detail,
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
