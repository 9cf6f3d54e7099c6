//! services/api/src/adapters/probe.rs
//!
//! Timed HTTP probe implementing the `ConnectivityProbe` port.

use async_trait::async_trait;
use quran_companion_core::connectivity::{classify, ProbeOutcome};
use quran_companion_core::domain::ConnectionQuality;
use quran_companion_core::ports::ConnectivityProbe;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
    timeout: Duration,
    slow_after: Duration,
}

impl HttpProbe {
    pub fn new(client: Client, url: String, timeout: Duration, slow_after: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
            slow_after,
        }
    }

    async fn measure(&self) -> ProbeOutcome {
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, self.client.get(&self.url).send()).await {
            Err(_) => ProbeOutcome::TimedOut,
            Ok(Err(e)) => {
                debug!("Connectivity probe failed: {}", e);
                ProbeOutcome::Failed
            }
            Ok(Ok(response)) => outcome_for_status(response.status(), started.elapsed()),
        }
    }
}

/// A reply only counts as completed with a success status.
fn outcome_for_status(status: StatusCode, elapsed: Duration) -> ProbeOutcome {
    if status.is_success() {
        ProbeOutcome::Completed { elapsed }
    } else {
        debug!("Connectivity probe got status {}", status);
        ProbeOutcome::Failed
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> ConnectionQuality {
        let outcome = self.measure().await;
        let quality = classify(outcome, self.slow_after);
        debug!("Connectivity probe {:?} -> {}", outcome, quality.as_str());
        quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn error_statuses_count_as_failed() {
        let elapsed = Duration::from_millis(80);
        assert_eq!(outcome_for_status(StatusCode::OK, elapsed), ProbeOutcome::Completed { elapsed });
        assert_eq!(outcome_for_status(StatusCode::NO_CONTENT, elapsed), ProbeOutcome::Completed { elapsed });
        assert_eq!(outcome_for_status(StatusCode::NOT_FOUND, elapsed), ProbeOutcome::Failed);
        assert_eq!(outcome_for_status(StatusCode::SERVICE_UNAVAILABLE, elapsed), ProbeOutcome::Failed);
        assert_eq!(
            classify(outcome_for_status(StatusCode::BAD_GATEWAY, elapsed), Duration::from_secs(2)),
            ConnectionQuality::Offline
        );
    }

    #[tokio::test]
    async fn silent_server_reads_as_slow() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let probe = HttpProbe::new(
            Client::new(),
            format!("http://{}/meta", addr),
            Duration::from_millis(150),
            Duration::from_secs(2),
        );
        assert_eq!(probe.measure().await, ProbeOutcome::TimedOut);
        assert_eq!(probe.probe().await, ConnectionQuality::Slow);
        server.abort();
    }

    #[tokio::test]
    async fn unreachable_host_is_offline() {
        let probe = HttpProbe::new(
            Client::new(),
            "http://127.0.0.1:9/".to_string(),
            Duration::from_secs(5),
            Duration::from_secs(2),
        );
        assert_eq!(probe.probe().await, ConnectionQuality::Offline);
    }
}
