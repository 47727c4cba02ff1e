//! Replay meter for running the whole pipeline without a smart plug.
//!
//! Serves `GET /meter/0` → `{"power": N}`, stepping through a recorded brew
//! on every request and starting over at the end.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tracing::info;

/// One double-pot brew: off, heater ramp-up, brewing, warmer only, off.
pub const BREW_TRACE: &[f64] = &[
    0.0, 0.0, 0.0, 0.0, //
    1257.4, 1523.3, 1493.6, 1300.2, 1300.7, 1302.4, 1297.2, 1300.2, 1300.7, 1302.4, 1297.2, //
    1257.4, 1523.3, 1493.6, 1300.2, 1300.7, 1302.4, 1297.2, 1300.2, 1300.7, 1302.4, 1297.2, //
    1300.2, 1300.7, 1302.4, 1297.2, 1300.2, 1300.7, 1302.4, 1297.2, //
    102.3, 102.3, 150.4, 149.2, 100.2, 100.2, 102.3, 102.3, 150.4, //
    149.2, 100.2, 100.2, 102.3, 102.3, 150.4, 149.2, 100.2, 100.2, //
    149.2, 100.2, 100.2, 102.3, 102.3, 150.4, 149.2, 100.2, 100.2, //
    149.2, 100.2, 100.2, 102.3, 102.3, 150.4, 149.2, 100.2, 100.2, //
    102.3, 102.3, 150.4, 149.2, 100.2, 100.2, //
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

const SWITCHED_OFF: &[f64] = &[0.0];

#[derive(Clone)]
struct Replay {
    trace: &'static [f64],
    cursor: Arc<AtomicUsize>,
}

impl Replay {
    fn next(&self) -> f64 {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.trace[i % self.trace.len()]
    }
}

async fn meter_value(State(replay): State<Replay>) -> Json<Value> {
    Json(json!({ "power": replay.next() }))
}

/// Router replaying `trace`; an empty trace replays a switched-off brewer.
pub fn router(trace: &'static [f64]) -> Router {
    let trace = if trace.is_empty() { SWITCHED_OFF } else { trace };
    Router::new()
        .route("/", get(|| async { "brew-watch replay meter" }))
        .route("/meter/0", get(meter_value))
        .with_state(Replay {
            trace,
            cursor: Arc::new(AtomicUsize::new(0)),
        })
}

pub async fn serve<F>(port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Replay meter listening on http://{}/meter/0", actual_addr);
    info!(
        "Point the monitor at it with BREW_SENSOR__URL=http://{}/meter/0",
        actual_addr
    );

    axum::serve(listener, router(BREW_TRACE))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Replay meter error")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(trace: &'static [f64]) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router(trace)).await.unwrap();
        });
        format!("http://127.0.0.1:{}/meter/0", port)
    }

    async fn power(url: &str) -> f64 {
        let body: Value = reqwest::get(url).await.unwrap().json().await.unwrap();
        body["power"].as_f64().unwrap()
    }

    #[tokio::test]
    async fn test_replays_and_wraps() {
        let url = spawn(&[0.0, 1300.2, 150.4]).await;

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(power(&url).await);
        }
        assert_eq!(seen, vec![0.0, 1300.2, 150.4, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_trace_reports_off() {
        let url = spawn(&[]).await;
        assert_eq!(power(&url).await, 0.0);
    }

    #[test]
    fn test_trace_starts_and_ends_off() {
        assert_eq!(BREW_TRACE.first(), Some(&0.0));
        assert_eq!(BREW_TRACE.last(), Some(&0.0));
        assert!(BREW_TRACE.iter().any(|&w| w > 1000.0));
    }

    #[tokio::test]
    async fn test_meter_adapter_reads_replay() {
        use brew_signal::PowerSource;

        let url = spawn(BREW_TRACE).await;
        let mut meter =
            crate::meter::HttpMeter::new(url, std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(meter.read().await.unwrap(), 0.0);
    }
}
