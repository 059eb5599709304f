use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// With `listen_port` set, `/metrics` is also served on `0.0.0.0:<port>`;
/// that requires a running Tokio runtime. The first successful call wins and
/// later calls return the same handle.
pub fn init_metrics(listen_port: Option<u16>) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    let handle = match listen_port {
        Some(port) => install_with_listener(port),
        None => install_recorder_only(),
    }?;

    let _ = PROMETHEUS_HANDLE.set(handle);
    PROMETHEUS_HANDLE.get()
}

fn install_recorder_only() -> Option<PrometheusHandle> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    match metrics::set_global_recorder(recorder) {
        Ok(()) => {
            info!("installed prometheus recorder");
            Some(handle)
        }
        Err(_) => {
            warn!("a global metrics recorder is already installed");
            None
        }
    }
}

fn install_with_listener(port: u16) -> Option<PrometheusHandle> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (recorder, exporter) = match PrometheusBuilder::new().with_http_listener(addr).build() {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            return None;
        }
    };
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        warn!(metrics_port = port, "a global metrics recorder is already installed");
        return None;
    }

    tokio::spawn(async move {
        if let Err(err) = exporter.await {
            warn!(error = ?err, "prometheus exporter stopped");
        }
    });
    info!(metrics_port = port, "started prometheus exporter");
    Some(handle)
}
