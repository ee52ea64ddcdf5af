use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const METRICS_ADDR: &str = "0.0.0.0:8002";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=info,tower_http=warn")
        .init();

    PrometheusBuilder::new()
        .with_http_listener(METRICS_ADDR.parse::<SocketAddr>()?)
        .install()?;

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let jitter_ms: u64 = std::env::var("MOCK_JITTER_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let config = MockConfig {
        max_jitter: Duration::from_millis(jitter_ms),
        ..Default::default()
    };
    mock_service::run(addr, config).await
}
