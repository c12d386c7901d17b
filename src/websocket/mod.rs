// WebSocket transport: upgrade handler, connection read/write pumps,
// outbound frame encoding, HTTP routes, and metrics endpoints.
//
// - handler: pre-upgrade authentication (entry point)
// - connection: read/write pump tasks for one connection
// - sending: outbound frame serialization
// - routes: HTTP route setup (health, metrics, websocket upgrade)
// - metrics: metrics endpoint handlers and auth
// - prometheus: Prometheus text exposition rendering

mod connection;
mod handler;
mod metrics;
mod prometheus;
mod routes;
mod sending;

pub use handler::websocket_handler;
pub use metrics::{metrics_handler, prometheus_metrics_handler, MetricsQuery};
pub use routes::{create_router, run_server};
