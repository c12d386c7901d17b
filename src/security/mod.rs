/// TLS termination support for the WebSocket listener.
pub mod tls;

#[cfg(feature = "tls")]
pub use tls::build_rustls_config;
