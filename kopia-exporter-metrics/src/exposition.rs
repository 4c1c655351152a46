//! Text exposition and the HTTP pull endpoint.
//!
//! With the `server` feature, a registry can be served over HTTP so
//! Prometheus can scrape it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kopia_exporter_metrics::exposition::{start_server, EndpointConfig};
//! use kopia_exporter_metrics::Registry;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = EndpointConfig::builder()
//!         .listen_addr("0.0.0.0:9884")
//!         .metrics_path("/metrics")
//!         .build();
//!
//!     let server = start_server(Registry::new(), &config).await?;
//!
//!     // Metrics available at http://localhost:9884/metrics
//!     server.handle.await.ok();
//!     Ok(())
//! }
//! ```

use prometheus::{Registry, TextEncoder};

/// Content type of the text exposition format.
pub use prometheus::TEXT_FORMAT as TEXT_CONTENT_TYPE;

/// Render every family gathered from `registry` in the text format.
pub fn encode(registry: &Registry) -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&registry.gather())
}

/// Configuration for the metrics endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Address to listen on (e.g., "0.0.0.0:9884")
    pub listen_addr: String,
    /// Path for metrics endpoint (e.g., "/metrics")
    pub metrics_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9884".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Create a new builder for EndpointConfig.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }
}

/// Builder for EndpointConfig.
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
}

impl EndpointConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Listen on all interfaces on the given port.
    pub fn port(self, port: u16) -> Self {
        self.listen_addr(format!("0.0.0.0:{}", port))
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    pub fn build(self) -> EndpointConfig {
        let defaults = EndpointConfig::default();
        EndpointConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            metrics_path: self.metrics_path.unwrap_or(defaults.metrics_path),
        }
    }
}

#[cfg(feature = "server")]
pub use server::{start_server, RunningServer};

#[cfg(feature = "server")]
mod server {
    use std::convert::Infallible;
    use std::io;
    use std::net::SocketAddr;

    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::Registry;
    use tokio::net::TcpListener;
    use tracing::{debug, error, info};

    use super::{encode, EndpointConfig, TEXT_CONTENT_TYPE};

    /// A metrics endpoint running in the background.
    #[derive(Debug)]
    pub struct RunningServer {
        /// The address actually bound (useful when listening on port 0).
        pub local_addr: SocketAddr,
        /// The accept loop. Abort it to stop serving.
        pub handle: tokio::task::JoinHandle<()>,
    }

    /// Bind the metrics endpoint and serve `registry` from a background task.
    ///
    /// Binding happens before this returns, so an unavailable port is reported
    /// to the caller. Every scrape gathers the registry's current state.
    pub async fn start_server(
        registry: Registry,
        config: &EndpointConfig,
    ) -> io::Result<RunningServer> {
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Serving metrics on http://{}{}", local_addr, config.metrics_path);

        let metrics_path = config.metrics_path.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = run_server(listener, metrics_path, registry).await {
                error!("Metrics server error: {}", e);
            }
        });

        Ok(RunningServer { local_addr, handle })
    }

    async fn run_server(
        listener: TcpListener,
        metrics_path: String,
        registry: Registry,
    ) -> io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("Scrape connection from {}", peer);
            let io = TokioIo::new(stream);

            let metrics_path = metrics_path.clone();
            let registry = registry.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let metrics_path = metrics_path.clone();
                    let registry = registry.clone();

                    async move { handle_request(req, &metrics_path, &registry) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }

    fn handle_request(
        req: Request<hyper::body::Incoming>,
        metrics_path: &str,
        registry: &Registry,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = req.uri().path();

        let response = if path == metrics_path || path == "/" {
            match encode(registry) {
                Ok(body) => text_response(StatusCode::OK, TEXT_CONTENT_TYPE, body),
                Err(e) => {
                    error!("Failed to encode metrics: {}", e);
                    text_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "text/plain",
                        e.to_string(),
                    )
                }
            }
        } else if path == "/health" || path == "/healthz" {
            text_response(StatusCode::OK, "text/plain", "OK".to_string())
        } else {
            text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())
        };

        Ok(response)
    }

    fn text_response(
        status: StatusCode,
        content_type: &'static str,
        body: String,
    ) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{GaugeVec, Opts};

    fn gauge(registry: &Registry, name: &str, help: &str) -> GaugeVec {
        let gauge = GaugeVec::new(Opts::new(name, help), &["host", "path", "user"]).unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge
    }

    #[test]
    fn test_encode_samples_and_headers() {
        let registry = Registry::new();
        let size = gauge(&registry, "total_size", "Total size of the backup");
        size.with_label_values(&["freenas", "/mnt/media", "root"])
            .set(162291781350.0);
        size.with_label_values(&["freenas", "/mnt/docs", "root"]).set(277.0);
        gauge(&registry, "backup_start_time", "Start time of the backup")
            .with_label_values(&["freenas", "/mnt/media", "root"])
            .set(1725180944.903686);

        let output = encode(&registry).unwrap();

        assert!(output.contains("# HELP total_size Total size of the backup\n"));
        assert!(output.contains("# TYPE total_size gauge\n"));
        assert!(output.contains(
            "total_size{host=\"freenas\",path=\"/mnt/media\",user=\"root\"} 162291781350\n"
        ));
        assert!(output.contains("total_size{host=\"freenas\",path=\"/mnt/docs\",user=\"root\"} 277\n"));
        assert!(output.contains(
            "backup_start_time{host=\"freenas\",path=\"/mnt/media\",user=\"root\"} 1725180944.903686\n"
        ));
    }

    #[test]
    fn test_encode_escapes_label_values() {
        let registry = Registry::new();
        gauge(&registry, "dir_count", "dirs")
            .with_label_values(&["pc", "C:\\Users\\\"me\"", "me"])
            .set(3.0);

        let output = encode(&registry).unwrap();
        assert!(output.contains(r#"dir_count{host="pc",path="C:\\Users\\\"me\"",user="me"} 3"#));
    }

    #[test]
    fn test_endpoint_config_builder() {
        let config = EndpointConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .metrics_path("/custom-metrics")
            .build();

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.metrics_path, "/custom-metrics");

        let config = EndpointConfig::builder().port(9999).build();
        assert_eq!(config.listen_addr, "0.0.0.0:9999");

        let config = EndpointConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:9884");
        assert_eq!(config.metrics_path, "/metrics");
    }

    #[cfg(feature = "server")]
    mod server_tests {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        async fn get(addr: std::net::SocketAddr, path: &str) -> String {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let request = format!(
                "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                path
            );
            stream.write_all(request.as_bytes()).await.unwrap();

            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        }

        fn local_config() -> EndpointConfig {
            EndpointConfig::builder().listen_addr("127.0.0.1:0").build()
        }

        #[tokio::test]
        async fn test_server_serves_current_state() {
            let registry = Registry::new();
            let files = gauge(&registry, "file_count", "Number of files in the backup");

            let server = start_server(registry, &local_config()).await.unwrap();
            let series = files.with_label_values(&["nas", "/data", "root"]);

            series.set(1.0);
            let first = get(server.local_addr, "/metrics").await;
            assert!(first.starts_with("HTTP/1.1 200 OK"));
            assert!(first.contains("text/plain; version=0.0.4"));
            assert!(first.contains("file_count{host=\"nas\",path=\"/data\",user=\"root\"} 1\n"));

            series.set(42.0);
            let second = get(server.local_addr, "/").await;
            assert!(second.contains("file_count{host=\"nas\",path=\"/data\",user=\"root\"} 42\n"));

            server.handle.abort();
        }

        #[tokio::test]
        async fn test_server_health_and_not_found() {
            let server = start_server(Registry::new(), &local_config()).await.unwrap();

            let health = get(server.local_addr, "/healthz").await;
            assert!(health.starts_with("HTTP/1.1 200 OK"));
            assert!(health.ends_with("OK"));

            let missing = get(server.local_addr, "/nope").await;
            assert!(missing.starts_with("HTTP/1.1 404 Not Found"));

            server.handle.abort();
        }

        #[tokio::test]
        async fn test_server_reports_bind_failure() {
            let first = start_server(Registry::new(), &local_config()).await.unwrap();
            let taken = EndpointConfig::builder()
                .listen_addr(first.local_addr.to_string())
                .build();

            assert!(start_server(Registry::new(), &taken).await.is_err());
            first.handle.abort();
        }

        #[tokio::test]
        async fn test_server_rejects_bad_address() {
            let config = EndpointConfig::builder().listen_addr("not an address").build();
            let err = start_server(Registry::new(), &config).await.unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        }
    }
}
