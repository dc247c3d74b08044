use rill_http::codec::ParserConfig;
use rill_http::connection::ConnectionConfig;
use std::time::Duration;

/// Server configuration. Only the port is required; everything else has the
/// documented default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_connections: usize,
    pub read_timeout: Duration,
    pub keep_alive_timeout: Duration,
    pub max_header_size: usize,
    pub max_body_size: usize,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            max_connections: 1024,
            read_timeout: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(5),
            max_header_size: 8192,
            max_body_size: 1_048_576,
        }
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn keep_alive_timeout(mut self, keep_alive_timeout: Duration) -> Self {
        self.keep_alive_timeout = keep_alive_timeout;
        self
    }

    pub fn max_header_size(mut self, max_header_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub(crate) fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            read_timeout: self.read_timeout,
            keep_alive_timeout: self.keep_alive_timeout,
            parser: ParserConfig { max_header_size: self.max_header_size, max_body_size: self.max_body_size },
        }
    }
}
