//! Database connectivity probe.
//!
//! Dials the database directly. The `database` circuit breaker is reported
//! by the circuit-breaker probe, never consulted or fed from here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{BoxError, HealthProbe, ProbeError, ProbeReport};
use crate::health::types::HealthStatus;

/// Minimal connectivity check against a datastore.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn ping(&self) -> Result<(), BoxError>;
}

/// Connectivity check that opens (and immediately drops) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    pub async fn connect(&self) -> std::io::Result<()> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {} timed out", self.address),
            )),
        }
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn ping(&self) -> Result<(), BoxError> {
        self.connect().await.map_err(Into::into)
    }
}

pub struct DatabaseProbe {
    connectivity: Arc<dyn Connectivity>,
}

impl DatabaseProbe {
    pub fn new(connectivity: Arc<dyn Connectivity>) -> Self {
        Self { connectivity }
    }
}

#[async_trait]
impl HealthProbe for DatabaseProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        self.connectivity.ping().await?;
        Ok(ProbeReport::new(HealthStatus::Healthy))
    }
}
