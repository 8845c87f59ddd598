//! Sample sources
//!
//! Every source offers the same capability: `produce()` awaits the next
//! timestamped sample vector, or resolves to `None` once the stream has
//! ended or the session has stopped. The concrete source is chosen from the
//! session configuration:
//! - `synthetic`: uniform random magnitudes at a fixed cadence
//! - `socket`: back-to-back float32 records from a single TCP peer
//!
//! Sources honour the shared `SessionState`: while paused they produce
//! nothing (the socket source stops reading so the sender sees
//! backpressure), and a stop unblocks any pending wait.

mod framing;
mod socket;
mod synthetic;

pub use framing::{RecordDecoder, encode_record};
pub use socket::SocketSource;
pub use synthetic::SyntheticSource;

use crate::config::{SessionConfig, SourceConfig};
use crate::sample::{Sample, SessionClock};
use crate::state::SessionState;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
    #[error("socket read error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum SampleSource {
    Synthetic(SyntheticSource),
    Socket(SocketSource),
}

impl SampleSource {
    /// Build the source selected by `config`
    ///
    /// The socket variant binds its listener here so a busy port is reported
    /// before any task is spawned.
    pub async fn from_config(
        config: &SessionConfig,
        state: Arc<SessionState>,
        clock: SessionClock,
    ) -> Result<Self, SourceError> {
        match &config.source {
            SourceConfig::Synthetic => Ok(SampleSource::Synthetic(SyntheticSource::new(
                config.bin_count,
                config.sample_period,
                state,
                clock,
            ))),
            SourceConfig::Socket {
                bind,
                read_chunk_bytes,
            } => {
                let source =
                    SocketSource::bind(*bind, config.bin_count, *read_chunk_bytes, state, clock)
                        .await?;
                Ok(SampleSource::Socket(source))
            }
        }
    }

    /// Next sample, or `None` at end of stream
    pub async fn produce(&mut self) -> Result<Option<Sample>, SourceError> {
        match self {
            SampleSource::Synthetic(source) => Ok(source.produce().await),
            SampleSource::Socket(source) => source.produce().await,
        }
    }

    /// Release any held sockets; safe to call more than once
    pub fn close(&mut self) {
        if let SampleSource::Socket(source) = self {
            source.close();
        }
    }

    /// Listening address of a socket source
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            SampleSource::Synthetic(_) => None,
            SampleSource::Socket(source) => source.local_addr(),
        }
    }
}
