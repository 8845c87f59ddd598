//! Single-peer TCP record source

use super::SourceError;
use super::framing::RecordDecoder;
use crate::sample::{Sample, SessionClock};
use crate::state::SessionState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// Listens on a port, accepts exactly one connection, and decodes its
/// byte stream into records
///
/// Records are stamped with the session clock when they are extracted from
/// the buffer, not when the peer produced them. Under backpressure (a pause,
/// or a slow consumer) the reported times therefore drift later than the
/// true capture times.
pub struct SocketSource {
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    local_addr: Option<SocketAddr>,
    decoder: RecordDecoder,
    chunk: Vec<u8>,
    state: Arc<SessionState>,
    clock: SessionClock,
    finished: bool,
}

impl SocketSource {
    pub async fn bind(
        addr: SocketAddr,
        bin_count: usize,
        read_chunk_bytes: usize,
        state: Arc<SessionState>,
        clock: SessionClock,
    ) -> Result<Self, SourceError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| SourceError::Bind { addr, source })?;
        let local_addr = listener.local_addr().ok();
        log::info!(
            "Waiting for TCP connection on {}",
            local_addr.unwrap_or(addr)
        );

        Ok(Self {
            listener: Some(listener),
            stream: None,
            local_addr,
            decoder: RecordDecoder::new(bin_count),
            chunk: vec![0u8; read_chunk_bytes.max(1)],
            state,
            clock,
            finished: false,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Drop the listener and connection
    pub fn close(&mut self) {
        if self.listener.take().is_some() {
            log::debug!("Closed listener");
        }
        if self.stream.take().is_some() {
            log::debug!("Closed connection");
        }
        self.finished = true;
    }

    /// Accept the single peer; `false` if the session stopped first
    async fn accept(&mut self) -> Result<bool, SourceError> {
        let Some(listener) = self.listener.as_ref() else {
            return Ok(false);
        };
        let state = Arc::clone(&self.state);

        let accepted = tokio::select! {
            _ = state.wait_stopped() => None,
            result = listener.accept() => Some(result),
        };

        match accepted {
            None => Ok(false),
            Some(Ok((stream, peer))) => {
                log::info!("Connected to {}", peer);
                // Exactly one connection per session
                self.listener = None;
                self.stream = Some(stream);
                Ok(true)
            }
            Some(Err(e)) => {
                self.close();
                Err(SourceError::Accept(e))
            }
        }
    }

    /// Next decoded record
    ///
    /// Returns `Ok(None)` on orderly close or stop, `Err` on a failed accept
    /// or read. Either way the socket is released and later calls return
    /// `Ok(None)`.
    pub async fn produce(&mut self) -> Result<Option<Sample>, SourceError> {
        let state = Arc::clone(&self.state);
        loop {
            // No reads while paused: the kernel buffers fill and the peer blocks
            if !state.wait_until_running().await {
                return Ok(None);
            }

            if let Some(values) = self.decoder.next_record() {
                return Ok(Some(Sample::new(self.clock.now(), values)));
            }

            if self.finished {
                return Ok(None);
            }

            if self.stream.is_none() {
                if !self.accept().await? {
                    return Ok(None);
                }
                continue;
            }
            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            let read = tokio::select! {
                _ = state.wait_stopped() => None,
                result = stream.read(&mut self.chunk) => Some(result),
            };

            match read {
                None => return Ok(None),
                Some(Ok(0)) => {
                    if self.decoder.buffered() > 0 {
                        log::warn!(
                            "Peer closed with {} bytes of an incomplete record buffered",
                            self.decoder.buffered()
                        );
                    }
                    log::info!("Peer closed the connection");
                    self.close();
                    return Ok(None);
                }
                Some(Ok(n)) => self.decoder.extend(&self.chunk[..n]),
                Some(Err(e)) => {
                    self.close();
                    return Err(SourceError::Io(e));
                }
            }
        }
    }
}
