//! Request/reply transports.
//!
//! The server talks to an [`Endpoint`]: wait a bounded time for one request,
//! answer it with one two-part reply. [`PairEndpoint`] is the ZeroMQ `PAIR`
//! socket used on the robot; [`memory_pair`] gives an in-process endpoint and
//! its peer.

use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::Duration,
};

use crate::error::{Error, Result};

/// Reply send timeout. A peer that vanished must not wedge the server.
const SEND_TIMEOUT_MS: i32 = 1000;

/// One side of a strict request/reply conversation.
pub trait Endpoint {
    /// Wait up to `timeout` for a request. `Ok(None)` means nothing arrived.
    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>>;

    /// Send a two-part reply.
    fn send_reply(
        &mut self,
        header: &[u8],
        payload: &[u8],
    ) -> Result<()>;
}

/// ZeroMQ `PAIR` socket bound to a local address.
pub struct PairEndpoint {
    // Declared before the context so the socket closes first.
    socket: zmq::Socket,
    _context: zmq::Context,
}

impl PairEndpoint {
    /// Bind a new socket in its own context, e.g. `tcp://*:7777`.
    pub fn bind(address: &str) -> Result<Self> {
        Self::bind_with_context(&zmq::Context::new(), address)
    }

    /// Bind a new socket in `context`; needed for `inproc://` addresses.
    pub fn bind_with_context(
        context: &zmq::Context,
        address: &str,
    ) -> Result<Self> {
        let socket = context.socket(zmq::PAIR)?;
        socket.set_linger(0)?;
        socket.set_sndtimeo(SEND_TIMEOUT_MS)?;
        socket
            .bind(address)
            .map_err(|e| Error::FatalInit(format!("failed to bind {address}: {e}")))?;
        tracing::info!("Starting server at {}", address);

        Ok(PairEndpoint {
            socket,
            _context: context.clone(),
        })
    }
}

impl Endpoint for PairEndpoint {
    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>> {
        match self.socket.poll(zmq::POLLIN, timeout.as_millis() as i64) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            // Ctrl-C lands here first; the caller re-checks its running flag.
            Err(zmq::Error::EINTR) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let request = self.socket.recv_bytes(0)?;
        let mut extra = 0;
        while self.socket.get_rcvmore()? {
            self.socket.recv_bytes(0)?;
            extra += 1;
        }
        if extra > 0 {
            tracing::warn!(extra, "ignoring extra request parts");
        }
        Ok(Some(request))
    }

    fn send_reply(
        &mut self,
        header: &[u8],
        payload: &[u8],
    ) -> Result<()> {
        let sent = self
            .socket
            .send(header, zmq::SNDMORE)
            .and_then(|()| self.socket.send(payload, 0));
        match sent {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => {
                tracing::warn!("peer not reading, reply dropped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process endpoint backed by channels.
pub struct MemoryEndpoint {
    requests: Receiver<Vec<u8>>,
    replies: Sender<(Vec<u8>, Vec<u8>)>,
}

/// The client side of a [`MemoryEndpoint`].
pub struct MemoryPeer {
    requests: Sender<Vec<u8>>,
    replies: Receiver<(Vec<u8>, Vec<u8>)>,
}

/// Create a connected endpoint and peer.
pub fn memory_pair() -> (MemoryEndpoint, MemoryPeer) {
    let (request_tx, request_rx) = mpsc::channel();
    let (reply_tx, reply_rx) = mpsc::channel();
    (
        MemoryEndpoint {
            requests: request_rx,
            replies: reply_tx,
        },
        MemoryPeer {
            requests: request_tx,
            replies: reply_rx,
        },
    )
}

impl Endpoint for MemoryEndpoint {
    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>> {
        match self.requests.recv_timeout(timeout) {
            Ok(request) => Ok(Some(request)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
        }
    }

    fn send_reply(
        &mut self,
        header: &[u8],
        payload: &[u8],
    ) -> Result<()> {
        self.replies
            .send((header.to_vec(), payload.to_vec()))
            .map_err(|_| Error::Disconnected)
    }
}

impl MemoryPeer {
    /// Send one raw request frame.
    pub fn send(
        &self,
        request: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.requests
            .send(request.into())
            .map_err(|_| Error::Disconnected)
    }

    /// Wait up to `timeout` for a `(header, payload)` reply.
    pub fn recv(
        &self,
        timeout: Duration,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        self.replies.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pair_round_trip() {
        let (mut endpoint, peer) = memory_pair();
        assert_eq!(endpoint.poll_request(Duration::from_millis(1)).unwrap(), None);

        peer.send(r#"{"command":"reset"}"#).unwrap();
        let request = endpoint
            .poll_request(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert_eq!(request, br#"{"command":"reset"}"#);

        endpoint.send_reply(b"{}", &[1, 2, 3]).unwrap();
        let (header, payload) = peer.recv(Duration::from_millis(100)).unwrap();
        assert_eq!(header, b"{}");
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_memory_endpoint_reports_disconnect() {
        let (mut endpoint, peer) = memory_pair();
        drop(peer);
        assert!(matches!(
            endpoint.poll_request(Duration::from_millis(1)),
            Err(Error::Disconnected)
        ));
    }
}
