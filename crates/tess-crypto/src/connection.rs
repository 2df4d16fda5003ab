//! Socket-style helpers that drive a session through its transport callbacks.
//!
//! These sit on top of [`Session::unwrap`] and [`Session::wrap`] for hosts
//! whose [`SessionCallbacks`] implement `send_data` and `receive_data`:
//!
//! ```text
//! client.connect()             -> send_data(request)
//! server.negotiate_transport() -> receive_data(request), send_data(reply)
//! client.negotiate_transport() -> receive_data(reply)
//! client.send(msg)             -> send_data(frame)
//! server.receive(max)          -> receive_data(frame), returns msg
//! ```

use tess_core::frame::FRAME_OVERHEAD;
use tess_core::{Container, EPHEMERAL_KEY_LEN, MAX_ID_LEN, SIGNATURE_LEN};
use tracing::debug;

use crate::callbacks::SessionCallbacks;
use crate::error::{Result, SessionError, TransportError};
use crate::session::{Session, Unwrapped};

/// Largest handshake message a peer can send.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize =
    Container::encoded_len(2 + MAX_ID_LEN + EPHEMERAL_KEY_LEN + SIGNATURE_LEN);

impl<C: SessionCallbacks> Session<C> {
    /// Start the handshake and push the connect request to the peer.
    ///
    /// A transport failure leaves the session negotiating; discard it.
    pub fn connect(&mut self) -> Result<()> {
        let request = self.generate_connect_request()?;
        self.send_raw(&request)
    }

    /// Encrypt `message` and push the frame to the peer.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        let frame = self.wrap(message)?;
        self.send_raw(&frame)
    }

    /// Pull one buffer from the transport and process it.
    ///
    /// Returns the plaintext of a transport frame of at most `max_len` bytes.
    /// While negotiating, handshake replies are sent back automatically and
    /// an empty vector is returned.
    pub fn receive(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let capacity = if self.is_established() {
            max_len.checked_add(FRAME_OVERHEAD).ok_or_else(|| {
                SessionError::invalid(format!("receive length {} too large", max_len))
            })?
        } else {
            MAX_HANDSHAKE_MESSAGE_LEN
        };

        let mut buf = vec![0u8; capacity];
        let received = self.callbacks_mut().receive_data(&mut buf)?;
        if received == 0 {
            return Err(TransportError::Closed.into());
        }
        if received > capacity {
            return Err(TransportError::new(format!(
                "transport reported {} bytes for a {} byte buffer",
                received, capacity
            ))
            .into());
        }

        match self.unwrap(&buf[..received])? {
            Unwrapped::Message(message) => Ok(message),
            Unwrapped::SendToPeer(reply) => {
                self.send_raw(&reply)?;
                Ok(Vec::new())
            }
            Unwrapped::HandshakeComplete => Ok(Vec::new()),
        }
    }

    /// Keep receiving until the handshake completes.
    ///
    /// Blocks as long as `receive_data` does. Frames cannot arrive before the
    /// handshake is done, so nothing is lost.
    pub fn negotiate_transport(&mut self) -> Result<()> {
        while !self.is_established() {
            self.receive(0)?;
        }
        debug!("transport negotiated");
        Ok(())
    }

    fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let sent = self.callbacks_mut().send_data(data)?;
        if sent != data.len() {
            return Err(SessionError::Transport(TransportError::ShortWrite {
                sent,
                expected: data.len(),
            }));
        }
        Ok(())
    }
}
