//! Save and restore established sessions.
//!
//! ```text
//! TSSC container payload (69 bytes):
//! [Session ID (4B)][Role (4B)][Master secret (32B)][Out seq (4B)][In seq (4B)]
//! [Replay highest (4B)][Replay bitmap (16B)][Replay primed (1B)]
//! ```
//!
//! All integers are big-endian. Message keys are not stored: they are
//! re-derived from the master secret on load, before the counters are
//! restored. The blob holds the master secret and must be protected like a
//! key.

use bytes::BufMut;
use tess_core::{Container, SESSION_STATE_TAG};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::callbacks::SessionCallbacks;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::key_schedule::{MasterSecret, Role, MASTER_SECRET_LEN};
use crate::seq_window::SequenceWindow;
use crate::session::Session;
use crate::transport::{TransportSnapshot, TransportState};

const STATE_PAYLOAD_LEN: usize = 4 + 4 + MASTER_SECRET_LEN + 4 + 4 + 4 + 16 + 1;

impl<C: SessionCallbacks> Session<C> {
    /// Size of a saved session blob.
    pub fn saved_len() -> usize {
        Container::encoded_len(STATE_PAYLOAD_LEN)
    }

    /// Serialize an established session.
    pub fn save(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(vec![0u8; Self::saved_len()]);
        self.save_into(&mut out)?;
        Ok(out)
    }

    /// Serialize into `out`, returning the bytes written.
    pub fn save_into(&self, out: &mut [u8]) -> Result<usize> {
        let transport = self.transport().ok_or(SessionError::KaNotFinished)?;

        let needed = Self::saved_len();
        if out.len() < needed {
            return Err(SessionError::BufferTooSmall { needed });
        }

        let payload = encode_snapshot(&transport.snapshot());
        let written = Container::encode_into(SESSION_STATE_TAG, &payload[..], out)
            .map_err(|e| SessionError::fail(format!("encoding session state: {}", e)))?;

        debug!("saved session {:08x}", transport.session_id());
        Ok(written)
    }

    /// Restore a session saved by [`Session::save`] with default config.
    pub fn load(blob: &[u8], callbacks: C) -> Result<Self> {
        Self::load_with_config(blob, callbacks, SessionConfig::default())
    }

    /// Restore a session. Callbacks and config are process-local and
    /// supplied fresh.
    ///
    /// The restored session has no peer identity: `get_remote_id` reports
    /// [`SessionError::KaNotFinished`].
    pub fn load_with_config(blob: &[u8], callbacks: C, config: SessionConfig) -> Result<Self> {
        let payload = Container::open(blob, SESSION_STATE_TAG).map_err(|e| {
            warn!("rejected saved session: {}", e);
            SessionError::corrupt(e)
        })?;
        let snapshot = decode_snapshot(payload)?;
        let transport = TransportState::restore(snapshot, config)?;

        debug!("loaded session {:08x}", transport.session_id());
        Ok(Session::restored(transport, callbacks, config))
    }
}

fn encode_snapshot(snapshot: &TransportSnapshot) -> Zeroizing<[u8; STATE_PAYLOAD_LEN]> {
    let mut payload = Zeroizing::new([0u8; STATE_PAYLOAD_LEN]);
    let mut buf = &mut payload[..];
    buf.put_u32(snapshot.session_id);
    buf.put_u32(snapshot.role.to_wire());
    buf.put_slice(snapshot.master.as_bytes());
    buf.put_u32(snapshot.out_seq);
    buf.put_u32(snapshot.in_seq);
    buf.put_u32(snapshot.window.highest());
    buf.put_u128(snapshot.window.bitmap());
    buf.put_u8(u8::from(snapshot.window.is_primed()));
    payload
}

fn decode_snapshot(payload: &[u8]) -> Result<TransportSnapshot> {
    if payload.len() != STATE_PAYLOAD_LEN {
        return Err(SessionError::DataCorrupt(format!(
            "session state is {} bytes, expected {}",
            payload.len(),
            STATE_PAYLOAD_LEN
        )));
    }

    let mut reader = Reader { data: payload };
    let session_id = reader.u32();
    let role = Role::from_wire(reader.u32())
        .ok_or_else(|| SessionError::DataCorrupt("unknown role".into()))?;

    let mut master = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    master.copy_from_slice(reader.take(MASTER_SECRET_LEN));
    let master = MasterSecret::from_bytes(*master);

    let out_seq = reader.u32();
    let in_seq = reader.u32();
    let highest = reader.u32();
    let mut bitmap = [0u8; 16];
    bitmap.copy_from_slice(reader.take(16));
    let primed = match reader.take(1)[0] {
        0 => false,
        1 => true,
        _ => return Err(SessionError::DataCorrupt("bad replay window flag".into())),
    };

    Ok(TransportSnapshot {
        session_id,
        role,
        master,
        out_seq,
        in_seq,
        window: SequenceWindow::from_parts(highest, u128::from_be_bytes(bitmap), primed),
    })
}

/// Cursor over a payload whose length was checked up front.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        head
    }

    fn u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4));
        u32::from_be_bytes(bytes)
    }
}
