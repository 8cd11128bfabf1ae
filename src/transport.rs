//! Reliable datagram layer (C2): handshake, send-with-ack bookkeeping, and
//! the duplicate-suppression rule shared by the station and the rover
//! client.
//!
//! The accept/dispatch loop itself (reading the socket concurrently with
//! retry timers and unsolicited PINGs) lives in the binaries that own a
//! socket — this module holds the parts of C2 that are pure state and are
//! worth testing without one: the handshake exchange, and the bounded-retry
//! bookkeeping a `send_with_ack` caller drives (grounded in the teacher's
//! `CommandTracker`/`is_expired` pattern in `protocol.rs`, generalized from
//! tracking in-flight commands to tracking one in-flight ACK wait).

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::codec::{Packet, PacketType};
use crate::error::TransportError;

pub const HANDSHAKE_REQUEST_BYTE: u8 = 0xFF;
pub const HANDSHAKE_REPLY_BYTE: u8 = b'1';

/// Client-side handshake (§4.2): send a single `0xFF` byte, wait for a
/// single `'1'` byte reply, retrying up to `retries` times at `timeout`
/// each. Handshake is advisory and creates no session.
pub async fn perform_handshake(
    socket: &UdpSocket,
    server: SocketAddr,
    retries: u8,
    timeout: Duration,
) -> Result<(), TransportError> {
    let mut buf = [0u8; 1];
    for attempt in 0..retries {
        socket.send_to(&[HANDSHAKE_REQUEST_BYTE], server).await?;
        debug!(attempt, "handshake sent");
        match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) if n == 1 && from == server && buf[0] == HANDSHAKE_REPLY_BYTE => {
                return Ok(());
            }
            _ => continue,
        }
    }
    Err(TransportError::HandshakeFailed { retries })
}

/// Server-side handshake responder: reply with a single `'1'` byte to
/// anyone sending the single-byte `0xFF` frame. Stateless — never touches
/// the session registry (§9's Open Question resolution: handshake does not
/// identify the rover).
pub async fn respond_to_handshake(socket: &UdpSocket, peer: SocketAddr) -> Result<(), TransportError> {
    socket.send_to(&[HANDSHAKE_REPLY_BYTE], peer).await?;
    Ok(())
}

/// Returns `true` if `datagram` is a bare handshake frame (a single
/// `0xFF` byte) rather than a full [`Packet`].
pub fn is_handshake_frame(datagram: &[u8]) -> bool {
    datagram.len() == 1 && datagram[0] == HANDSHAKE_REQUEST_BYTE
}

/// A bare, fire-and-forget ACK echoing `seq` and `nonce` back to the
/// sender. The `nonce` is preserved byte-exact but otherwise meaningless
/// (§9).
pub fn build_ack(seq: u32, nonce: u32) -> Packet {
    let mut ack = Packet::bare(PacketType::Ack, seq);
    ack.nonce = nonce;
    ack
}

/// Tracks one in-flight `send_with_ack` call's bounded retry budget
/// (§4.2: `ACK_RETRIES` attempts, each waiting up to `ACK_TIMEOUT`).
/// Pure bookkeeping — the caller owns the socket and the actual
/// send/receive; this only decides when to retry and when to give up.
#[derive(Debug)]
pub struct AckWaiter {
    seq: u32,
    attempts_remaining: u8,
    timeout: Duration,
    deadline: Instant,
}

impl AckWaiter {
    /// Starts a new wait window; the first send has already gone out.
    pub fn start(seq: u32, retries: u8, timeout: Duration, now: Instant) -> Self {
        Self {
            seq,
            // One attempt has already been consumed by the initial send.
            attempts_remaining: retries.saturating_sub(1),
            timeout,
            deadline: now + timeout,
        }
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether an incoming ACK's `seq` satisfies this wait.
    pub fn matches(&self, ack_seq: u32) -> bool {
        ack_seq == self.seq
    }

    /// The deadline has passed with no matching ACK: either arm another
    /// retry (returns `true`, caller resends and keeps waiting) or report
    /// exhaustion (returns `false`).
    pub fn retry(&mut self, now: Instant) -> bool {
        if self.attempts_remaining == 0 {
            return false;
        }
        self.attempts_remaining -= 1;
        self.deadline = now + self.timeout;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_frame_is_recognized_by_length_and_byte() {
        assert!(is_handshake_frame(&[0xFF]));
        assert!(!is_handshake_frame(&[0xFF, 0x00]));
        assert!(!is_handshake_frame(&[0x01]));
    }

    #[test]
    fn ack_waiter_exhausts_after_configured_retries() {
        let start = Instant::now();
        let mut waiter = AckWaiter::start(7, 3, Duration::from_millis(1), start);
        assert!(waiter.matches(7));
        assert!(!waiter.matches(8));

        // retries=3: one attempt already spent on the initial send, so two
        // more retries are available before giving up.
        assert!(waiter.retry(start));
        assert!(waiter.retry(start));
        assert!(!waiter.retry(start));
    }

    #[test]
    fn ack_waiter_extends_deadline_on_each_retry() {
        let start = Instant::now();
        let timeout = Duration::from_secs(1);
        let mut waiter = AckWaiter::start(1, 5, timeout, start);
        let first_deadline = waiter.deadline();
        let later = start + Duration::from_millis(1100);
        assert!(waiter.retry(later));
        assert_eq!(waiter.deadline(), later + timeout);
        assert!(waiter.deadline() > first_deadline);
    }

    #[test]
    fn build_ack_preserves_nonce_byte_exact() {
        let ack = build_ack(42, 0xCAFEBABE);
        assert_eq!(ack.packet_type, PacketType::Ack);
        assert_eq!(ack.seq, 42);
        assert_eq!(ack.nonce, 0xCAFEBABE);
    }
}
