//! Heartbeat scheduler (C5): periodic ping dispatch and timeout-driven
//! inactive-rover detection (§4.5).
//!
//! [`tick`] is the pure decision function — given the session table and the
//! current time, which sessions need a PING and which just timed out — kept
//! separate from the socket I/O so the state machine is testable without a
//! network. [`run`] drives it on a ~1s wall-clock timer, matching the
//! teacher's 1Hz `tokio::time::interval` update loop in `simulator.rs`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::codec::{Packet, PacketType};
use crate::config::Config;
use crate::registry::Registry;
use crate::session::{now_unix, SessionRegistry};

/// One sweep of the session table. Sends a PING to any `HEALTHY` session
/// whose last activity is stale, and resolves any `WAITING_PONG` session
/// whose ping has timed out — incrementing its missed count and, past
/// `heartbeat_max_retries`, marking it inactive.
///
/// Returns the `(endpoint, packet)` pairs that need to go out; callers send
/// them after releasing the table lock.
pub fn tick(sessions: &mut SessionRegistry, now: u64, cfg: &Config) -> Vec<(SocketAddr, Packet)> {
    let mut pings = Vec::new();

    for session in sessions.iter_mut() {
        if !session.active {
            continue;
        }

        if session.awaiting_pong {
            let elapsed = now.saturating_sub(session.last_ping_sent);
            if elapsed > cfg.heartbeat_timeout.as_secs() {
                session.awaiting_pong = false;
                session.consecutive_missed_pongs = session.consecutive_missed_pongs.saturating_add(1);
                if session.consecutive_missed_pongs > cfg.heartbeat_max_retries {
                    session.active = false;
                }
            }
            continue;
        }

        let idle = now.saturating_sub(session.last_activity);
        if idle >= cfg.heartbeat_interval.as_secs() {
            let ping_seq = session.last_seq + 1;
            session.awaiting_pong = true;
            session.last_ping_sent = now;
            pings.push((session.endpoint, Packet::bare(PacketType::Ping, ping_seq)));
        }
    }

    pings
}

/// Runs the heartbeat scheduler until the process stops. Wakes roughly
/// once a second (§4.5: "wall-clock tick of at most 1 second").
pub async fn run(registry: Arc<Registry>, socket: Arc<UdpSocket>, config: Config) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let now = now_unix();

        let pings = {
            let mut tables = registry.lock();
            tick(&mut tables.sessions, now, &config)
        };

        for (endpoint, packet) in pings {
            debug!(%endpoint, seq = packet.seq, "sending heartbeat ping");
            if let Err(e) = socket.send_to(&packet.encode(), endpoint).await {
                warn!(%endpoint, error = %e, "failed to send heartbeat ping");
            }
        }
    }
}
