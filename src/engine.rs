//! Mission protocol engine (C6): the per-rover REQUEST/PROGRESS/COMPLETE/PONG
//! state machine.
//!
//! [`handle_packet`] is a pure function over the locked tables — it takes
//! one incoming packet and returns what to send back, leaving the actual
//! socket writes to the caller (which must have released the table lock
//! first; see [`crate::registry::Registry`]). This mirrors the shape of the
//! teacher's `execute_command` dispatch in `agent.rs` (one big match over
//! the inbound variant, mutating shared state and producing a response),
//! generalized from a single JSON command/response pair to a datagram that
//! may produce zero, one, or two outgoing packets.

use std::net::SocketAddr;

use tracing::warn;

use crate::codec::{Packet, PacketType};
use crate::registry::Tables;
use crate::transport::build_ack;

/// What a handled packet produced. Both fields are sent unreliably by the
/// caller — the ACK is fire-and-forget (C2), and ASSIGN is "a single
/// datagram... the rover drives retries via its own request timeout" (§4.6).
#[derive(Debug, Default)]
pub struct Dispatch {
    pub ack: Option<Packet>,
    pub assign: Option<Packet>,
}

impl Dispatch {
    fn none() -> Self {
        Self::default()
    }
}

/// Dispatches one inbound packet against the shared tables. `max_rovers`
/// gates session creation (§7: "Session table full -> reject new rover,
/// drop packet" — no ACK is sent in that case, since no session exists to
/// admit the packet into).
pub fn handle_packet(tables: &mut Tables, peer: SocketAddr, incoming: &Packet, now: u64) -> Dispatch {
    match incoming.packet_type {
        PacketType::Request => handle_request(tables, peer, incoming, now),
        PacketType::Progress => handle_progress(tables, peer, incoming, now),
        PacketType::Complete => handle_complete(tables, peer, incoming, now),
        PacketType::Pong => {
            handle_pong(tables, peer, incoming, now);
            Dispatch::none()
        }
        // ACK/PING/HANDSHAKE never reach this dispatcher (the station never
        // acts on an ACK, PING is scheduler-originated, and HANDSHAKE is
        // answered before a `Packet` is even decoded — see `station.rs`).
        PacketType::Ack | PacketType::Ping | PacketType::Handshake => Dispatch::none(),
    }
}

fn handle_request(tables: &mut Tables, peer: SocketAddr, incoming: &Packet, now: u64) -> Dispatch {
    let rover_id = incoming.rover_id.as_str().to_string();
    let Some(session) = tables.sessions.get_or_create(&rover_id, peer, now) else {
        warn!(rover_id, "session table full, dropping REQUEST");
        return Dispatch::none();
    };

    let ack = build_ack(incoming.seq, incoming.nonce);
    if !session.is_admissible(incoming.seq) {
        return Dispatch { ack: Some(ack), assign: None };
    }
    session.record_activity(peer, now);

    let Some(mission) = tables.missions.create(&rover_id, now) else {
        warn!(rover_id, "mission table full, skipping assignment");
        return Dispatch { ack: Some(ack), assign: None };
    };

    let mut assign = Packet::bare(PacketType::Assign, incoming.seq + 1);
    assign.rover_id = incoming.rover_id;
    assign.mission_id = crate::codec::FixedStr::new(&mission.id).unwrap_or_default();
    assign.task_type = crate::codec::FixedStr::new(&mission.task_type).unwrap_or_default();
    assign.x1 = mission.area.x1;
    assign.y1 = mission.area.y1;
    assign.x2 = mission.area.x2;
    assign.y2 = mission.area.y2;
    assign.duration = mission.duration;
    assign.update_interval = mission.update_interval;

    let mission_id = mission.id.clone();
    let task_type = mission.task_type.clone();

    // Re-borrow: `tables.missions.create` above released its borrow of
    // `session` by the time we get here (NLL), but `session` itself came
    // from `tables.sessions`, which we need mutably again.
    let session = tables.sessions.get_mut(&rover_id).expect("just created above");
    session.last_seq = assign.seq;
    session.mission_id = Some(mission_id);
    session.task_type = Some(task_type);

    Dispatch { ack: Some(ack), assign: Some(assign) }
}

fn handle_progress(tables: &mut Tables, peer: SocketAddr, incoming: &Packet, now: u64) -> Dispatch {
    let rover_id = incoming.rover_id.as_str().to_string();
    let Some(session) = tables.sessions.get_or_create(&rover_id, peer, now) else {
        warn!(rover_id, "session table full, dropping PROGRESS");
        return Dispatch::none();
    };

    let ack = build_ack(incoming.seq, incoming.nonce);
    if !session.is_admissible(incoming.seq) {
        return Dispatch { ack: Some(ack), assign: None };
    }

    session.record_activity(peer, now);
    session.last_seq = incoming.seq;
    session.battery = incoming.battery;
    session.progress = incoming.progress;

    if let Some(mission_id) = session.mission_id.clone() {
        tables.missions.update_mission(&mission_id, incoming.progress, incoming.battery, now);
    }

    Dispatch { ack: Some(ack), assign: None }
}

fn handle_complete(tables: &mut Tables, peer: SocketAddr, incoming: &Packet, now: u64) -> Dispatch {
    let rover_id = incoming.rover_id.as_str().to_string();
    let Some(session) = tables.sessions.get_or_create(&rover_id, peer, now) else {
        warn!(rover_id, "session table full, dropping COMPLETE");
        return Dispatch::none();
    };

    let ack = build_ack(incoming.seq, incoming.nonce);
    if !session.is_admissible(incoming.seq) {
        return Dispatch { ack: Some(ack), assign: None };
    }

    session.record_activity(peer, now);
    session.last_seq = incoming.seq;
    session.battery = incoming.battery;
    session.progress = 100;

    // IDLE transition (§4.6): once a mission is complete, the session no
    // longer points at it — `mission_id`/`task_type` only ever identify an
    // in-progress mission (§3, §8 property 5).
    if let Some(mission_id) = session.mission_id.take() {
        tables.missions.mark_complete(&mission_id, incoming.battery, now);
    }
    session.task_type = None;

    Dispatch { ack: Some(ack), assign: None }
}

/// PONG credits liveness only; it never advances `last_seq` or mission
/// state (§4.6). A PONG implies a PING was sent, which only happens for a
/// session that already exists, so this looks up rather than creates.
fn handle_pong(tables: &mut Tables, peer: SocketAddr, incoming: &Packet, now: u64) {
    let rover_id = incoming.rover_id.as_str();
    if let Some(session) = tables.sessions.get_mut(rover_id) {
        session.record_activity(peer, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FixedStr;
    use crate::config::Config;

    fn addr() -> SocketAddr {
        "127.0.0.1:9100".parse().unwrap()
    }

    fn tables(cfg: &Config) -> Tables {
        Tables {
            sessions: crate::session::SessionRegistry::new(cfg.max_rovers),
            missions: crate::mission::MissionRegistry::new(cfg.max_missions),
            telemetry: crate::telemetry::TelemetryRegistry::new(),
        }
    }

    fn request(rover_id: &str, seq: u32) -> Packet {
        let mut p = Packet::bare(PacketType::Request, seq);
        p.rover_id = FixedStr::new(rover_id).unwrap();
        p
    }

    fn progress(rover_id: &str, seq: u32, progress: u8, battery: u8) -> Packet {
        let mut p = Packet::bare(PacketType::Progress, seq);
        p.rover_id = FixedStr::new(rover_id).unwrap();
        p.progress = progress;
        p.battery = battery;
        p
    }

    fn complete(rover_id: &str, seq: u32, battery: u8) -> Packet {
        let mut p = Packet::bare(PacketType::Complete, seq);
        p.rover_id = FixedStr::new(rover_id).unwrap();
        p.battery = battery;
        p
    }

    #[test]
    fn request_yields_ack_and_assign_and_creates_mission() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        let d = handle_packet(&mut t, addr(), &request("R-001", 1), 0);

        assert!(d.ack.is_some());
        let assign = d.assign.expect("mission table has room");
        assert_eq!(assign.packet_type, PacketType::Assign);
        assert_eq!(assign.seq, 2);
        assert_eq!(assign.mission_id.as_str(), "M-001");

        let session = t.sessions.get("R-001").unwrap();
        assert_eq!(session.last_seq, 2);
        assert_eq!(session.mission_id.as_deref(), Some("M-001"));
        assert_eq!(t.missions.len(), 1);
    }

    #[test]
    fn duplicate_request_is_reacked_without_creating_a_second_mission() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        let d = handle_packet(&mut t, addr(), &request("R-001", 1), 1);

        assert!(d.ack.is_some());
        assert!(d.assign.is_none());
        assert_eq!(t.missions.len(), 1);
    }

    #[test]
    fn progress_updates_session_and_mission_when_admissible() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        let d = handle_packet(&mut t, addr(), &progress("R-001", 3, 40, 85), 5);

        assert!(d.ack.is_some());
        let session = t.sessions.get("R-001").unwrap();
        assert_eq!(session.last_seq, 3);
        assert_eq!(session.progress, 40);
        assert_eq!(session.battery, 85);

        let mission_id = session.mission_id.clone().unwrap();
        let mission = t.missions.get(&mission_id).unwrap();
        assert_eq!(mission.progress, 40);
        assert_eq!(mission.updates_count, 1);
    }

    #[test]
    fn duplicate_progress_is_reacked_without_advancing_state() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        handle_packet(&mut t, addr(), &progress("R-001", 3, 40, 85), 5);
        let d = handle_packet(&mut t, addr(), &progress("R-001", 3, 99, 1), 6);

        assert!(d.ack.is_some());
        let session = t.sessions.get("R-001").unwrap();
        assert_eq!(session.progress, 40, "duplicate must not overwrite state");
        let mission_id = session.mission_id.clone().unwrap();
        assert_eq!(t.missions.get(&mission_id).unwrap().updates_count, 1);
    }

    #[test]
    fn complete_sets_progress_100_and_marks_mission_complete() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        handle_packet(&mut t, addr(), &progress("R-001", 3, 40, 85), 5);
        let mission_id = t.sessions.get("R-001").unwrap().mission_id.clone().unwrap();
        let d = handle_packet(&mut t, addr(), &complete("R-001", 4, 70), 10);

        assert!(d.ack.is_some());
        let session = t.sessions.get("R-001").unwrap();
        assert_eq!(session.progress, 100);

        let mission = t.missions.get(&mission_id).unwrap();
        assert!(mission.completed);
        assert_eq!(mission.progress, 100);
        assert_eq!(mission.battery, 70);
    }

    #[test]
    fn complete_clears_the_session_mission_pointer() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        handle_packet(&mut t, addr(), &complete("R-001", 2, 70), 10);

        let session = t.sessions.get("R-001").unwrap();
        assert!(session.mission_id.is_none());
        assert!(session.task_type.is_none());
    }

    #[test]
    fn pong_credits_liveness_without_touching_sequence_or_mission_state() {
        let cfg = Config::default();
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        let last_seq_before = t.sessions.get("R-001").unwrap().last_seq;

        t.sessions.get_mut("R-001").unwrap().awaiting_pong = true;
        let mut pong = Packet::bare(PacketType::Pong, 99);
        pong.rover_id = FixedStr::new("R-001").unwrap();
        let d = handle_packet(&mut t, addr(), &pong, 20);

        assert!(d.ack.is_none());
        let session = t.sessions.get("R-001").unwrap();
        assert_eq!(session.last_seq, last_seq_before);
        assert!(!session.awaiting_pong);
    }

    #[test]
    fn mission_table_full_skips_assignment_but_still_acks() {
        let mut cfg = Config::default();
        cfg.max_missions = 0;
        let mut t = tables(&cfg);
        let d = handle_packet(&mut t, addr(), &request("R-001", 1), 0);

        assert!(d.ack.is_some());
        assert!(d.assign.is_none());
        assert!(t.sessions.get("R-001").unwrap().mission_id.is_none());
    }

    #[test]
    fn session_table_full_drops_unknown_rover_silently() {
        let mut cfg = Config::default();
        cfg.max_rovers = 1;
        let mut t = tables(&cfg);
        handle_packet(&mut t, addr(), &request("R-001", 1), 0);
        let d = handle_packet(&mut t, addr(), &request("R-002", 1), 0);

        assert!(d.ack.is_none());
        assert!(d.assign.is_none());
        assert_eq!(t.sessions.len(), 1);
    }
}
