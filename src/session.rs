//! Session registry (C3): per-rover liveness, sequence, and mission pointer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persistent per-rover record. Created on the first packet received from
/// an unknown `rover_id` and kept for process lifetime; `active` may toggle
/// but the record itself is never removed.
#[derive(Debug, Clone)]
pub struct RoverSession {
    pub rover_id: String,
    pub last_seq: u32,
    pub mission_id: Option<String>,
    pub task_type: Option<String>,
    pub battery: u8,
    pub progress: u8,
    pub last_activity: u64,
    pub last_ping_sent: u64,
    pub endpoint: SocketAddr,
    pub active: bool,
    pub awaiting_pong: bool,
    pub consecutive_missed_pongs: u8,
}

impl RoverSession {
    fn new(rover_id: String, endpoint: SocketAddr, now: u64) -> Self {
        Self {
            rover_id,
            last_seq: 0,
            mission_id: None,
            task_type: None,
            battery: 0,
            progress: 0,
            last_activity: now,
            last_ping_sent: 0,
            endpoint,
            active: true,
            awaiting_pong: false,
            consecutive_missed_pongs: 0,
        }
    }

    /// Admissibility rule for data-carrying packets (§4.2): strictly greater
    /// than the last accepted sequence.
    pub fn is_admissible(&self, seq: u32) -> bool {
        seq > self.last_seq
    }

    /// Any inbound packet from the rover counts as activity (§4.5): it
    /// clears the heartbeat's missed-pong count and refreshes the endpoint
    /// in case the rover's source address changed.
    pub fn record_activity(&mut self, endpoint: SocketAddr, now: u64) {
        self.endpoint = endpoint;
        self.last_activity = now;
        self.awaiting_pong = false;
        self.consecutive_missed_pongs = 0;
    }
}

/// Returns the current wall-clock time as Unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The RoverSession table, capped at `max_rovers` (C3). Lookup,
/// insert-or-update and liveness mutation are the only operations; callers
/// own serializing access (see [`crate::registry::Registry`]).
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, RoverSession>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.capacity
    }

    pub fn get(&self, rover_id: &str) -> Option<&RoverSession> {
        self.sessions.get(rover_id)
    }

    pub fn get_mut(&mut self, rover_id: &str) -> Option<&mut RoverSession> {
        self.sessions.get_mut(rover_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoverSession> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoverSession> {
        self.sessions.values_mut()
    }

    /// Looks up an existing session, or creates one if the table has room.
    /// Returns `None` if the rover is unknown and the table is full (§7:
    /// session table full -> reject new rover, drop packet).
    pub fn get_or_create(
        &mut self,
        rover_id: &str,
        endpoint: SocketAddr,
        now: u64,
    ) -> Option<&mut RoverSession> {
        if !self.sessions.contains_key(rover_id) {
            if self.is_full() {
                return None;
            }
            self.sessions.insert(
                rover_id.to_string(),
                RoverSession::new(rover_id.to_string(), endpoint, now),
            );
        }
        self.sessions.get_mut(rover_id)
    }
}
