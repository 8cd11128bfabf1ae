//! The single shared-table value (§9's design note: "a single Registry
//! value owned by the event loop, passed by reference into the protocol
//! engine and the API. No hidden singletons").
//!
//! All three in-memory tables live behind one `std::sync::Mutex` so that
//! mutation from the protocol engine, the heartbeat scheduler, and reads
//! from the observation API are serialized under a single-writer
//! discipline (§5). The lock is a plain synchronous mutex, not an async
//! one: every critical section here is pure table mutation or a snapshot
//! copy, never I/O, so holding it never blocks the executor. Blocking,
//! bounded operations like `send_with_ack` (C2) must never be called while
//! holding it.

use std::sync::{Mutex, MutexGuard};

use crate::codec::TelemetryRecord;
use crate::config::Config;
use crate::mission::MissionRegistry;
use crate::session::{now_unix, SessionRegistry};
use crate::telemetry::TelemetryRegistry;

/// The three tables, locked together.
pub struct Tables {
    pub sessions: SessionRegistry,
    pub missions: MissionRegistry,
    pub telemetry: TelemetryRegistry,
}

pub struct Registry {
    tables: Mutex<Tables>,
}

impl Registry {
    pub fn new(config: &Config) -> Self {
        Self {
            tables: Mutex::new(Tables {
                sessions: SessionRegistry::new(config.max_rovers),
                missions: MissionRegistry::new(config.max_missions),
                telemetry: TelemetryRegistry::new(),
            }),
        }
    }

    /// Locks all three tables for the duration of the returned guard.
    /// Callers doing compound session+mission mutation (the protocol
    /// engine) take this once per packet and release it before any network
    /// send.
    pub fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Convenience wrapper for the telemetry server: apply one record and
    /// release the lock before returning.
    pub fn ingest_telemetry(&self, record: &TelemetryRecord, now: u64) {
        self.lock().telemetry.ingest(record, now);
    }

    pub fn mark_telemetry_inactive(&self, rover_id: &str) {
        self.lock().telemetry.mark_inactive(rover_id);
    }

    /// Current wall-clock time, re-exported for callers that only have a
    /// `&Registry` in scope.
    pub fn now(&self) -> u64 {
        now_unix()
    }
}
