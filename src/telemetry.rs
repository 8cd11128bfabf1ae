//! Telemetry server (C7): accepts telemetry streams, parses fixed records,
//! and maintains the last-seen snapshot per rover.
//!
//! Grounded in the teacher's `simulator.rs` accept loop (`TcpListener`,
//! `tokio::spawn` per connection, `Arc<Mutex<..>>` shared state), generalized
//! from a JSON command/response channel to a one-way, fixed-record stream.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::codec::{RoverState, TelemetryRecord, TELEMETRY_RECORD_SIZE};
use crate::registry::Registry;

/// The last-seen snapshot for one rover (§3). Created on first telemetry
/// record; the stream side is torn down on EOF/error but the snapshot
/// persists with `active` cleared.
#[derive(Debug, Clone)]
pub struct TelemetryView {
    pub rover_id: String,
    pub position_x: f32,
    pub position_y: f32,
    pub battery: u8,
    pub state: RoverState,
    pub temperature: f32,
    pub signal_strength: u8,
    pub last_update: u64,
    pub active: bool,
}

impl TelemetryView {
    fn from_record(record: &TelemetryRecord, now: u64) -> Self {
        Self {
            rover_id: record.rover_id.as_str().to_string(),
            position_x: record.position_x,
            position_y: record.position_y,
            battery: record.battery,
            state: record.state,
            temperature: record.temperature,
            signal_strength: record.signal_strength,
            last_update: now,
            active: true,
        }
    }

    fn apply(&mut self, record: &TelemetryRecord, now: u64) {
        self.position_x = record.position_x;
        self.position_y = record.position_y;
        self.battery = record.battery;
        self.state = record.state;
        self.temperature = record.temperature;
        self.signal_strength = record.signal_strength;
        self.last_update = now;
        self.active = true;
    }
}

/// Keyed by `rover_id`. One entry per rover that has ever sent telemetry;
/// entries outlive their stream.
#[derive(Debug, Default)]
pub struct TelemetryRegistry {
    views: HashMap<String, TelemetryView>,
}

impl TelemetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rover_id: &str) -> Option<&TelemetryView> {
        self.views.get(rover_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetryView> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn active_count(&self) -> usize {
        self.views.values().filter(|v| v.active).count()
    }

    /// Applies one received record, creating the view on first contact.
    pub fn ingest(&mut self, record: &TelemetryRecord, now: u64) {
        let rover_id = record.rover_id.as_str().to_string();
        self.views
            .entry(rover_id)
            .and_modify(|v| v.apply(record, now))
            .or_insert_with(|| TelemetryView::from_record(record, now));
    }

    /// Marks a rover's view inactive on stream loss without discarding the
    /// snapshot.
    pub fn mark_inactive(&mut self, rover_id: &str) {
        if let Some(v) = self.views.get_mut(rover_id) {
            v.active = false;
        }
    }
}

/// Runs the telemetry accept loop until the listener errors out. Accepts up
/// to `max_telemetry` concurrent connections (§4.7); additional connections
/// queue behind the semaphore rather than being refused outright, since the
/// spec only bounds *concurrent* streams, not arrival order.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>, max_telemetry: usize) {
    let permits = Arc::new(Semaphore::new(max_telemetry));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "telemetry accept failed");
                continue;
            }
        };
        info!(%peer, "telemetry stream opened");

        let registry = Arc::clone(&registry);
        let permits = Arc::clone(&permits);
        tokio::spawn(async move {
            let _permit = permits.acquire().await;
            handle_stream(stream, &registry).await;
        });
    }
}

async fn handle_stream(mut stream: TcpStream, registry: &Registry) {
    let mut buf = [0u8; TELEMETRY_RECORD_SIZE];
    let mut last_rover_id: Option<String> = None;

    loop {
        match stream.read_exact(&mut buf).await {
            Ok(_) => match TelemetryRecord::decode(&buf) {
                Ok(record) => {
                    let now = crate::session::now_unix();
                    last_rover_id = Some(record.rover_id.as_str().to_string());
                    registry.ingest_telemetry(&record, now);
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed telemetry record");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                warn!(error = %e, "telemetry stream read error");
                break;
            }
        }
    }

    if let Some(rover_id) = last_rover_id {
        registry.mark_telemetry_inactive(&rover_id);
    }
    info!("telemetry stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FixedStr;

    fn sample_record(rover_id: &str, position_x: f32) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: 0,
            rover_id: FixedStr::new(rover_id).unwrap(),
            position_x,
            position_y: position_x,
            battery: 70,
            state: RoverState::InMission,
            temperature: 21.0,
            signal_strength: 90,
            nonce: 0,
        }
    }

    #[test]
    fn ingest_creates_view_on_first_contact() {
        let mut reg = TelemetryRegistry::new();
        reg.ingest(&sample_record("R-001", 1.0), 10);
        let view = reg.get("R-001").unwrap();
        assert_eq!(view.position_x, 1.0);
        assert!(view.active);
    }

    #[test]
    fn ingest_updates_existing_view_to_latest_record() {
        let mut reg = TelemetryRegistry::new();
        reg.ingest(&sample_record("R-001", 1.0), 10);
        reg.ingest(&sample_record("R-001", 2.5), 11);
        let view = reg.get("R-001").unwrap();
        assert_eq!(view.position_x, 2.5);
        assert_eq!(view.last_update, 11);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn stream_loss_preserves_snapshot_but_marks_inactive() {
        let mut reg = TelemetryRegistry::new();
        reg.ingest(&sample_record("R-001", 1.0), 10);
        reg.mark_inactive("R-001");
        let view = reg.get("R-001").unwrap();
        assert!(!view.active);
        assert_eq!(view.position_x, 1.0);
    }
}
