//! # Mothership
//!
//! A fleet-control station that coordinates a small population of remote
//! rovers over three concurrent channels: a reliable command channel built
//! on an unordered datagram transport, a periodic ping/pong liveness
//! protocol multiplexed on that same channel, and a one-way telemetry
//! stream over a connection-oriented transport. A small embedded HTTP
//! server exposes a read-only, snapshot-consistent view of the station's
//! tables.
//!
//! ## Architecture
//!
//! - [`codec`] - wire framing for command packets and telemetry records
//! - [`transport`] - reliable send-with-ack, handshake, duplicate detection
//! - [`session`] - per-rover session table
//! - [`mission`] - mission records and id allocation
//! - [`registry`] - the single shared-table value the rest of the crate reads and writes
//! - [`heartbeat`] - ping/pong liveness scheduler
//! - [`engine`] - the mission protocol state machine
//! - [`telemetry`] - telemetry stream acceptance and per-rover snapshots
//! - [`api`] - the observation HTTP server
//! - [`station`] - orchestrator tying the above into one running process
//! - [`config`] - tunable ports, capacities and timeouts
//! - [`error`] - crate error types

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod api;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod mission;
pub mod registry;
pub mod rover_state;
pub mod session;
pub mod station;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use error::{CodecError, StationError, TransportError};
pub use registry::Registry;
pub use station::Station;
