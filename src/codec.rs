//! Wire codec (C1): fixed-size framing for command packets and telemetry
//! records.
//!
//! Byte layout is little-endian and exact — no implicit padding is ever
//! introduced by this module; every byte of a `Packet` and a
//! `TelemetryRecord` is written and read explicitly, field by field, so the
//! layout does not depend on host struct alignment. This mirrors the
//! teacher's preference for explicit, bounded, no-heap-state buffers
//! (`ArrayString`/fixed arrays) over anything that could allocate or vary
//! in size.

use crate::error::CodecError;
use static_assertions::const_assert_eq;

pub const ROVER_ID_LEN: usize = 32;
pub const MISSION_ID_LEN: usize = 32;
pub const TASK_TYPE_LEN: usize = 64;

/// The named fields of a `Packet` sum to 163 bytes; the remainder is a
/// reserved, always-zero block that pads the frame out to the mandated 228
/// bytes. Preserved byte-exact (like `nonce`) but otherwise never
/// interpreted, the same treatment the spec gives `nonce` itself.
pub const PACKET_RESERVED_LEN: usize = 65;
pub const PACKET_SIZE: usize = 228;
pub const TELEMETRY_RECORD_SIZE: usize = 55;

const_assert_eq!(
    1 + 4 + 1 + 1 + 4 + ROVER_ID_LEN + MISSION_ID_LEN + TASK_TYPE_LEN + 16 + 4 + 4 + PACKET_RESERVED_LEN,
    PACKET_SIZE
);
const_assert_eq!(4 + ROVER_ID_LEN + 4 + 4 + 1 + 1 + 4 + 1 + 4, TELEMETRY_RECORD_SIZE);

/// A NUL-padded fixed-width ASCII field. Stored as raw bytes so encode/decode
/// never allocates; `as_str` lazily validates/trims on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    pub const fn empty() -> Self {
        Self { bytes: [0u8; N] }
    }

    pub fn new(s: &str) -> Result<Self, CodecError> {
        let src = s.as_bytes();
        if src.len() > N {
            return Err(CodecError::FieldTooLong(N));
        }
        let mut bytes = [0u8; N];
        bytes[..src.len()].copy_from_slice(src);
        Ok(Self { bytes })
    }

    pub fn as_str(&self) -> &str {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(N);
        std::str::from_utf8(&self.bytes[..end]).unwrap_or("")
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self { bytes }
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self::empty()
    }
}

/// `type` byte of a command-channel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Handshake,
    Request,
    Assign,
    Progress,
    Complete,
    Ack,
    Ping,
    Pong,
}

impl PacketType {
    pub const fn to_byte(self) -> u8 {
        match self {
            PacketType::Handshake => 0xFF,
            PacketType::Request => 1,
            PacketType::Assign => 2,
            PacketType::Progress => 3,
            PacketType::Complete => 4,
            PacketType::Ack => 5,
            PacketType::Ping => 10,
            PacketType::Pong => 11,
        }
    }

    pub const fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0xFF => Ok(PacketType::Handshake),
            1 => Ok(PacketType::Request),
            2 => Ok(PacketType::Assign),
            3 => Ok(PacketType::Progress),
            4 => Ok(PacketType::Complete),
            5 => Ok(PacketType::Ack),
            10 => Ok(PacketType::Ping),
            11 => Ok(PacketType::Pong),
            other => Err(CodecError::UnknownType(other)),
        }
    }

    /// Whether this packet type carries state-advancing data subject to
    /// strict sequence admissibility (REQUEST/PROGRESS/COMPLETE).
    pub const fn is_data_carrying(self) -> bool {
        matches!(self, PacketType::Request | PacketType::Progress | PacketType::Complete)
    }
}

/// The 228-byte command-channel frame. All unused fields in non-ASSIGN
/// frames are zero (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub seq: u32,
    pub battery: u8,
    pub progress: u8,
    pub nonce: u32,
    pub rover_id: FixedStr<ROVER_ID_LEN>,
    pub mission_id: FixedStr<MISSION_ID_LEN>,
    pub task_type: FixedStr<TASK_TYPE_LEN>,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub duration: u32,
    pub update_interval: u32,
}

impl Packet {
    /// A zeroed packet of the given type and sequence, with every other
    /// field at its non-ASSIGN default of zero.
    pub fn bare(packet_type: PacketType, seq: u32) -> Self {
        Self {
            packet_type,
            seq,
            battery: 0,
            progress: 0,
            nonce: 0,
            rover_id: FixedStr::empty(),
            mission_id: FixedStr::empty(),
            task_type: FixedStr::empty(),
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            duration: 0,
            update_interval: 0,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        let mut at = 0usize;

        out[at] = self.packet_type.to_byte();
        at += 1;

        out[at..at + 4].copy_from_slice(&self.seq.to_le_bytes());
        at += 4;

        out[at] = self.battery;
        at += 1;
        out[at] = self.progress;
        at += 1;

        out[at..at + 4].copy_from_slice(&self.nonce.to_le_bytes());
        at += 4;

        out[at..at + ROVER_ID_LEN].copy_from_slice(self.rover_id.as_bytes());
        at += ROVER_ID_LEN;
        out[at..at + MISSION_ID_LEN].copy_from_slice(self.mission_id.as_bytes());
        at += MISSION_ID_LEN;
        out[at..at + TASK_TYPE_LEN].copy_from_slice(self.task_type.as_bytes());
        at += TASK_TYPE_LEN;

        for v in [self.x1, self.y1, self.x2, self.y2] {
            out[at..at + 4].copy_from_slice(&v.to_le_bytes());
            at += 4;
        }

        out[at..at + 4].copy_from_slice(&self.duration.to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&self.update_interval.to_le_bytes());
        at += 4;

        // `at + PACKET_RESERVED_LEN == PACKET_SIZE`; reserved bytes stay zero.
        debug_assert_eq!(at + PACKET_RESERVED_LEN, PACKET_SIZE);

        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < PACKET_SIZE {
            return Err(CodecError::Truncated {
                expected: PACKET_SIZE,
                actual: buf.len(),
            });
        }

        let mut at = 0usize;
        let packet_type = PacketType::from_byte(buf[at])?;
        at += 1;

        let seq = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;

        let battery = buf[at];
        at += 1;
        let progress = buf[at];
        at += 1;

        let nonce = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;

        let rover_id = FixedStr::from_bytes(buf[at..at + ROVER_ID_LEN].try_into().unwrap());
        at += ROVER_ID_LEN;
        let mission_id = FixedStr::from_bytes(buf[at..at + MISSION_ID_LEN].try_into().unwrap());
        at += MISSION_ID_LEN;
        let task_type = FixedStr::from_bytes(buf[at..at + TASK_TYPE_LEN].try_into().unwrap());
        at += TASK_TYPE_LEN;

        let mut floats = [0f32; 4];
        for f in &mut floats {
            *f = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
            at += 4;
        }

        let duration = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let update_interval = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;

        debug_assert_eq!(at + PACKET_RESERVED_LEN, PACKET_SIZE);

        Ok(Self {
            packet_type,
            seq,
            battery,
            progress,
            nonce,
            rover_id,
            mission_id,
            task_type,
            x1: floats[0],
            y1: floats[1],
            x2: floats[2],
            y2: floats[3],
            duration,
            update_interval,
        })
    }
}

/// Rover operating state carried in a [`TelemetryRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoverState {
    Idle,
    InMission,
    Returning,
    Error,
    Charging,
}

impl RoverState {
    pub const fn to_byte(self) -> u8 {
        match self {
            RoverState::Idle => 0,
            RoverState::InMission => 1,
            RoverState::Returning => 2,
            RoverState::Error => 3,
            RoverState::Charging => 4,
        }
    }

    pub const fn from_byte(b: u8) -> Result<Self, CodecError> {
        match b {
            0 => Ok(RoverState::Idle),
            1 => Ok(RoverState::InMission),
            2 => Ok(RoverState::Returning),
            3 => Ok(RoverState::Error),
            4 => Ok(RoverState::Charging),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// One fixed-size telemetry frame (C7), written in strict receive order
/// over the telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: u32,
    pub rover_id: FixedStr<ROVER_ID_LEN>,
    pub position_x: f32,
    pub position_y: f32,
    pub battery: u8,
    pub state: RoverState,
    pub temperature: f32,
    pub signal_strength: u8,
    pub nonce: u32,
}

impl TelemetryRecord {
    pub fn encode(&self) -> [u8; TELEMETRY_RECORD_SIZE] {
        let mut out = [0u8; TELEMETRY_RECORD_SIZE];
        let mut at = 0usize;

        out[at..at + 4].copy_from_slice(&self.timestamp.to_le_bytes());
        at += 4;
        out[at..at + ROVER_ID_LEN].copy_from_slice(self.rover_id.as_bytes());
        at += ROVER_ID_LEN;
        out[at..at + 4].copy_from_slice(&self.position_x.to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&self.position_y.to_le_bytes());
        at += 4;
        out[at] = self.battery;
        at += 1;
        out[at] = self.state.to_byte();
        at += 1;
        out[at..at + 4].copy_from_slice(&self.temperature.to_le_bytes());
        at += 4;
        out[at] = self.signal_strength;
        at += 1;
        out[at..at + 4].copy_from_slice(&self.nonce.to_le_bytes());
        at += 4;

        debug_assert_eq!(at, TELEMETRY_RECORD_SIZE);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < TELEMETRY_RECORD_SIZE {
            return Err(CodecError::Truncated {
                expected: TELEMETRY_RECORD_SIZE,
                actual: buf.len(),
            });
        }

        let mut at = 0usize;
        let timestamp = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let rover_id = FixedStr::from_bytes(buf[at..at + ROVER_ID_LEN].try_into().unwrap());
        at += ROVER_ID_LEN;
        let position_x = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let position_y = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let battery = buf[at];
        at += 1;
        let state = RoverState::from_byte(buf[at])?;
        at += 1;
        let temperature = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let signal_strength = buf[at];
        at += 1;
        let nonce = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;

        debug_assert_eq!(at, TELEMETRY_RECORD_SIZE);

        Ok(Self {
            timestamp,
            rover_id,
            position_x,
            position_y,
            battery,
            state,
            temperature,
            signal_strength,
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        Packet {
            packet_type: PacketType::Assign,
            seq: 2,
            battery: 0,
            progress: 0,
            nonce: 0xDEAD_BEEF,
            rover_id: FixedStr::new("R-001").unwrap(),
            mission_id: FixedStr::new("M-001").unwrap(),
            task_type: FixedStr::new("scan_area").unwrap(),
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 50.0,
            duration: 400,
            update_interval: 10,
        }
    }

    #[test]
    fn packet_round_trips() {
        let p = sample_packet();
        let encoded = p.encode();
        assert_eq!(encoded.len(), PACKET_SIZE);
        let decoded = Packet::decode(&encoded).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn packet_type_byte_values_match_the_wire_contract() {
        assert_eq!(PacketType::Handshake.to_byte(), 0xFF);
        assert_eq!(PacketType::Request.to_byte(), 1);
        assert_eq!(PacketType::Assign.to_byte(), 2);
        assert_eq!(PacketType::Progress.to_byte(), 3);
        assert_eq!(PacketType::Complete.to_byte(), 4);
        assert_eq!(PacketType::Ack.to_byte(), 5);
        assert_eq!(PacketType::Ping.to_byte(), 10);
        assert_eq!(PacketType::Pong.to_byte(), 11);
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let buf = [0u8; PACKET_SIZE - 1];
        assert_eq!(
            Packet::decode(&buf),
            Err(CodecError::Truncated {
                expected: PACKET_SIZE,
                actual: PACKET_SIZE - 1
            })
        );
    }

    #[test]
    fn unknown_packet_type_is_rejected() {
        let mut buf = sample_packet().encode();
        buf[0] = 0x42;
        assert_eq!(Packet::decode(&buf), Err(CodecError::UnknownType(0x42)));
    }

    #[test]
    fn telemetry_record_round_trips() {
        let rec = TelemetryRecord {
            timestamp: 1_700_000_000,
            rover_id: FixedStr::new("R-001").unwrap(),
            position_x: 2.5,
            position_y: 2.5,
            battery: 70,
            state: RoverState::InMission,
            temperature: 21.4,
            signal_strength: 88,
            nonce: 7,
        };
        let encoded = rec.encode();
        assert_eq!(encoded.len(), TELEMETRY_RECORD_SIZE);
        let decoded = TelemetryRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, rec);
    }

    #[test]
    fn fixed_str_preserves_nul_padding_and_trims_on_read() {
        let s = FixedStr::<ROVER_ID_LEN>::new("R-001").unwrap();
        assert_eq!(s.as_str(), "R-001");
        assert_eq!(s.as_bytes()[5], 0);
    }

    #[test]
    fn fixed_str_rejects_oversized_input() {
        let too_long = "x".repeat(TASK_TYPE_LEN + 1);
        assert_eq!(
            FixedStr::<TASK_TYPE_LEN>::new(&too_long),
            Err(CodecError::FieldTooLong(TASK_TYPE_LEN))
        );
    }
}
