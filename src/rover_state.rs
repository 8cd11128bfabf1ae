//! Persisted per-rover state file (§6): written by the rover client after
//! each PROGRESS/COMPLETE send, loaded on restart so the rover can resume
//! its sequence counter rather than starting over at a station that still
//! remembers it.

use std::path::{Path, PathBuf};

use crate::codec::{FixedStr, MISSION_ID_LEN, ROVER_ID_LEN, TASK_TYPE_LEN};
use crate::error::CodecError;

pub const STATE_RECORD_SIZE: usize =
    ROVER_ID_LEN + MISSION_ID_LEN + TASK_TYPE_LEN + 4 + 1 + 1 + 4 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoverStateRecord {
    pub rover_id: FixedStr<ROVER_ID_LEN>,
    pub mission_id: FixedStr<MISSION_ID_LEN>,
    pub task_type: FixedStr<TASK_TYPE_LEN>,
    pub seq: u32,
    pub battery: u8,
    pub progress: u8,
    pub position_x: f32,
    pub position_y: f32,
    pub timestamp: u32,
}

impl RoverStateRecord {
    pub fn encode(&self) -> [u8; STATE_RECORD_SIZE] {
        let mut out = [0u8; STATE_RECORD_SIZE];
        let mut at = 0usize;

        out[at..at + ROVER_ID_LEN].copy_from_slice(self.rover_id.as_bytes());
        at += ROVER_ID_LEN;
        out[at..at + MISSION_ID_LEN].copy_from_slice(self.mission_id.as_bytes());
        at += MISSION_ID_LEN;
        out[at..at + TASK_TYPE_LEN].copy_from_slice(self.task_type.as_bytes());
        at += TASK_TYPE_LEN;

        out[at..at + 4].copy_from_slice(&self.seq.to_le_bytes());
        at += 4;
        out[at] = self.battery;
        at += 1;
        out[at] = self.progress;
        at += 1;
        out[at..at + 4].copy_from_slice(&self.position_x.to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&self.position_y.to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&self.timestamp.to_le_bytes());
        at += 4;

        debug_assert_eq!(at, STATE_RECORD_SIZE);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < STATE_RECORD_SIZE {
            return Err(CodecError::Truncated {
                expected: STATE_RECORD_SIZE,
                actual: buf.len(),
            });
        }

        let mut at = 0usize;
        let rover_id = FixedStr::from_bytes(buf[at..at + ROVER_ID_LEN].try_into().unwrap());
        at += ROVER_ID_LEN;
        let mission_id = FixedStr::from_bytes(buf[at..at + MISSION_ID_LEN].try_into().unwrap());
        at += MISSION_ID_LEN;
        let task_type = FixedStr::from_bytes(buf[at..at + TASK_TYPE_LEN].try_into().unwrap());
        at += TASK_TYPE_LEN;

        let seq = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let battery = buf[at];
        at += 1;
        let progress = buf[at];
        at += 1;
        let position_x = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let position_y = f32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;
        let timestamp = u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        at += 4;

        debug_assert_eq!(at, STATE_RECORD_SIZE);

        Ok(Self {
            rover_id,
            mission_id,
            task_type,
            seq,
            battery,
            progress,
            position_x,
            position_y,
            timestamp,
        })
    }
}

/// `rovers/rover_<rover_id>_state.bin`, relative to the current directory.
pub fn state_path(rover_id: &str) -> PathBuf {
    Path::new("rovers").join(format!("rover_{rover_id}_state.bin"))
}

pub fn save(path: &Path, record: &RoverStateRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, record.encode())
}

pub fn load(path: &Path) -> std::io::Result<Option<RoverStateRecord>> {
    match std::fs::read(path) {
        Ok(bytes) => match RoverStateRecord::decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Ok(None),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_record_round_trips() {
        let record = RoverStateRecord {
            rover_id: FixedStr::new("R-001").unwrap(),
            mission_id: FixedStr::new("M-001").unwrap(),
            task_type: FixedStr::new("scan_area").unwrap(),
            seq: 4,
            battery: 70,
            progress: 100,
            position_x: 12.5,
            position_y: 30.0,
            timestamp: 1_700_000_000,
        };
        let encoded = record.encode();
        let decoded = RoverStateRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn state_path_matches_the_documented_convention() {
        assert_eq!(state_path("R-001"), Path::new("rovers/rover_R-001_state.bin"));
    }

    #[test]
    fn load_missing_file_returns_none_not_an_error() {
        let path = Path::new("rovers/does_not_exist_R-999_state.bin");
        assert!(load(path).unwrap().is_none());
    }
}
