//! Mission registry (C4): mission records, id allocation, and the fixed
//! task parameter table.

use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Area rectangle assigned with a mission, `(x1,y1) -> (x2,y2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One entry of the fixed task parameter table (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct TaskParams {
    pub task_type: &'static str,
    pub area: AreaRect,
    pub duration: u32,
}

/// The fixed set of task types a REQUEST may be assigned, with their area
/// and duration ceiling. Order here has no wire meaning; selection is
/// uniform-random over this table.
pub const TASK_TABLE: [TaskParams; 5] = [
    TaskParams {
        task_type: "capture_images",
        area: AreaRect { x1: 10.0, y1: 10.0, x2: 30.0, y2: 30.0 },
        duration: 300,
    },
    TaskParams {
        task_type: "analyze_soil",
        area: AreaRect { x1: 20.0, y1: 20.0, x2: 25.0, y2: 25.0 },
        duration: 600,
    },
    TaskParams {
        task_type: "collect_samples",
        area: AreaRect { x1: 5.0, y1: 5.0, x2: 45.0, y2: 45.0 },
        duration: 900,
    },
    TaskParams {
        task_type: "scan_area",
        area: AreaRect { x1: 0.0, y1: 0.0, x2: 50.0, y2: 50.0 },
        duration: 400,
    },
    TaskParams {
        task_type: "deploy_sensor",
        area: AreaRect { x1: 15.0, y1: 15.0, x2: 35.0, y2: 35.0 },
        duration: 500,
    },
];

pub const DEFAULT_UPDATE_INTERVAL: u32 = 10;

/// Picks one entry of [`TASK_TABLE`] uniformly at random.
pub fn pick_task() -> TaskParams {
    // TASK_TABLE is non-empty and fixed at compile time.
    *TASK_TABLE.choose(&mut rand::thread_rng()).unwrap()
}

/// A mission's lifecycle record (§3). Created at REQUEST-handling time,
/// mutated on PROGRESS and COMPLETE, never deleted.
#[derive(Debug, Clone)]
pub struct MissionRecord {
    pub id: String,
    pub rover_id: String,
    pub task_type: String,
    pub area: AreaRect,
    pub duration: u32,
    pub update_interval: u32,
    pub progress: u8,
    pub battery: u8,
    pub start_time: u64,
    pub last_update: u64,
    pub updates_count: u32,
    pub completed: bool,
}

/// The MissionRecord table, capped at `max_missions` (C4). Ids are
/// allocated from a monotonically increasing counter rendered as `M-%03d`.
#[derive(Debug)]
pub struct MissionRegistry {
    missions: HashMap<String, MissionRecord>,
    next_id: u32,
    capacity: usize,
}

impl MissionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            missions: HashMap::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.missions.len() >= self.capacity
    }

    pub fn get(&self, id: &str) -> Option<&MissionRecord> {
        self.missions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionRecord> {
        self.missions.values()
    }

    /// Allocates a fresh mission for `rover_id`, drawing task type and
    /// parameters uniformly at random from [`TASK_TABLE`]. Returns `None`
    /// if the table is full (§7: mission table full -> skip mission
    /// creation, no ASSIGN emitted).
    pub fn create(&mut self, rover_id: &str, now: u64) -> Option<&MissionRecord> {
        if self.is_full() {
            return None;
        }
        let params = pick_task();
        let id = format!("M-{:03}", self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let record = MissionRecord {
            id: id.clone(),
            rover_id: rover_id.to_string(),
            task_type: params.task_type.to_string(),
            area: params.area,
            duration: params.duration,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            progress: 0,
            battery: 100,
            start_time: now,
            last_update: now,
            updates_count: 0,
            completed: false,
        };
        self.missions.insert(id.clone(), record);
        self.missions.get(&id)
    }

    /// Bumps `updates_count`, refreshes `last_update`, and overwrites
    /// `progress`/`battery` (§4.4). A no-op if `id` is unknown.
    pub fn update_mission(&mut self, id: &str, progress: u8, battery: u8, now: u64) {
        if let Some(m) = self.missions.get_mut(id) {
            m.progress = progress;
            m.battery = battery;
            m.last_update = now;
            m.updates_count = m.updates_count.saturating_add(1);
        }
    }

    /// Marks a mission complete. Idempotent: calling again on an already
    /// completed mission changes nothing.
    pub fn mark_complete(&mut self, id: &str, battery: u8, now: u64) {
        if let Some(m) = self.missions.get_mut(id) {
            m.progress = 100;
            m.completed = true;
            m.battery = battery;
            m.last_update = now;
            m.updates_count = m.updates_count.saturating_add(1);
        }
    }
}
