//! Observation API (C8): a small read-only HTTP/1.1 server over the same
//! tables the protocol engine writes.
//!
//! No framework is pulled in — the request line is parsed by hand and the
//! response is written directly, matching the teacher's own preference for
//! hand-rolled line protocols (`simulator.rs`'s JSON-over-TCP command loop)
//! over a library dependency for a surface this small and fully internal.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::registry::Registry;

const KNOWN_ENDPOINTS: &[&str] = &[
    "/api/system/status",
    "/api/rovers",
    "/api/rovers/{id}",
    "/api/missions",
    "/api/missions/{id}",
    "/api/telemetry/latest",
    "/api/telemetry/{rover_id}",
];

/// A rover is reported `"active"` once its last telemetry/session update is
/// within this many seconds (§4.8).
const ROVER_ACTIVE_WINDOW_SECS: u64 = 35;

fn format_timestamp(unix_secs: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(unix_secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

#[derive(Serialize)]
struct RoverCounts {
    total: usize,
    active: usize,
}

#[derive(Serialize)]
struct MissionCounts {
    total: usize,
    in_progress: usize,
    completed: usize,
}

#[derive(Serialize)]
struct TelemetryCounts {
    sessions: usize,
    active: usize,
}

#[derive(Serialize)]
struct SystemStatusBody {
    timestamp: String,
    rovers: RoverCounts,
    missions: MissionCounts,
    telemetry: TelemetryCounts,
}

#[derive(Serialize)]
struct SystemStatusResponse {
    system: SystemStatusBody,
}

#[derive(Serialize)]
struct RoverSummary {
    id: String,
    status: &'static str,
    battery: u8,
    progress: u8,
    mission_id: Option<String>,
    last_update_seconds_ago: u64,
}

#[derive(Serialize)]
struct RoverListResponse {
    rovers: Vec<RoverSummary>,
}

#[derive(Serialize)]
struct RoverDetail {
    id: String,
    status: &'static str,
    last_seq: u32,
    battery: u8,
    progress: u8,
    mission_id: Option<String>,
    task_type: Option<String>,
    last_activity: String,
    awaiting_pong: bool,
    consecutive_missed_pongs: u8,
}

#[derive(Serialize)]
struct RoverDetailResponse {
    rover: RoverDetail,
}

#[derive(Serialize)]
struct AreaJson {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

#[derive(Serialize)]
struct MissionSummary {
    id: String,
    rover_id: String,
    task_type: String,
    progress: u8,
    battery: u8,
    status: &'static str,
    area: AreaJson,
    duration_max: u32,
    start_time: String,
    updates_received: u32,
}

#[derive(Serialize)]
struct MissionListResponse {
    missions: Vec<MissionSummary>,
}

#[derive(Serialize)]
struct MissionDetailResponse {
    mission: MissionSummary,
}

#[derive(Serialize)]
struct PositionJson {
    x: f32,
    y: f32,
}

#[derive(Serialize)]
struct TelemetrySnapshot {
    rover_id: String,
    position: PositionJson,
    battery: u8,
    temperature: f32,
    signal_strength: u8,
    state: &'static str,
    last_update_ago: u64,
}

#[derive(Serialize)]
struct TelemetryListResponse {
    telemetry: Vec<TelemetrySnapshot>,
}

#[derive(Serialize)]
struct TelemetryDetailResponse {
    telemetry: TelemetrySnapshot,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct NotFoundResponse<'a> {
    error: &'a str,
    endpoints: &'a [&'a str],
}

fn rover_state_label(state: crate::codec::RoverState) -> &'static str {
    match state {
        crate::codec::RoverState::Idle => "idle",
        crate::codec::RoverState::InMission => "in_mission",
        crate::codec::RoverState::Returning => "returning",
        crate::codec::RoverState::Error => "error",
        crate::codec::RoverState::Charging => "charging",
    }
}

fn mission_status(completed: bool) -> &'static str {
    if completed {
        "completed"
    } else {
        "in_progress"
    }
}

fn rover_status(active: bool, last_update: u64, now: u64) -> &'static str {
    if active && now.saturating_sub(last_update) < ROVER_ACTIVE_WINDOW_SECS {
        "active"
    } else {
        "inactive"
    }
}

enum Response {
    Json { status: u16, body: String },
}

fn ok_json<T: Serialize>(value: &T) -> Response {
    Response::Json {
        status: 200,
        body: serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()),
    }
}

fn not_found(what: &str) -> Response {
    Response::Json {
        status: 404,
        body: serde_json::to_string(&ErrorResponse { error: &format!("{what} not found") })
            .unwrap_or_else(|_| "{}".to_string()),
    }
}

fn route_not_found() -> Response {
    Response::Json {
        status: 404,
        body: serde_json::to_string(&NotFoundResponse {
            error: "unknown endpoint",
            endpoints: KNOWN_ENDPOINTS,
        })
        .unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Handles one parsed `GET` path against a single consistent snapshot of
/// the three tables (§4.8, §5): the lock is held for the whole of this
/// function and released before the caller writes any bytes.
fn handle_path(registry: &Registry, path: &str) -> Response {
    let now = registry.now();
    let tables = registry.lock();

    match path {
        "/api/system/status" => {
            let rovers_total = tables.sessions.len();
            let rovers_active = tables
                .sessions
                .iter()
                .filter(|s| rover_status(s.active, s.last_activity, now) == "active")
                .count();
            let missions_total = tables.missions.len();
            let missions_completed = tables.missions.iter().filter(|m| m.completed).count();
            ok_json(&SystemStatusResponse {
                system: SystemStatusBody {
                    timestamp: format_timestamp(now),
                    rovers: RoverCounts { total: rovers_total, active: rovers_active },
                    missions: MissionCounts {
                        total: missions_total,
                        in_progress: missions_total - missions_completed,
                        completed: missions_completed,
                    },
                    telemetry: TelemetryCounts {
                        sessions: tables.telemetry.len(),
                        active: tables.telemetry.active_count(),
                    },
                },
            })
        }

        "/api/rovers" => {
            let rovers = tables
                .sessions
                .iter()
                .map(|s| RoverSummary {
                    id: s.rover_id.clone(),
                    status: rover_status(s.active, s.last_activity, now),
                    battery: s.battery,
                    progress: s.progress,
                    mission_id: s.mission_id.clone(),
                    last_update_seconds_ago: now.saturating_sub(s.last_activity),
                })
                .collect();
            ok_json(&RoverListResponse { rovers })
        }

        "/api/missions" => {
            let missions = tables.missions.iter().map(mission_summary).collect();
            ok_json(&MissionListResponse { missions })
        }

        "/api/telemetry/latest" => {
            let telemetry = tables.telemetry.iter().map(|v| telemetry_snapshot(v, now)).collect();
            ok_json(&TelemetryListResponse { telemetry })
        }

        other => {
            if let Some(id) = other.strip_prefix("/api/rovers/") {
                match tables.sessions.get(id) {
                    Some(s) => ok_json(&RoverDetailResponse {
                        rover: RoverDetail {
                            id: s.rover_id.clone(),
                            status: rover_status(s.active, s.last_activity, now),
                            last_seq: s.last_seq,
                            battery: s.battery,
                            progress: s.progress,
                            mission_id: s.mission_id.clone(),
                            task_type: s.task_type.clone(),
                            last_activity: format_timestamp(s.last_activity),
                            awaiting_pong: s.awaiting_pong,
                            consecutive_missed_pongs: s.consecutive_missed_pongs,
                        },
                    }),
                    None => not_found("Rover"),
                }
            } else if let Some(id) = other.strip_prefix("/api/missions/") {
                match tables.missions.get(id) {
                    Some(m) => ok_json(&MissionDetailResponse { mission: mission_summary(m) }),
                    None => not_found("Mission"),
                }
            } else if let Some(id) = other.strip_prefix("/api/telemetry/") {
                match tables.telemetry.get(id) {
                    Some(v) => ok_json(&TelemetryDetailResponse { telemetry: telemetry_snapshot(v, now) }),
                    None => not_found("Telemetry"),
                }
            } else {
                route_not_found()
            }
        }
    }
}

fn mission_summary(m: &crate::mission::MissionRecord) -> MissionSummary {
    MissionSummary {
        id: m.id.clone(),
        rover_id: m.rover_id.clone(),
        task_type: m.task_type.clone(),
        progress: m.progress,
        battery: m.battery,
        status: mission_status(m.completed),
        area: AreaJson { x1: m.area.x1, y1: m.area.y1, x2: m.area.x2, y2: m.area.y2 },
        duration_max: m.duration,
        start_time: format_timestamp(m.start_time),
        updates_received: m.updates_count,
    }
}

fn telemetry_snapshot(v: &crate::telemetry::TelemetryView, now: u64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        rover_id: v.rover_id.clone(),
        position: PositionJson { x: v.position_x, y: v.position_y },
        battery: v.battery,
        temperature: v.temperature,
        signal_strength: v.signal_strength,
        state: rover_state_label(v.state),
        last_update_ago: now.saturating_sub(v.last_update),
    }
}

/// Runs the HTTP accept loop until the listener errors out.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "observation API accept failed");
                continue;
            }
        };
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &registry).await {
                warn!(%peer, error = %e, "observation API connection error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, registry: &Registry) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let path = parse_get_path(&request_line);
    // Drain the remaining header lines (Connection: close, no body expected
    // for GET) so the client's write side can complete cleanly.
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let response = match path {
        Some(path) => handle_path(registry, &path),
        None => route_not_found(),
    };

    let stream = reader.into_inner();
    write_response(stream, response).await
}

fn parse_get_path(request_line: &str) -> Option<String> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }
    Some(target.split('?').next().unwrap_or(target).to_string())
}

async fn write_response(mut stream: TcpStream, response: Response) -> std::io::Result<()> {
    let Response::Json { status, body } = response;
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json; charset=utf-8\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {len}\r\n\
         Connection: close\r\n\r\n",
        status = status,
        reason = reason,
        len = body.len(),
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await?;
    info!(status, "observation API request served");
    Ok(())
}
