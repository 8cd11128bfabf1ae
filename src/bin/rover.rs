//! Rover client: drives one simulated rover through handshake, mission
//! request/assign/progress/complete, answers the station's heartbeat pings,
//! and streams telemetry on its own TCP connection.
//!
//! CLI surface and colored status lines are grounded in the teacher's
//! `satbus.rs` binary (clap v2 builder API, `colored` for pass/fail lines).

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use clap::{App, Arg};
use colored::Colorize;
use tokio::net::{TcpStream, UdpSocket};
use tracing::{info, warn};

use mothership::codec::{FixedStr, Packet, PacketType, RoverState, TelemetryRecord, PACKET_SIZE};
use mothership::config::Config;
use mothership::error::TransportError;
use mothership::rover_state::{self, RoverStateRecord};
use mothership::transport::{self, AckWaiter};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = App::new("rover")
        .about("Drives a single rover against a mothership station")
        .arg(Arg::with_name("rover_id").required(true).help("rover identifier, e.g. R-001"))
        .arg(Arg::with_name("station-host").long("station-host").takes_value(true).default_value("127.0.0.1"))
        .arg(Arg::with_name("command-port").long("command-port").takes_value(true))
        .arg(Arg::with_name("telemetry-port").long("telemetry-port").takes_value(true))
        .get_matches();

    let rover_id = matches.value_of("rover_id").unwrap().to_string();
    let host = matches.value_of("station-host").unwrap();
    let mut config = Config::default();
    if let Some(p) = matches.value_of("command-port") {
        config.command_port = p.parse().expect("command-port must be a u16");
    }
    if let Some(p) = matches.value_of("telemetry-port") {
        config.telemetry_port = p.parse().expect("telemetry-port must be a u16");
    }

    let command_addr: SocketAddr = format!("{host}:{}", config.command_port).parse().expect("invalid station address");
    let telemetry_addr: SocketAddr = format!("{host}:{}", config.telemetry_port).parse().expect("invalid station address");

    if let Err(e) = run(&rover_id, command_addr, telemetry_addr, &config).await {
        eprintln!("{} {e}", "rover failed:".red().bold());
        std::process::exit(1);
    }
}

async fn run(
    rover_id: &str,
    command_addr: SocketAddr,
    telemetry_addr: SocketAddr,
    config: &Config,
) -> Result<(), TransportError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    println!("{} handshaking with {command_addr}", "->".cyan());
    transport::perform_handshake(&socket, command_addr, config.handshake_retries, config.handshake_timeout).await?;
    println!("{}", "handshake complete".green());

    let state_path = rover_state::state_path(rover_id);
    let mut saved = rover_state::load(&state_path).unwrap_or(None);

    loop {
        let seq_base = saved.map(|s| s.seq).unwrap_or(0);
        let assign = request_mission(&socket, command_addr, rover_id, seq_base + 1, config).await?;
        let mission_id = assign.mission_id.as_str().to_string();
        let task_type = assign.task_type.as_str().to_string();
        println!(
            "{} assigned mission {} ({})",
            "<-".cyan(),
            mission_id.bold(),
            task_type
        );

        let mut record = RoverStateRecord {
            rover_id: FixedStr::new(rover_id).map_err(TransportError::Codec)?,
            mission_id: assign.mission_id,
            task_type: assign.task_type,
            seq: assign.seq,
            battery: 100,
            progress: 0,
            position_x: assign.x1,
            position_y: assign.y1,
            timestamp: mothership::session::now_unix() as u32,
        };
        let _ = rover_state::save(&state_path, &record);
        saved = Some(record);

        let telemetry_handle = tokio::spawn(stream_telemetry(telemetry_addr, rover_id.to_string()));

        let update_interval = Duration::from_secs(u64::from(assign.update_interval.max(1)));
        let mut ticks = tokio::time::interval(update_interval);
        ticks.tick().await; // first tick fires immediately; consume it before the loop

        let mut buf = [0u8; PACKET_SIZE];
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    record.progress = record.progress.saturating_add(20).min(100);
                    record.seq += 1;
                    record.timestamp = mothership::session::now_unix() as u32;

                    if record.progress >= 100 {
                        let mut complete = Packet::bare(PacketType::Complete, record.seq);
                        complete.rover_id = record.rover_id;
                        complete.battery = record.battery;
                        send_with_ack(&socket, command_addr, &complete, config.ack_retries, config.ack_timeout).await?;
                        println!("{} mission {} complete", "==".green(), mission_id.bold());
                        let _ = rover_state::save(&state_path, &record);
                        saved = Some(record);
                        break;
                    }

                    let mut progress = Packet::bare(PacketType::Progress, record.seq);
                    progress.rover_id = record.rover_id;
                    progress.battery = record.battery;
                    progress.progress = record.progress;
                    send_with_ack(&socket, command_addr, &progress, config.ack_retries, config.ack_timeout).await?;
                    let _ = rover_state::save(&state_path, &record);
                    saved = Some(record);
                    info!(progress = record.progress, "progress reported");
                }
                recv = socket.recv_from(&mut buf) => {
                    let (n, from) = match recv {
                        Ok(pair) => pair,
                        Err(e) => { warn!(error = %e, "command socket recv error"); continue; }
                    };
                    if from != command_addr {
                        continue;
                    }
                    if let Ok(pkt) = Packet::decode(&buf[..n]) {
                        if pkt.packet_type == PacketType::Ping {
                            let mut pong = Packet::bare(PacketType::Pong, pkt.seq);
                            pong.rover_id = record.rover_id;
                            let _ = socket.send_to(&pong.encode(), command_addr).await;
                        }
                    }
                }
            }
        }

        telemetry_handle.abort();
    }
}

/// Sends a REQUEST, then waits for a separate ASSIGN datagram (the station
/// never retransmits ASSIGN — the client's own request timeout drives
/// retries here by looping the whole REQUEST/wait cycle).
async fn request_mission(
    socket: &UdpSocket,
    server: SocketAddr,
    rover_id: &str,
    seq: u32,
    config: &Config,
) -> Result<Packet, TransportError> {
    let mut request = Packet::bare(PacketType::Request, seq);
    request.rover_id = FixedStr::new(rover_id).map_err(TransportError::Codec)?;

    let assign_wait = config.ack_timeout.saturating_mul(u32::from(config.ack_retries.max(1)));
    let mut buf = [0u8; PACKET_SIZE];

    for _ in 0..config.handshake_retries {
        send_with_ack(socket, server, &request, config.ack_retries, config.ack_timeout).await?;

        match tokio::time::timeout(assign_wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) if from == server => {
                if let Ok(pkt) = Packet::decode(&buf[..n]) {
                    if pkt.packet_type == PacketType::Assign {
                        return Ok(pkt);
                    }
                }
            }
            _ => {}
        }
    }
    Err(TransportError::AckFailed { retries: config.handshake_retries })
}

/// Drives a bounded-retry send until a matching ACK arrives or the retry
/// budget runs out (§4.2), using [`AckWaiter`] for the bookkeeping.
async fn send_with_ack(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
    retries: u8,
    timeout: Duration,
) -> Result<(), TransportError> {
    let encoded = packet.encode();
    socket.send_to(&encoded, server).await?;
    let mut waiter = AckWaiter::start(packet.seq, retries, timeout, Instant::now());
    let mut buf = [0u8; PACKET_SIZE];

    loop {
        let remaining = waiter.deadline().saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) if from == server => {
                if let Ok(pkt) = Packet::decode(&buf[..n]) {
                    if pkt.packet_type == PacketType::Ack && waiter.matches(pkt.seq) {
                        return Ok(());
                    }
                }
            }
            _ => {
                if !waiter.retry(Instant::now()) {
                    return Err(TransportError::AckFailed { retries });
                }
                socket.send_to(&encoded, server).await?;
            }
        }
    }
}

/// Opens its own TCP connection to the telemetry port and writes one fixed
/// record a second until the mission ends or the connection drops.
async fn stream_telemetry(telemetry_addr: SocketAddr, rover_id: String) {
    let mut stream = match TcpStream::connect(telemetry_addr).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to open telemetry stream");
            return;
        }
    };

    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    let mut nonce: u32 = 0;
    loop {
        ticks.tick().await;
        let record = TelemetryRecord {
            timestamp: mothership::session::now_unix() as u32,
            rover_id: FixedStr::new(&rover_id).unwrap_or_default(),
            position_x: 0.0,
            position_y: 0.0,
            battery: 100,
            state: RoverState::InMission,
            temperature: 21.0,
            signal_strength: 90,
            nonce,
        };
        nonce = nonce.wrapping_add(1);

        use tokio::io::AsyncWriteExt;
        if stream.write_all(&record.encode()).await.is_err() {
            break;
        }
    }
}
