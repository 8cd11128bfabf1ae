//! Station orchestrator (C9): binds the three listeners and runs the
//! command-channel dispatch loop, delegating heartbeat and telemetry to
//! their own spawned tasks.
//!
//! Grounded in the teacher's `simulator.rs::run` top level: bind first (fatal
//! on failure), then spawn the long-running pieces and drive the socket that
//! has to stay on the calling task.

use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, warn};

use crate::codec::Packet;
use crate::config::Config;
use crate::error::StationError;
use crate::registry::Registry;
use crate::transport::{is_handshake_frame, respond_to_handshake};
use crate::{api, engine, heartbeat, session, telemetry};

/// A running station: the bound sockets plus the shared table registry.
/// Built by [`Station::bind`], driven to completion (it never returns under
/// normal operation) by [`Station::run`].
pub struct Station {
    command_socket: Arc<UdpSocket>,
    telemetry_listener: TcpListener,
    api_listener: TcpListener,
    registry: Arc<Registry>,
    config: Config,
}

impl Station {
    /// Binds all three listeners. Any bind failure is fatal (§7): there is
    /// no partial-startup mode.
    pub async fn bind(config: Config) -> Result<Self, StationError> {
        let command_socket = UdpSocket::bind(("0.0.0.0", config.command_port))
            .await
            .map_err(|source| StationError::CommandBind { port: config.command_port, source })?;

        let telemetry_listener = TcpListener::bind(("0.0.0.0", config.telemetry_port))
            .await
            .map_err(|source| StationError::TelemetryBind { port: config.telemetry_port, source })?;

        let api_listener = TcpListener::bind(("0.0.0.0", config.api_port))
            .await
            .map_err(|source| StationError::ApiBind { port: config.api_port, source })?;

        info!(
            command_port = config.command_port,
            telemetry_port = config.telemetry_port,
            api_port = config.api_port,
            "station listeners bound"
        );

        Ok(Self {
            command_socket: Arc::new(command_socket),
            telemetry_listener,
            api_listener,
            registry: Arc::new(Registry::new(&config)),
            config,
        })
    }

    /// Runs the station until the process is killed: spawns the telemetry
    /// accept loop, the heartbeat scheduler, and the observation API, then
    /// drives the command-channel recv loop on the calling task.
    pub async fn run(self) {
        let Station { command_socket, telemetry_listener, api_listener, registry, config } = self;

        tokio::spawn(telemetry::serve(telemetry_listener, Arc::clone(&registry), config.max_telemetry));

        tokio::spawn(heartbeat::run(Arc::clone(&registry), Arc::clone(&command_socket), config.clone()));

        tokio::spawn(api::serve(api_listener, Arc::clone(&registry)));

        run_command_loop(&command_socket, &registry).await;
    }
}

async fn run_command_loop(command_socket: &UdpSocket, registry: &Registry) {
    let mut buf = [0u8; crate::codec::PACKET_SIZE];
    loop {
        let (n, peer) = match command_socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "command socket recv error");
                continue;
            }
        };

        let datagram = &buf[..n];

        if is_handshake_frame(datagram) {
            if let Err(e) = respond_to_handshake(command_socket, peer).await {
                warn!(%peer, error = %e, "failed to respond to handshake");
            }
            continue;
        }

        let incoming = match Packet::decode(datagram) {
            Ok(p) => p,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed command packet");
                continue;
            }
        };

        let now = session::now_unix();
        let dispatch = {
            let mut tables = registry.lock();
            engine::handle_packet(&mut tables, peer, &incoming, now)
        };

        if let Some(ack) = dispatch.ack {
            if let Err(e) = command_socket.send_to(&ack.encode(), peer).await {
                warn!(%peer, error = %e, "failed to send ack");
            }
        }
        if let Some(assign) = dispatch.assign {
            if let Err(e) = command_socket.send_to(&assign.encode(), peer).await {
                warn!(%peer, error = %e, "failed to send assign");
            }
        }
    }
}
