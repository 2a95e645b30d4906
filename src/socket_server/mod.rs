//! TCP control socket: one JSON request per line, one response per line.

pub mod config;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::{
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast,
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    coordinator::{command::CommandStatus, Coordinator},
    protocol::{
        client_command::ClientCommand, error::ProtocolError, parse_command, serialize_response,
        server_response::ServerResponse,
    },
};
use config::SocketServerConfig;

pub struct SocketServer {
    config: Arc<SocketServerConfig>,
    coordinator: Arc<Coordinator>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl SocketServer {
    pub fn new(config: SocketServerConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("Control socket listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let coordinator = self.coordinator.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let active_connections = Arc::new(AtomicUsize::new(0));

            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, peer)) => {
                                let current_connections = active_connections.load(Ordering::Relaxed);
                                if current_connections >= config.max_connections {
                                    warn!("Maximum connections reached ({}), rejecting {}", current_connections, peer);
                                    continue;
                                }

                                let new_count = active_connections.fetch_add(1, Ordering::Relaxed) + 1;
                                debug!("Client {} connected. Active connections: {}", peer, new_count);

                                let coordinator = coordinator.clone();
                                let config = config.clone();
                                let mut shutdown_rx = shutdown_rx.resubscribe();
                                let active_connections = active_connections.clone();

                                tokio::spawn(async move {
                                    let result = Self::handle_client(stream, peer, coordinator, config, &mut shutdown_rx).await;
                                    if let Err(e) = result {
                                        error!("Client {} handler error: {:#}", peer, e);
                                    }

                                    let remaining = active_connections.fetch_sub(1, Ordering::Relaxed) - 1;
                                    debug!("Client {} disconnected. Active connections: {}", peer, remaining);
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Control socket shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    pub fn shutdown(&self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }
        info!("Control socket shutdown complete");
    }

    async fn handle_client(
        stream: TcpStream,
        peer: SocketAddr,
        coordinator: Arc<Coordinator>,
        config: Arc<SocketServerConfig>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let max_length = config.max_line_length;
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_length));

        loop {
            tokio::select! {
                line_result = framed.next() => {
                    let response = match line_result {
                        Some(Ok(line)) => {
                            debug!("Received from {}: {}", peer, line);
                            Self::process_command(&line, peer.ip(), &coordinator, &config).await
                        }
                        Some(Err(e)) => {
                            let e = ProtocolError::from_codec(e, max_length);
                            if !e.is_recoverable() {
                                return Err(e.into());
                            }
                            warn!("Bad request from {}: {}", peer, e);
                            ServerResponse::error(None, e.to_string())
                        }
                        None => {
                            debug!("Client {} closed the connection", peer);
                            break;
                        }
                    };

                    let response_json = serialize_response(&response)?;
                    if let Err(e) = framed.send(response_json).await {
                        error!("Failed to send response to {}: {}", peer, e);
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Shutdown signal received, closing connection to {}", peer);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Parses, authorizes and runs one request line.
    pub async fn process_command(
        line: &str,
        peer: IpAddr,
        coordinator: &Coordinator,
        config: &SocketServerConfig,
    ) -> ServerResponse {
        if !config.allows(peer) {
            warn!("Command not accepted from {}", peer);
            return ServerResponse::from_status(request_id(line), CommandStatus::InvalidControlIP);
        }

        let command = match parse_command(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Rejected request from {}: {}", peer, e);
                return ServerResponse::error(None, format!("Failed to parse command: {}", e));
            }
        };

        let command_id = command.id().cloned();
        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            command = command.name(),
            peer = %peer
        );

        Self::execute_command(command, command_id, coordinator)
            .instrument(span)
            .await
    }

    async fn execute_command(
        command: ClientCommand,
        id: Option<String>,
        coordinator: &Coordinator,
    ) -> ServerResponse {
        let status = match command {
            ClientCommand::Initialize { .. } => coordinator.initialize().await,
            ClientCommand::Shutdown { .. } => coordinator.shutdown().await,
            ClientCommand::Home { .. } => coordinator.home().await,
            ClientCommand::Offset { ha, dec, .. } => coordinator.offset(ha, dec).await,
            ClientCommand::SlewHadec { ha, dec, .. } => coordinator.slew_hadec(ha, dec).await,
            ClientCommand::TrackBody { body, .. } => coordinator.track_body(&body).await,
            ClientCommand::SetFocus { position, .. } => coordinator.set_focus(position).await,
            ClientCommand::Stop { .. } => coordinator.stop().await,
            ClientCommand::StopFocus { .. } => coordinator.stop_focus().await,
            ClientCommand::SetLight { color, .. } => coordinator.set_light(&color).await,
            ClientCommand::ReportStatus { .. } => {
                let report = coordinator.report_status().await;
                return match serde_json::to_value(&report) {
                    Ok(data) => ServerResponse::success(id, data),
                    Err(e) => {
                        error!("Failed to encode status report: {}", e);
                        ServerResponse::from_status(id, CommandStatus::Failed)
                    }
                };
            }
            ClientCommand::Ping { .. } => {
                return ServerResponse::success(
                    id,
                    json!({
                        "message": "pong",
                        "timestamp": chrono::Utc::now().to_rfc3339()
                    }),
                );
            }
        };
        ServerResponse::from_status(id, status)
    }
}

/// The `id` of a request line that is not otherwise trusted.
fn request_id(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use chrono::DateTime;
    use tokio::net::TcpStream;

    use super::*;
    use crate::{
        coordinator::config::CoordinatorConfig,
        sim::{SimEphemeris, SimMountConfig, SimulatedMount},
    };

    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const REMOTE: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 2, 6, 201));

    fn coordinator() -> Arc<Coordinator> {
        let epoch = DateTime::<chrono::Utc>::UNIX_EPOCH;
        let mount = SimulatedMount::new(SimMountConfig {
            epoch,
            ..SimMountConfig::default()
        });
        Arc::new(Coordinator::new(
            CoordinatorConfig::default(),
            Arc::new(mount),
            Arc::new(SimEphemeris::new(epoch)),
        ))
    }

    #[tokio::test]
    async fn test_rejects_callers_outside_allowlist() {
        let coordinator = coordinator();
        let config = SocketServerConfig::default();

        for line in [
            r#"{"type": "initialize", "id": "1"}"#,
            r#"{"type": "report_status", "id": "1"}"#,
            r#"{"type": "ping", "id": "1"}"#,
        ] {
            let response = SocketServer::process_command(line, REMOTE, &coordinator, &config).await;
            assert_eq!(response.code(), Some("InvalidControlIP"));
        }
        assert!(!coordinator.is_connected());
    }

    #[tokio::test]
    async fn test_rejects_unparseable_lines_from_outside_allowlist() {
        let coordinator = coordinator();
        let config = SocketServerConfig::default();

        let response = SocketServer::process_command("not json", REMOTE, &coordinator, &config).await;
        assert_eq!(response.code(), Some("InvalidControlIP"));

        let line = r#"{"type": "launch", "id": "7"}"#;
        let response = SocketServer::process_command(line, REMOTE, &coordinator, &config).await;
        assert_eq!(response.code(), Some("InvalidControlIP"));
        match response {
            ServerResponse::Error { id, .. } => assert_eq!(id.as_deref(), Some("7")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatches_lifecycle_commands() {
        let coordinator = coordinator();
        let config = SocketServerConfig::default();

        let response = SocketServer::process_command(
            r#"{"type": "initialize", "id": "init"}"#,
            LOCAL,
            &coordinator,
            &config,
        )
        .await;
        assert!(response.is_success());
        assert!(coordinator.is_connected());

        let response = SocketServer::process_command(
            r#"{"type": "initialize"}"#,
            LOCAL,
            &coordinator,
            &config,
        )
        .await;
        assert_eq!(response.code(), Some("NotDisconnected"));

        let response = SocketServer::process_command(
            r#"{"type": "set_light", "color": "zz0000"}"#,
            LOCAL,
            &coordinator,
            &config,
        )
        .await;
        assert_eq!(response.code(), Some("InvalidLightColor"));
    }

    #[tokio::test]
    async fn test_report_status_and_parse_errors() {
        let coordinator = coordinator();
        let config = SocketServerConfig::default();

        let response = SocketServer::process_command(
            r#"{"type": "report_status", "id": "s"}"#,
            LOCAL,
            &coordinator,
            &config,
        )
        .await;
        match response {
            ServerResponse::Success { id, data } => {
                assert_eq!(id.as_deref(), Some("s"));
                assert_eq!(data["status_label"], "OFFLINE");
                assert_eq!(data["axes"].as_array().map(Vec::len), Some(3));
            }
            other => panic!("Expected success, got {:?}", other),
        }

        let response =
            SocketServer::process_command("{not json", LOCAL, &coordinator, &config).await;
        assert!(!response.is_success());
        assert_eq!(response.code(), None);
    }

    #[tokio::test]
    async fn test_serves_requests_over_tcp() {
        let config = SocketServerConfig {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            max_line_length: 256,
            ..SocketServerConfig::default()
        };
        let mut server = SocketServer::new(config, coordinator());
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = Framed::new(stream, LinesCodec::new());

        framed
            .send(r#"{"type": "ping", "id": "p1"}"#.to_string())
            .await
            .unwrap();
        let line = framed.next().await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["id"], "p1");
        assert_eq!(json["data"]["message"], "pong");

        framed
            .send(r#"{"type": "stop"}"#.to_string())
            .await
            .unwrap();
        let line = framed.next().await.unwrap().unwrap();
        assert!(line.contains("NotConnected"));

        framed.send("x".repeat(1024)).await.unwrap();
        let line = framed.next().await.unwrap().unwrap();
        assert!(line.contains("maximum line length"));

        server.shutdown();
    }
}
