/// Vehicle link: connects to the telemetry/command bus and splits it into
/// the two event streams the reactor consumes.
///
/// Framing is one JSON object per line, tagged by `type`:
///   {"type":"heartbeat","system_id":1,"component_id":1,"autopilot":true}
///   {"type":"flight_mode","mode":"hold"}
///   {"type":"led_strip_set","target_component":134,"fill_mode":0,"strip_index":255,"colors":[65280]}
///
/// Connect sequence:
/// - Open `tcp://host:port`
/// - Wait for an autopilot heartbeat within the discovery window (fatal if none)
/// - Start forwarding: flight modes in arrival order, LED commands addressed
///   to our component (or broadcast, component 0)
/// - Send our own heartbeat periodically for the lifetime of the link
///
/// Unparsable lines are skipped, including LED commands missing their
/// addressing or fill mode. EOF ends both streams.

use crate::command::LedStripSet;
use crate::flight_mode::FlightMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, timeout_at};

/// Queue depth per stream. Bursts beyond this wait on the reader.
const STREAM_CAPACITY: usize = 32;

/// Component id that addresses every component.
const BROADCAST_COMPONENT: u8 = 0;

/// Our identity and timing on the link.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub endpoint: String,
    pub system_id: u8,
    pub component_id: u8,
    pub discovery_timeout: Duration,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("unsupported endpoint {0:?} (expected tcp://host:port)")]
    UnsupportedEndpoint(String),
    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no autopilot discovered within {0:?}")]
    NoAutopilot(Duration),
    #[error("link closed during discovery")]
    ClosedDuringDiscovery,
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    Heartbeat {
        system_id: u8,
        component_id: u8,
        #[serde(default)]
        autopilot: bool,
    },
    FlightMode {
        mode: FlightMode,
    },
    LedStripSet(LedStripSet),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "heartbeat")]
struct OutboundHeartbeat {
    system_id: u8,
    component_id: u8,
    autopilot: bool,
}

/// Identity of the autopilot found during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autopilot {
    pub system_id: u8,
    pub component_id: u8,
}

/// A connected link: two event streams plus the tasks feeding them.
pub struct LinkStreams {
    pub autopilot: Autopilot,
    pub flight_modes: mpsc::Receiver<FlightMode>,
    pub led_commands: mpsc::Receiver<LedStripSet>,
    tasks: Vec<JoinHandle<()>>,
}

impl LinkStreams {
    /// Streams fed from an in-process source instead of a socket.
    #[cfg(test)]
    pub fn from_channels(
        autopilot: Autopilot,
        flight_modes: mpsc::Receiver<FlightMode>,
        led_commands: mpsc::Receiver<LedStripSet>,
    ) -> Self {
        Self {
            autopilot,
            flight_modes,
            led_commands,
            tasks: Vec::new(),
        }
    }

    /// Split off the receivers, keeping the close handle.
    pub fn split(self) -> (mpsc::Receiver<FlightMode>, mpsc::Receiver<LedStripSet>, LinkHandle) {
        (self.flight_modes, self.led_commands, LinkHandle { tasks: self.tasks })
    }
}

/// Keeps the link tasks alive; [`LinkHandle::close`] stops them.
pub struct LinkHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl LinkHandle {
    pub async fn close(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Parse `tcp://host:port` into `host:port`.
pub fn parse_endpoint(endpoint: &str) -> Result<&str, LinkError> {
    match endpoint.strip_prefix("tcp://") {
        Some(addr) if addr.rsplit_once(':').is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok()) => Ok(addr),
        _ => Err(LinkError::UnsupportedEndpoint(endpoint.to_string())),
    }
}

/// Connect, discover the autopilot and start forwarding.
pub async fn connect(settings: &LinkSettings) -> Result<LinkStreams, LinkError> {
    let addr = parse_endpoint(&settings.endpoint)?;
    let stream = TcpStream::connect(addr).await.map_err(|source| LinkError::Connect {
        endpoint: settings.endpoint.clone(),
        source,
    })?;
    log::info!("Link connected: {}", settings.endpoint);

    let (read, write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    log::info!("Waiting to discover autopilot...");
    let autopilot = discover(&mut lines, settings.discovery_timeout).await?;
    log::info!(
        "Discovered autopilot (system {}, component {})",
        autopilot.system_id,
        autopilot.component_id
    );

    let (mode_tx, mode_rx) = mpsc::channel(STREAM_CAPACITY);
    let (cmd_tx, cmd_rx) = mpsc::channel(STREAM_CAPACITY);
    let reader = tokio::spawn(forward(lines, settings.component_id, mode_tx, cmd_tx));
    let heartbeat = tokio::spawn(send_heartbeats(
        write,
        OutboundHeartbeat {
            system_id: settings.system_id,
            component_id: settings.component_id,
            autopilot: false,
        },
        settings.heartbeat_interval,
    ));

    Ok(LinkStreams {
        autopilot,
        flight_modes: mode_rx,
        led_commands: cmd_rx,
        tasks: vec![reader, heartbeat],
    })
}

/// Read until an autopilot heartbeat arrives or the window closes.
async fn discover(lines: &mut Lines<BufReader<OwnedReadHalf>>, window: Duration) -> Result<Autopilot, LinkError> {
    let deadline = Instant::now() + window;
    loop {
        let line = match timeout_at(deadline, lines.next_line()).await {
            Err(_) => return Err(LinkError::NoAutopilot(window)),
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return Err(LinkError::ClosedDuringDiscovery),
            Ok(Err(e)) => return Err(LinkError::Io(e)),
        };
        match parse_line(&line) {
            Some(Inbound::Heartbeat {
                system_id,
                component_id,
                autopilot: true,
            }) => {
                return Ok(Autopilot {
                    system_id,
                    component_id,
                });
            }
            Some(Inbound::Heartbeat { system_id, .. }) => {
                log::debug!("Ignoring non-autopilot system {system_id}");
            }
            _ => {}
        }
    }
}

async fn forward(
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    component_id: u8,
    modes: mpsc::Sender<FlightMode>,
    commands: mpsc::Sender<LedStripSet>,
) {
    let mut bad_lines = 0u32;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::warn!("Link closed by peer");
                return;
            }
            Err(e) => {
                log::warn!("Link read failed: {e}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(msg) = parse_line(&line) else {
            bad_lines += 1;
            if bad_lines % 100 == 1 {
                let head: String = line.chars().take(80).collect();
                log::warn!("Unparsable link message ({bad_lines} so far): {head}");
            }
            continue;
        };
        match msg {
            Inbound::FlightMode { mode } => {
                if modes.send(mode).await.is_err() {
                    return;
                }
            }
            Inbound::LedStripSet(cmd) => {
                if cmd.target_component != component_id && cmd.target_component != BROADCAST_COMPONENT {
                    log::debug!("LED command for component {} ignored", cmd.target_component);
                    continue;
                }
                if commands.send(cmd).await.is_err() {
                    return;
                }
            }
            Inbound::Heartbeat { .. } => {}
        }
    }
}

async fn send_heartbeats(mut write: OwnedWriteHalf, heartbeat: OutboundHeartbeat, period: Duration) {
    let mut line = match serde_json::to_string(&heartbeat) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to encode heartbeat: {e}");
            return;
        }
    };
    line.push('\n');
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = write.write_all(line.as_bytes()).await {
            log::debug!("Heartbeat write failed: {e}");
            return;
        }
    }
}

fn parse_line(line: &str) -> Option<Inbound> {
    serde_json::from_str(line).ok()
}
