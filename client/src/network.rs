//! UDP session with the campfire server.
//!
//! The session runs on its own thread with a single-threaded tokio runtime,
//! so the render loop never blocks on the socket. The two sides talk over
//! unbounded channels: the render loop pushes [`ClientMessage`]s and drains
//! [`NetworkEvent`]s once per frame.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Change, ClientMessage, Packet, Value, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep, Instant};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// What the session reports back to the render loop
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Joined { player_id: String, state: Value },
    Patch { tick: u64, changes: Vec<Change> },
    Disconnected { reason: String },
}

/// The render loop's end of a running session
pub struct NetworkHandle {
    outgoing: UnboundedSender<ClientMessage>,
    incoming: UnboundedReceiver<NetworkEvent>,
    thread: JoinHandle<()>,
}

impl NetworkHandle {
    /// Starts a session against `server_addr` on a background thread.
    /// `fake_ping_ms` adds artificial round-trip latency.
    pub fn spawn(server_addr: &str, fake_ping_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let (outgoing, outgoing_rx) = unbounded_channel();
        let (events_tx, incoming) = unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        return;
                    }
                };

                runtime.block_on(async move {
                    let socket = match UdpSocket::bind("0.0.0.0:0").await {
                        Ok(socket) => socket,
                        Err(e) => {
                            error!("Failed to bind client socket: {}", e);
                            return;
                        }
                    };
                    if let Err(e) = run_session(socket, server_addr, fake_ping_ms, outgoing_rx, events_tx).await {
                        error!("Network session failed: {}", e);
                    }
                });
            })?;

        Ok(Self {
            outgoing,
            incoming,
            thread,
        })
    }

    /// Queues a message for the server. Returns false once the session ended.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outgoing.send(message).is_ok()
    }

    /// Every event received since the last poll
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }

    /// Leaves the room and waits for the session thread to finish
    pub fn shutdown(self) {
        let Self { outgoing, thread, .. } = self;
        drop(outgoing);
        if thread.join().is_err() {
            error!("Network thread panicked");
        }
    }
}

async fn send_packet(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    if fake_ping_ms > 0 {
        sleep(Duration::from_millis(fake_ping_ms / 2)).await;
    }

    let data = serialize(packet)?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

/// Drives one session: joins, forwards outgoing messages, heartbeats, and
/// turns server packets into [`NetworkEvent`]s. Sends `Leave` and returns
/// when the outgoing channel closes.
pub async fn run_session(
    socket: UdpSocket,
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    mut outgoing: UnboundedReceiver<ClientMessage>,
    events: UnboundedSender<NetworkEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Joining room at {}", server_addr);
    send_packet(
        &socket,
        server_addr,
        fake_ping_ms,
        &Packet::Join {
            client_version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    // Snapshots of a busy room can be far larger than a patch.
    let mut buffer = vec![0u8; 65536];
    let mut joined = false;

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                let len = match result {
                    Ok((len, _)) => len,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        continue;
                    }
                };

                if fake_ping_ms > 0 {
                    sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                }

                let event = match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Joined { player_id, state }) => {
                        info!("Joined as {}", player_id);
                        joined = true;
                        NetworkEvent::Joined { player_id, state }
                    }
                    Ok(Packet::Patch { tick, changes }) => NetworkEvent::Patch { tick, changes },
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected: {}", reason);
                        let _ = events.send(NetworkEvent::Disconnected { reason });
                        return Ok(());
                    }
                    Ok(other) => {
                        warn!("Unexpected packet from server: {:?}", other);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to deserialize packet: {}", e);
                        continue;
                    }
                };

                if events.send(event).is_err() {
                    debug!("Event receiver dropped");
                    break;
                }
            },

            message = outgoing.recv() => match message {
                Some(message) if joined => {
                    send_packet(&socket, server_addr, fake_ping_ms, &Packet::Message(message)).await?;
                }
                Some(message) => debug!("Dropping {} sent before join", message.kind),
                None => break,
            },

            _ = heartbeat.tick() => {
                send_packet(&socket, server_addr, fake_ping_ms, &Packet::Heartbeat).await?;
            },
        }
    }

    info!("Leaving room");
    send_packet(&socket, server_addr, fake_ping_ms, &Packet::Leave).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Vector2, MOVE_CURSOR};

    async fn next_packet(server: &UdpSocket, buffer: &mut [u8]) -> (Packet, SocketAddr) {
        loop {
            let (len, from) = server.recv_from(buffer).await.unwrap();
            match deserialize::<Packet>(&buffer[..len]).unwrap() {
                Packet::Heartbeat => continue,
                packet => return (packet, from),
            }
        }
    }

    async fn reply(server: &UdpSocket, client: SocketAddr, packet: &Packet) {
        server.send_to(&serialize(packet).unwrap(), client).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_joins_forwards_and_leaves() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (outgoing, outgoing_rx) = unbounded_channel();
        let (events_tx, mut events) = unbounded_channel();

        let session = run_session(socket, server_addr, 0, outgoing_rx, events_tx);
        let fake_server = async move {
            let mut buffer = vec![0u8; 65536];

            let (packet, client) = next_packet(&server, &mut buffer).await;
            assert!(matches!(packet, Packet::Join { client_version: PROTOCOL_VERSION }));

            let joined = Packet::Joined {
                player_id: "1_abcdefghi".to_string(),
                state: Value::record([("ready", Value::from(true))]),
            };
            reply(&server, client, &joined).await;
            match events.recv().await {
                Some(NetworkEvent::Joined { player_id, .. }) => assert_eq!(player_id, "1_abcdefghi"),
                other => panic!("Expected Joined, got {:?}", other),
            }

            let patch = Packet::Patch {
                tick: 3,
                changes: vec![Change::set("fireValue", Value::from(10.0))],
            };
            reply(&server, client, &patch).await;
            match events.recv().await {
                Some(NetworkEvent::Patch { tick, changes }) => {
                    assert_eq!(tick, 3);
                    assert_eq!(changes.len(), 1);
                }
                other => panic!("Expected Patch, got {:?}", other),
            }

            assert!(outgoing.send(ClientMessage::move_cursor(Vector2::new(4.0, 2.0))).is_ok());
            match next_packet(&server, &mut buffer).await.0 {
                Packet::Message(message) => assert_eq!(message.kind, MOVE_CURSOR),
                other => panic!("Expected Message, got {:?}", other),
            }

            drop(outgoing);
            assert!(matches!(next_packet(&server, &mut buffer).await.0, Packet::Leave));
        };

        let (result, ()) = tokio::join!(session, fake_server);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_session_ends_on_disconnect() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (_outgoing, outgoing_rx) = unbounded_channel::<ClientMessage>();
        let (events_tx, mut events) = unbounded_channel();

        let session = run_session(socket, server_addr, 0, outgoing_rx, events_tx);
        let fake_server = async move {
            let mut buffer = vec![0u8; 65536];
            let (_, client) = next_packet(&server, &mut buffer).await;
            let reason = "Incompatible client version".to_string();
            reply(&server, client, &Packet::Disconnected { reason }).await;
        };

        let (result, ()) = tokio::join!(session, fake_server);
        assert!(result.is_ok());
        assert!(matches!(events.recv().await, Some(NetworkEvent::Disconnected { .. })));
    }

    #[test]
    fn test_fake_ping_delays_send() {
        tokio_test::block_on(async {
            let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let started = Instant::now();

            tokio_test::assert_ok!(send_packet(&socket, server.local_addr().unwrap(), 40, &Packet::Heartbeat).await);

            assert!(started.elapsed() >= Duration::from_millis(20));
            let mut buffer = [0u8; 64];
            let (len, _) = server.recv_from(&mut buffer).await.unwrap();
            assert!(matches!(deserialize::<Packet>(&buffer[..len]), Ok(Packet::Heartbeat)));
        });
    }

    #[test]
    fn test_spawn_rejects_bad_address() {
        assert!(NetworkHandle::spawn("not an address", 0).is_err());
    }
}
