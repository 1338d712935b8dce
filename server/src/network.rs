//! Server network layer: TCP connections and game loop coordination

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::maps::MapPool;
use crate::registry::Seat;
use crate::room::Room;
use log::{debug, error, info, warn};
use shared::{write_frame, ClientMessage, Direction, FrameError, FrameReader, ServerMessage, Vec2};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};

pub type SharedRoom = Arc<Mutex<Room>>;

/// Main server coordinating connections and the game simulation
pub struct Server {
    listener: TcpListener,
    room: SharedRoom,
    running: Arc<AtomicBool>,
    config: ServerConfig,
}

/// Cloneable handle used to stop a running server from another task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ServerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag and pokes the listener so a parked accept
    /// returns immediately instead of waiting out its poll interval.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Shutdown requested");

        let mut target = self.addr;
        if target.ip().is_unspecified() {
            target.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        match timeout(Duration::from_millis(200), TcpStream::connect(target)).await {
            Ok(Ok(_)) => debug!("Woke the accept loop"),
            _ => debug!("Could not wake the accept loop, it will notice on its next poll"),
        }
    }
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_maps(config, MapPool::default()).await
    }

    pub async fn with_maps(config: ServerConfig, pool: MapPool) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let room = Room::new(&config, pool)?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            room: Arc::new(Mutex::new(room)),
            running: Arc::new(AtomicBool::new(true)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> Result<ServerHandle, ServerError> {
        Ok(ServerHandle {
            running: Arc::clone(&self.running),
            addr: self.local_addr()?,
        })
    }

    pub fn room(&self) -> SharedRoom {
        Arc::clone(&self.room)
    }

    /// Runs the accept loop and the tick loop until shutdown is requested.
    pub async fn run(self) -> Result<(), ServerError> {
        let tick_task = tokio::spawn(run_tick_loop(
            Arc::clone(&self.room),
            Arc::clone(&self.running),
            self.config.tick_duration(),
        ));

        info!(
            "Accepting connections (tick rate {} Hz, {} wins per match)",
            self.config.tick_rate, self.config.wins_to_win
        );

        while self.running.load(Ordering::SeqCst) {
            let (stream, addr) = match timeout(self.config.accept_poll, self.listener.accept()).await
            {
                Err(_) => continue,
                Ok(Err(e)) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
                Ok(Ok(accepted)) => accepted,
            };

            if !self.running.load(Ordering::SeqCst) {
                debug!("Dropping connection from {} during shutdown", addr);
                break;
            }

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle for {}: {}", addr, e);
            }

            tokio::spawn(handle_connection(
                stream,
                addr,
                Arc::clone(&self.room),
                Arc::clone(&self.running),
                self.config.read_poll,
            ));
        }

        let released = self.room.lock().await.shutdown();
        if let Err(e) = tick_task.await {
            error!("Tick loop task panicked: {}", e);
        }
        info!("Server stopped, {} clients released", released);
        Ok(())
    }
}

/// Advances the room at the fixed tick rate.
async fn run_tick_loop(room: SharedRoom, running: Arc<AtomicBool>, tick_duration: Duration) {
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;

        let started = Instant::now();
        room.lock().await.tick(started);

        let elapsed = started.elapsed();
        if elapsed > tick_duration {
            warn!("Tick took {:?}, budget is {:?}", elapsed, tick_duration);
        }
    }
    debug!("Tick loop stopped");
}

/// Owns one client connection from handshake to cleanup.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    room: SharedRoom,
    running: Arc<AtomicBool>,
    read_poll: Duration,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    let joined = room.lock().await.join(addr, tx);
    let seat = match joined {
        Ok(seat) => seat,
        Err(e) => {
            warn!("Rejecting {}: {}", addr, e);
            if let Err(e) = write_frame(&mut write_half, &ServerMessage::no_colors_available()).await {
                debug!("Could not send rejection to {}: {}", addr, e);
            }
            let _ = write_half.shutdown().await;
            return;
        }
    };
    info!("Client {} connected as {}", addr, seat.color);

    let writer = tokio::spawn(run_writer(write_half, rx, addr));

    match read_loop(FrameReader::new(read_half), &room, seat, &running, read_poll).await {
        Ok(()) => debug!("Reader for {} finished", seat.color),
        Err(FrameError::ConnectionLost) => info!("Lost connection to {} ({})", addr, seat.color),
        Err(e) => warn!("Closing {} ({}): {}", addr, seat.color, e),
    }

    room.lock().await.leave(seat);
    if let Err(e) = writer.await {
        error!("Writer task for {} panicked: {}", addr, e);
    }
    info!("Client {} ({}) disconnected", addr, seat.color);
}

/// Dispatches client frames until the client leaves, the seat is lost or
/// the server stops.
async fn read_loop(
    mut reader: FrameReader<OwnedReadHalf>,
    room: &SharedRoom,
    seat: Seat,
    running: &AtomicBool,
    read_poll: Duration,
) -> Result<(), FrameError> {
    while running.load(Ordering::SeqCst) {
        let message: ClientMessage = match timeout(read_poll, reader.read_frame()).await {
            Err(_) => {
                if !room.lock().await.is_seated(seat) {
                    debug!("{} was dropped by the room", seat.color);
                    return Ok(());
                }
                continue;
            }
            Ok(result) => result?,
        };

        let mut room = room.lock().await;
        match message {
            ClientMessage::Disconnect => {
                info!("{} asked to disconnect", seat.color);
                room.send_to(seat, ServerMessage::Disconnected);
                return Ok(());
            }
            ClientMessage::Ready => room.mark_ready(seat),
            ClientMessage::Move { direction } => match direction.parse::<Direction>() {
                Ok(direction) => room.post_move(seat, direction),
                Err(e) => warn!("Ignoring MOVE from {}: {}", seat.color, e),
            },
            ClientMessage::Jump { drag_x, drag_y } => {
                room.post_jump(seat, Vec2::new(drag_x, drag_y))
            }
        }
    }
    Ok(())
}

/// Drains a client's outbound queue onto its socket.
///
/// Ends when the room drops the sender or a write fails; either way the
/// receiver is dropped, so later sends from the room fail and the client is
/// removed.
async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    addr: SocketAddr,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            warn!("Failed to write to {}: {}", addr, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Best guess at this host's LAN address, used to derive the room code.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
