//! TCP listener and per-connection command loop.
//!
//! Every accepted connection gets its own task. The write half is shared
//! between command replies and the connection's subscriptions: a `SUB`
//! registers the connection itself as a [`Handler`], so once the peer goes
//! away its deliveries fail and the bus evicts it.

use crate::protocol::{data_line, parse_line, read_line, Command, CommandError, Line, MAX_LINE_LENGTH};
use async_trait::async_trait;
use fanout_bus::{Bus, Handler, HandlerError, Message};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Write side of one client connection.
pub struct Connection {
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    open: AtomicBool,
}

impl Connection {
    fn new(peer: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            peer,
            writer: Mutex::new(writer),
            open: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), HandlerError> {
        if !self.is_open() {
            return Err(HandlerError::Disconnected);
        }

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(bytes).await {
            self.close();
            return Err(e.into());
        }
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Handler for Connection {
    async fn deliver(&self, msg: &Message) -> Result<(), HandlerError> {
        let result = self.send(&data_line(msg.data())).await;
        if let Err(e) = &result {
            debug!(peer = %self.peer(), error = %e, "Delivery to connection failed");
        }
        result
    }
}

/// Accepts connections and feeds their commands into a [`Bus`].
pub struct Server {
    listener: TcpListener,
    bus: Arc<Bus>,
    max_line_length: usize,
}

impl Server {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr, bus: Arc<Bus>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            bus,
            max_line_length: MAX_LINE_LENGTH,
        })
    }

    /// Longest command line accepted before replying with an error.
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "Listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let bus = Arc::clone(&self.bus);
                    let max_line = self.max_line_length;
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, peer, bus, max_line).await {
                            debug!(peer = %peer, error = %e, "Connection ended with error");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Listener stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn serve(stream: TcpStream, peer: SocketAddr, bus: Arc<Bus>, max_line: usize) -> io::Result<()> {
    info!(peer = %peer, "Serving");

    let (reader, writer) = stream.into_split();
    let connection = Arc::new(Connection::new(peer, writer));
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    let result = loop {
        let parsed = match read_line(&mut reader, &mut line, max_line).await {
            Ok(Line::Complete) => parse_line(&line),
            Ok(Line::TooLong) => Err(CommandError::LineTooLong(max_line)),
            Ok(Line::Eof) => break Ok(()),
            Err(e) => break Err(e),
        };

        let command = match parsed {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                debug!(peer = %peer, error = %e, "Rejected command");
                if connection.send(e.reply().as_bytes()).await.is_err() {
                    break Ok(());
                }
                continue;
            }
        };

        debug!(peer = %peer, command = command.verb(), "Command");

        match command {
            Command::Pub { channel, payload } => {
                if let Err(e) = bus.publish(&channel, Message::from(payload)).await {
                    warn!(peer = %peer, channel = %channel, error = %e, "Publish refused");
                    let _ = connection.send(format!("ERROR {e}\n").as_bytes()).await;
                }
            }
            Command::Sub { client, channel } => {
                let handler = Arc::clone(&connection) as Arc<dyn Handler>;
                match bus.subscribe(&client, &channel, handler) {
                    Ok(id) => {
                        debug!(peer = %peer, client = %client, channel = %channel, handler_id = %id, "Subscribed");
                    }
                    Err(e) => {
                        warn!(peer = %peer, channel = %channel, error = %e, "Subscribe refused");
                        let _ = connection.send(format!("ERROR {e}\n").as_bytes()).await;
                    }
                }
            }
        }
    };

    // Subscriptions made on this connection now fail and get evicted.
    connection.close();
    info!(peer = %peer, "Connection closed");
    result
}
