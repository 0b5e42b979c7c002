//! OpenFlow TCP listener and per-switch connection tasks
//!
//! Each accepted connection gets a reader loop (this task) and a writer task
//! fed through an unbounded channel. After the features reply a keepalive
//! task is started for the switch; a single sweeper task ages the learning
//! tables of every connected switch.

use crate::config::Config;
use crate::controller::{Controller, Switch};
use crate::protocol::openflow::{Header, Message, HEADER_SIZE};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Outbound side of one connection
#[derive(Clone)]
struct Outbox {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    next_xid: Arc<AtomicU32>,
}

impl Outbox {
    fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            tx,
            next_xid: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Queue a controller-initiated message; false once the writer is gone
    fn send(&self, message: &Message) -> bool {
        let xid = self.next_xid.fetch_add(1, Ordering::Relaxed);
        self.reply(xid, message)
    }

    fn reply(&self, xid: u32, message: &Message) -> bool {
        self.tx.send(message.encode(xid)).is_ok()
    }

    fn send_all(&self, messages: &[Message]) -> bool {
        messages.iter().all(|m| self.send(m))
    }
}

pub struct Server {
    listener: TcpListener,
    controller: Arc<Controller>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, controller: Arc<Controller>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            controller,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Accept switches until the listener fails
    pub async fn serve(self) -> Result<()> {
        info!("OpenFlow listener on {}", self.local_addr()?);
        let sweeper = spawn_sweeper(Arc::clone(&self.controller));

        let result = loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => break Err(Error::Io(e)),
            };

            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move {
                handle_connection(stream, peer, controller).await;
            });
        };

        sweeper.abort();
        result
    }
}

/// Build the controller from `config` and serve on its listen address
pub async fn run(config: &Config) -> Result<()> {
    let metrics = Arc::new(MetricsRegistry::new());
    let controller = Arc::new(Controller::new(config, metrics)?);
    let server = Server::bind(config.controller.listen, controller).await?;
    server.serve().await
}

fn spawn_sweeper(controller: Arc<Controller>) -> JoinHandle<()> {
    let period = Duration::from_secs(controller.timers().aging_sweep_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let now = ticker.tick().await;
            controller.sweep(now.into_std());

            for (name, value) in controller.metrics().export() {
                debug!(metric = %name, value, "metrics");
            }
        }
    })
}

fn spawn_keepalive(controller: Arc<Controller>, dpid: u64, outbox: Outbox) -> JoinHandle<()> {
    let period = Duration::from_secs(controller.timers().keepalive_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let frames = match controller.keepalive(dpid) {
                Ok(frames) => frames,
                Err(e) => {
                    debug!("keepalive for switch {} stopped: {}", dpid, e);
                    break;
                }
            };
            if !outbox.send_all(&frames) {
                break;
            }
        }
    })
}

/// Read one complete OpenFlow message; `None` on a clean close
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    }

    let parsed = Header::parse(&header)?;
    let mut frame = vec![0u8; parsed.length as usize];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut frame[HEADER_SIZE..]).await?;
    Ok(Some(frame))
}

/// Connection state once the switch has identified itself
struct Attached {
    switch: Arc<Switch>,
    keepalive: JoinHandle<()>,
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, controller: Arc<Controller>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("{}: set_nodelay failed: {}", peer, e);
    }
    let (mut reader, mut writer) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = writer.write_all(&bytes).await {
                debug!("{}: write failed: {}", peer, e);
                break;
            }
        }
    });

    let outbox = Outbox::new(tx);
    info!("{}: connection accepted", peer);
    outbox.send(&Message::Hello);
    outbox.send(&Message::FeaturesRequest);

    let mut attached: Option<Attached> = None;
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("{}: closed by peer", peer);
                break;
            }
            Err(e) => {
                warn!("{}: connection lost: {}", peer, e);
                break;
            }
        };

        let (header, message) = match Message::decode_frame(&frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("{}: undecodable message: {}", peer, e);
                if let Some(a) = &attached {
                    controller.metrics().record_error(a.switch.dpid());
                }
                continue;
            }
        };

        handle_message(&controller, &outbox, peer, &mut attached, header, message);
    }

    if let Some(a) = attached {
        a.keepalive.abort();
        controller.disconnect(&a.switch);
    }
    drop(outbox);
    if let Err(e) = writer_task.await {
        error!("{}: writer task failed: {}", peer, e);
    }
}

fn handle_message(
    controller: &Arc<Controller>,
    outbox: &Outbox,
    peer: SocketAddr,
    attached: &mut Option<Attached>,
    header: Header,
    message: Message,
) {
    match message {
        Message::Hello => trace!("{}: hello (version {:#04x})", peer, header.version),
        Message::EchoRequest(payload) => {
            outbox.reply(header.xid, &Message::EchoReply(payload));
        }
        Message::EchoReply(_) => {}
        Message::FeaturesReply(features) => {
            let dpid = features.datapath_id;
            if let Some(previous) = attached.take() {
                previous.keepalive.abort();
                controller.disconnect(&previous.switch);
            }

            info!(
                "{}: switch {} ({} buffers, {} tables)",
                peer, dpid, features.n_buffers, features.n_tables
            );
            let (switch, setup) = controller.connect(dpid);
            outbox.send_all(&setup);
            let keepalive = spawn_keepalive(Arc::clone(controller), dpid, outbox.clone());
            *attached = Some(Attached { switch, keepalive });
        }
        Message::PacketIn(packet_in) => {
            let Some(a) = attached.as_ref() else {
                debug!("{}: packet-in before features reply, ignored", peer);
                return;
            };
            let dpid = a.switch.dpid();
            match controller.handle_packet_in(dpid, &packet_in, std::time::Instant::now()) {
                Ok(replies) => {
                    outbox.send_all(&replies);
                }
                Err(e) => {
                    warn!("switch {}: packet-in dropped: {}", dpid, e);
                    controller.metrics().record_error(dpid);
                }
            }
        }
        Message::Error {
            err_type,
            code,
            data,
        } => {
            warn!(
                "{}: switch error type {} code {} ({} bytes of offending message)",
                peer,
                err_type,
                code,
                data.len()
            );
            if let Some(a) = attached.as_ref() {
                controller.metrics().record_error(a.switch.dpid());
            }
        }
        other => trace!("{}: ignoring message type {}", peer, other.msg_type()),
    }
}
