//! Scripted OpenFlow switch talking to a controller on loopback

use flowgate::config::{Config, PortConfig, SwitchConfig};
use flowgate::controller::Controller;
use flowgate::protocol::openflow::{FeaturesReply, Header, Message, HEADER_SIZE};
use flowgate::server::Server;
use flowgate::telemetry::MetricsRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Lab gateways with one edge switch: ports 1-2 access VLAN 10, port 3 trunk
pub fn edge_config(dpid: u64, keepalive_secs: u64) -> Config {
    let mut config = Config::default();
    config.controller.listen = "127.0.0.1:0".parse().unwrap();
    config.timers.keepalive_secs = keepalive_secs;
    config.switches = vec![SwitchConfig {
        dpid,
        ports: vec![
            PortConfig::access(1, 10),
            PortConfig::access(2, 10),
            PortConfig::trunk(3),
        ],
    }];
    config
}

/// Controller serving on an ephemeral loopback port
pub struct RunningController {
    pub addr: SocketAddr,
    pub controller: Arc<Controller>,
    task: tokio::task::JoinHandle<()>,
}

impl RunningController {
    pub async fn start(config: &Config) -> Self {
        let controller =
            Arc::new(Controller::new(config, Arc::new(MetricsRegistry::new())).unwrap());
        let server = Server::bind(config.controller.listen, Arc::clone(&controller))
            .await
            .expect("bind");
        let addr = server.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let _ = server.serve().await;
        });

        Self {
            addr,
            controller,
            task,
        }
    }
}

impl Drop for RunningController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct FakeSwitch {
    stream: TcpStream,
    next_xid: u32,
}

impl FakeSwitch {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            stream,
            next_xid: 1000,
        }
    }

    /// Next message from the controller; panics after a timeout
    pub async fn recv(&mut self) -> (Header, Message) {
        timeout(RECV_TIMEOUT, self.read_message())
            .await
            .expect("timed out waiting for the controller")
    }

    async fn read_message(&mut self) -> (Header, Message) {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header).await.expect("read header");
        let length = Header::parse(&header).expect("header").length as usize;

        let mut frame = header.to_vec();
        frame.resize(length, 0);
        self.stream
            .read_exact(&mut frame[HEADER_SIZE..])
            .await
            .expect("read body");
        Message::decode_frame(&frame).expect("decode")
    }

    pub async fn send(&mut self, message: &Message) -> u32 {
        let xid = self.next_xid;
        self.next_xid += 1;
        self.send_with_xid(xid, message).await;
        xid
    }

    pub async fn send_with_xid(&mut self, xid: u32, message: &Message) {
        self.send_raw(&message.encode(xid)).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    /// Hello exchange and features reply; returns the setup messages
    ///
    /// `base_flows` is the number of flows expected after the delete-all.
    pub async fn handshake(&mut self, dpid: u64, base_flows: usize) -> Vec<Message> {
        let (_, hello) = self.recv().await;
        assert_eq!(hello, Message::Hello);
        let (request_header, request) = self.recv().await;
        assert_eq!(request, Message::FeaturesRequest);

        self.send(&Message::Hello).await;
        self.send_with_xid(
            request_header.xid,
            &Message::FeaturesReply(FeaturesReply {
                datapath_id: dpid,
                n_buffers: 0,
                n_tables: 254,
                auxiliary_id: 0,
                capabilities: 0,
            }),
        )
        .await;

        let mut setup = Vec::with_capacity(2 + base_flows);
        for _ in 0..2 + base_flows {
            setup.push(self.recv().await.1);
        }
        setup
    }
}
