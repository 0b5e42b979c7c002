use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("openflow protocol error: {0}")]
    Protocol(String),

    #[error("switch {dpid:#018x} not connected")]
    UnknownSwitch { dpid: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
