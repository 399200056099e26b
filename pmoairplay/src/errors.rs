use std::io;

use thiserror::Error;

use crate::http::Status;

/// Failures while reading the head of an incoming request.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("request head ended before the terminating empty line")]
    UnterminatedHead,
    #[error("connection closed before a request was sent")]
    ConnectionClosed,
    #[error("I/O error while reading request head: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathCodecError {
    #[error("token is not valid url-safe base64: {0}")]
    InvalidToken(String),
    #[error("decoded token is not a valid path")]
    InvalidPath,
    #[error("decoded path {0} is not absolute")]
    NotAbsolute(String),
}

/// A local file that cannot be served.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file is not readable: {0}")]
    Unreadable(String),
}

impl ResourceError {
    /// Status answered to the client.
    pub fn status(&self) -> Status {
        match self {
            ResourceError::NotFound(_) => Status::NotFound,
            ResourceError::Unreadable(_) => Status::Forbidden,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot bind media server on port {0}: {1}")]
    Bind(u16, io::Error),
    #[error("cannot spawn server thread: {0}")]
    Spawn(io::Error),
    #[error("media server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reasons a command sent to a receiver did not succeed.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("AirPlay service responded HTTP {0}")]
    Status(u16),
    #[error("HTTP request to {0} failed: {1}")]
    Transport(String, String),
    #[error("cannot read {0}: {1}")]
    File(String, io::Error),
    #[error("command worker is not running")]
    WorkerStopped,
}
