//! Minimal HTTP/1.1 building blocks for the media server.

pub mod range;
pub mod request;
pub mod response;

pub use range::{ByteRange, resolve};
pub use request::{Request, read_request};
pub use response::{FileBody, Status, http_date, server_token, write_error, write_file};
