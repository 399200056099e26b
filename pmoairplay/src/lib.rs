//! # pmoairplay
//!
//! Streams local media files to an AirPlay-style receiver and drives it.
//!
//! - [`MediaHttpServer`] serves files, with byte-range support, under URLs
//!   built by [`path_codec`] / [`media::media_url`].
//! - [`DeviceCommandClient`] tells a receiver to show an image, play such a
//!   URL, or stop, and reports each [`Outcome`] through an [`OutcomeSink`].
//!
//! ```no_run
//! use std::path::Path;
//! use pmoairplay::{ClientConfig, DeviceCommandClient, DeviceTarget, MediaHttpServer, ServerConfig};
//!
//! let server = MediaHttpServer::start(ServerConfig::default())?;
//! let (client, outcomes) = DeviceCommandClient::with_channel(ClientConfig::default())?;
//! let target = DeviceTarget::new("http://192.168.1.20:7000");
//!
//! let url = pmoairplay::media::local_media_url(server.port(), Path::new("/media/clip.mp4"));
//! client.play_video(url, &target)?;
//! println!("{:?}", outcomes.recv()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod errors;
pub mod http;
pub mod media;
pub mod model;
pub mod path_codec;
pub mod resource;
pub mod server;

pub use client::{ClientConfig, DeviceCommandClient, OutcomeSink};
pub use errors::{CommandError, PathCodecError, RequestError, ResourceError, ServerError};
pub use media::MediaKind;
pub use model::{Command, DeviceTarget, Outcome, Transition};
pub use resource::Resource;
pub use server::{MediaHttpServer, ServerConfig};
