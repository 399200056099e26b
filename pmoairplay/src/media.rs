use std::path::Path;

use crate::path_codec;

/// Broad class of a local file, decided from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Unknown,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("mp4") => MediaKind::Video,
            Some("png" | "jpg" | "jpeg") => MediaKind::Image,
            _ => MediaKind::Unknown,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Content type announced when serving `path`.
///
/// Images get their own type; everything else goes down the video
/// streaming path.
pub fn content_type(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "video/mp4",
    }
}

/// URL under which the media server exposes `path` to a receiver.
pub fn media_url(host: &str, port: u16, path: &Path) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    format!("http://{}:{}/{}", host, port, path_codec::encode(path))
}

/// Same as [`media_url`], advertising the address the host would use for
/// outbound traffic.
pub fn local_media_url(port: u16, path: &Path) -> String {
    media_url(&pmoutils::guess_local_ip(), port, path)
}
