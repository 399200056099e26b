//! Addressing scheme between the media server and the receiver.
//!
//! A receiver never sees a file-system path: it is given a URL whose path is
//! the unpadded url-safe base64 form of the path's raw bytes.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::errors::PathCodecError;

// Padding is never emitted, but tolerated on input.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode an absolute path into a URL-safe token.
pub fn encode(path: &Path) -> String {
    TOKEN_ENGINE.encode(path_bytes(path))
}

/// Decode a request target (with or without its leading `/`) back into the
/// absolute path it was built from.
pub fn decode(target: &str) -> Result<PathBuf, PathCodecError> {
    let token = target.strip_prefix('/').unwrap_or(target);
    let token = token.split_once('?').map_or(token, |(token, _)| token);

    let bytes = TOKEN_ENGINE
        .decode(token)
        .map_err(|e| PathCodecError::InvalidToken(e.to_string()))?;
    let path = path_from_bytes(bytes)?;

    if !path.is_absolute() {
        return Err(PathCodecError::NotAbsolute(path.display().to_string()));
    }
    Ok(path)
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, PathCodecError> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, PathCodecError> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| PathCodecError::InvalidPath)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for raw in [
            "/media/clip.mp4",
            "/storage/emulated/0/DCIM/Camera/IMG 2015-03-26.jpg",
            "/tmp/été/vidéo (1).mp4",
            "/a?b&c=d/+plus",
        ] {
            let path = Path::new(raw);
            let token = encode(path);
            assert!(!token.contains('='), "token must be unpadded: {}", token);
            assert!(!token.contains('/') && !token.contains('+'));
            assert_eq!(decode(&token).unwrap(), path);
            assert_eq!(decode(&format!("/{}", token)).unwrap(), path);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/media/\xff\xfeclip.mp4"));
        assert_eq!(decode(&encode(path)).unwrap(), path);
    }

    #[test]
    fn test_known_token() {
        assert_eq!(encode(Path::new("/media/clip.mp4")), "L21lZGlhL2NsaXAubXA0");
    }

    #[test]
    fn test_decode_accepts_padding_and_query() {
        // 7 bytes: two padding characters in the canonical padded form
        let token = encode(Path::new("/ab.mp4"));
        assert_eq!(token.len(), 10);
        assert_eq!(decode(&format!("{}==", token)).unwrap(), Path::new("/ab.mp4"));
        assert_eq!(decode(&format!("/{}?t=1", token)).unwrap(), Path::new("/ab.mp4"));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("/not base64!"), Err(PathCodecError::InvalidToken(_))));
        assert!(matches!(
            decode(&encode(Path::new("relative/file.mp4"))),
            Err(PathCodecError::NotAbsolute(_))
        ));
        assert!(decode("/").is_err());
    }
}
