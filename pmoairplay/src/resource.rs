use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::ResourceError;

/// A local file resolved at request time. Never cached: the file may change
/// between two requests.
#[derive(Clone, Debug)]
pub struct Resource {
    pub path: PathBuf,
    pub length: u64,
    pub modified: SystemTime,
}

impl Resource {
    /// Stat and open `path` for reading.
    ///
    /// The returned handle is owned by the caller and released when dropped.
    pub fn open(path: &Path) -> Result<(Resource, File), ResourceError> {
        let display = || path.display().to_string();

        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound(display()),
            _ => ResourceError::Unreadable(display()),
        })?;
        if !metadata.is_file() {
            return Err(ResourceError::Unreadable(display()));
        }

        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound(display()),
            _ => ResourceError::Unreadable(display()),
        })?;

        let resource = Resource {
            path: path.to_path_buf(),
            length: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        };
        Ok((resource, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Status;
    use std::io::Write;

    #[test]
    fn test_open_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 1000]).unwrap();
        let (resource, _handle) = Resource::open(file.path()).unwrap();
        assert_eq!(resource.length, 1000);
        assert_eq!(resource.path, file.path());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Resource::open(&dir.path().join("missing.mp4")).unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn test_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Resource::open(dir.path()).unwrap_err();
        assert!(matches!(err, ResourceError::Unreadable(_)));
        assert_eq!(err.status(), Status::Forbidden);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_unreadable() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"secret").unwrap();
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o000)).unwrap();

        // privileged users open the file anyway
        if File::open(file.path()).is_ok() {
            return;
        }

        let err = Resource::open(file.path()).unwrap_err();
        assert!(matches!(err, ResourceError::Unreadable(_)));
        assert_eq!(err.status(), Status::Forbidden);
    }
}
