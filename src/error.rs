use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors surfaced to callers of the session controller.
///
/// Everything below the controller speaks `anyhow`; these are the kinds a
/// user or UI has to react to.
#[derive(Debug, Error)]
pub enum DeepWorkError {
    #[error("confirmation phrase did not match")]
    InvalidConfirmation,

    #[error("break duration must be a positive number of minutes (got {0})")]
    InvalidBreakDuration(f64),

    #[error("permission denied writing {}; run with administrator rights", path.display())]
    OsPermission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to update hosts file {}: {source}", path.display())]
    HostsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{service} failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },
}

impl DeepWorkError {
    /// Classifies an IO failure on the hosts file.
    pub fn from_hosts_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            DeepWorkError::OsPermission { path, source }
        } else {
            DeepWorkError::HostsFile { path, source }
        }
    }

    pub fn external(service: &'static str, err: &anyhow::Error) -> Self {
        DeepWorkError::ExternalService {
            service,
            message: format!("{err:#}"),
        }
    }

    /// Stable machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DeepWorkError::InvalidConfirmation => "INVALID_CONFIRMATION",
            DeepWorkError::InvalidBreakDuration(_) => "INVALID_BREAK_DURATION",
            DeepWorkError::OsPermission { .. } => "OS_PERMISSION",
            DeepWorkError::HostsFile { .. } => "HOSTS_FILE",
            DeepWorkError::ExternalService { .. } => "EXTERNAL_SERVICE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_to_os_permission() {
        let err = DeepWorkError::from_hosts_io(
            PathBuf::from("/etc/hosts"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, DeepWorkError::OsPermission { .. }));
        assert_eq!(err.code(), "OS_PERMISSION");
    }

    #[test]
    fn other_io_errors_map_to_hosts_file() {
        let err = DeepWorkError::from_hosts_io(
            PathBuf::from("/missing/hosts"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, DeepWorkError::HostsFile { .. }));
    }
}
