//! Process exit codes
//!
//! Scripts can tell a refused name apart from a missing resource or a
//! backend failure without parsing messages.

use bf_core::{BackendError, Error};

/// Exit code reported by `bf`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or an unusable configuration
    UsageError = 2,
    BackendError = 3,
    /// The name resolves outside of the store root
    OutsideRoot = 4,
    NotFound = 5,
    Conflict = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for a failed store operation
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Confinement { .. } => ExitCode::OutsideRoot,
            Error::MissingParent(_) => ExitCode::NotFound,
            Error::IsBucket(_) => ExitCode::Conflict,
            Error::Construction(_) | Error::Io(_) => ExitCode::GeneralError,
            Error::UnknownResourceKind(_) | Error::Config(_) => ExitCode::UsageError,
            Error::Backend(BackendError::NotFound(_)) => ExitCode::NotFound,
            Error::Backend(BackendError::Conflict(_)) => ExitCode::Conflict,
            Error::Backend(_) => ExitCode::BackendError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::ResourceId;

    #[test]
    fn test_error_mapping() {
        let confinement = Error::Confinement {
            name: "../x".into(),
            root: ResourceId::new("/data"),
        };
        assert_eq!(ExitCode::from_error(&confinement), ExitCode::OutsideRoot);
        assert_eq!(
            ExitCode::from_error(&Error::MissingParent("a/b".into())),
            ExitCode::NotFound
        );
        assert_eq!(
            ExitCode::from_error(&Error::Backend(BackendError::Conflict("x".into()))),
            ExitCode::Conflict
        );
        assert_eq!(
            ExitCode::from_error(&Error::Backend(BackendError::Network("timeout".into()))),
            ExitCode::BackendError
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::OutsideRoot.as_i32(), 4);
        assert_eq!(ExitCode::Conflict.as_i32(), 6);
    }
}
