use crate::error::TaskError;
use std::fmt;

/// Faults reported by a `TaskBackend`
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    Unreachable,
    AccessDenied,
    NotConnected,
    NotFound,
    AlreadyExists,
    NotEmpty,
    InvalidDefinition,
    InvalidHandle,
    TaskDisabled,
    Fault,
}

impl std::error::Error for ServiceError {}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Unreachable => write!(f, "Task Scheduler service is unreachable"),
            ServiceError::AccessDenied => write!(f, "Access is denied"),
            ServiceError::NotConnected => write!(f, "Session is not connected"),
            ServiceError::NotFound => write!(f, "The system cannot find the file specified"),
            ServiceError::AlreadyExists => write!(f, "Cannot create a file when that file already exists"),
            ServiceError::NotEmpty => write!(f, "The directory is not empty"),
            ServiceError::InvalidDefinition => write!(f, "The task XML is malformed"),
            ServiceError::InvalidHandle => write!(f, "The handle is invalid"),
            ServiceError::TaskDisabled => write!(f, "The task is disabled"),
            ServiceError::Fault => write!(f, "Unspecified service fault"),
        }
    }
}

/// Map a backend fault onto the public error taxonomy
pub(crate) fn to_task_error(err: &ServiceError) -> TaskError {
    match err {
        ServiceError::Unreachable => TaskError::ConnectionFailed,
        ServiceError::NotConnected => TaskError::NotConnected,
        ServiceError::NotFound => TaskError::NotFound,
        ServiceError::InvalidHandle => TaskError::NotBound,
        ServiceError::AccessDenied
        | ServiceError::AlreadyExists
        | ServiceError::NotEmpty
        | ServiceError::InvalidDefinition
        | ServiceError::TaskDisabled
        | ServiceError::Fault => TaskError::ServiceFault,
    }
}
