use std::fmt;

#[derive(Debug, PartialEq)]
pub enum TaskError {
    ConnectionFailed,
    NotConnected,
    NotFound,
    NotBound,
    ServiceFault,
    Unsupported,
    InvalidPath,
    InvalidDefinition,
    BadConfig,
    LogFile,
}

impl std::error::Error for TaskError {}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::ConnectionFailed => write!(f, "Failed to connect to the Task Scheduler service"),
            TaskError::NotConnected => write!(f, "Not connected to the Task Scheduler service"),
            TaskError::NotFound => write!(f, "Task or folder does not exist"),
            TaskError::NotBound => write!(f, "Handle is released or was never bound"),
            TaskError::ServiceFault => write!(f, "Task Scheduler service returned a fault"),
            TaskError::Unsupported => write!(f, "Unsupported action or trigger type"),
            TaskError::InvalidPath => write!(f, "Invalid task or folder path"),
            TaskError::InvalidDefinition => write!(f, "Task definition is malformed"),
            TaskError::BadConfig => write!(f, "Failed to parse TOML config"),
            TaskError::LogFile => write!(f, "Could not create log file"),
        }
    }
}
