use super::{
    backend::{Credentials, HandleId, TaskBackend},
    error::ServiceError,
    handle::{invoke, Handle, Session, SharedBackend},
};
use crate::{error::TaskError, utils::config::ConnectionToml};
use common::windows::TaskDefinition;
use log::{error, info, warn};
use serde::Serialize;
use std::{cell::RefCell, rc::Rc, thread::sleep, time::Duration};

/// Who the session is connected as
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub server_name: String,
    pub user: String,
    pub domain: String,
    pub major_version: u32,
    pub minor_version: u32,
}

/**
 * An explicit session with the Task Scheduler service.
 *
 * Every folder, task and instance handle is bound to the session that produced it and
 * becomes unbound once the session is disconnected or dropped, even if the caller still holds
 * the backend. The session is not `Send`, all calls stay on the thread that connected
 */
#[derive(Default)]
pub struct TaskService {
    session: Option<Session>,
    info: ConnectionInfo,
}

impl TaskService {
    /// Connect to the service behind `backend`
    pub fn connect<B: TaskBackend + 'static>(
        backend: Rc<RefCell<B>>,
        credentials: &Credentials,
    ) -> Result<TaskService, TaskError> {
        let shared: SharedBackend = backend;
        if let Err(err) = invoke(&shared, "connect", |service| service.connect(credentials)) {
            error!(
                "[taskmaster] Failed to connect to {:?}: {err:?}",
                credentials.server
            );
            return Err(TaskError::ConnectionFailed);
        }

        let props = invoke(&shared, "read connection", |service| {
            service.connection_properties()
        })?;
        let version = props.i32_or("HighestVersion", 0) as u32;
        let info = ConnectionInfo {
            server_name: props.string_or_default("TargetServer"),
            user: props.string_or_default("ConnectedUser"),
            domain: props.string_or_default("ConnectedDomain"),
            major_version: version >> 16,
            minor_version: version & 0xffff,
        };
        info!(
            "[taskmaster] Connected to {} as {}\\{}",
            info.server_name, info.domain, info.user
        );

        Ok(TaskService {
            session: Some(Rc::new(shared)),
            info,
        })
    }

    /// Connect to the local machine as the current user
    pub fn connect_local<B: TaskBackend + 'static>(
        backend: Rc<RefCell<B>>,
    ) -> Result<TaskService, TaskError> {
        TaskService::connect(backend, &Credentials::default())
    }

    /// Connect using a parsed config. Retries up to `attempts` times
    pub fn connect_with<B: TaskBackend + 'static>(
        backend: Rc<RefCell<B>>,
        config: &ConnectionToml,
    ) -> Result<TaskService, TaskError> {
        let credentials = config.credentials();
        let max_attempts = config.attempts.max(1);
        let mut count = 1;

        loop {
            match TaskService::connect(backend.clone(), &credentials) {
                Ok(result) => return Ok(result),
                Err(err) if count >= max_attempts => {
                    error!("[taskmaster] Could not connect after {count} attempts");
                    return Err(err);
                }
                Err(_err) => {
                    warn!("[taskmaster] Connection attempt {count} failed, retrying");
                    sleep(Duration::from_millis(config.pause_ms));
                    count += 1;
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Empty definition with service defaults
    pub fn new_task_definition(&self) -> TaskDefinition {
        TaskDefinition::default()
    }

    /// End the session. Every handle from this session becomes unbound. Safe to call more than once
    pub fn disconnect(&mut self) {
        let backend = match self.session.take() {
            Some(result) => result,
            None => return,
        };

        match backend.try_borrow_mut() {
            Ok(mut service) => service.disconnect(),
            Err(_err) => warn!("[taskmaster] Session busy, could not disconnect cleanly"),
        };
        self.info = ConnectionInfo::default();
        info!("[taskmaster] Disconnected");
    }

    /// Same as `disconnect`
    pub fn release(&mut self) {
        self.disconnect();
    }

    fn shared(&self) -> Result<&Session, TaskError> {
        match &self.session {
            Some(result) => Ok(result),
            None => {
                error!("[taskmaster] Session is released or was never connected");
                Err(TaskError::NotBound)
            }
        }
    }

    /// Run a session level backend call that opens an object
    pub(crate) fn open<F>(&self, what: &str, func: F) -> Result<Handle, TaskError>
    where
        F: FnOnce(&mut dyn TaskBackend) -> Result<HandleId, ServiceError>,
    {
        let backend = self.shared()?;
        let id = invoke(backend, what, func)?;
        Ok(Handle::bind(id, backend))
    }

    /// Like `open` for calls returning a collection
    pub(crate) fn open_many<F>(&self, what: &str, func: F) -> Result<Vec<Handle>, TaskError>
    where
        F: FnOnce(&mut dyn TaskBackend) -> Result<Vec<HandleId>, ServiceError>,
    {
        let backend = self.shared()?;
        let ids = invoke(backend, what, func)?;
        Ok(ids
            .into_iter()
            .map(|id| Handle::bind(id, backend))
            .collect())
    }
}

impl Drop for TaskService {
    fn drop(&mut self) {
        self.disconnect();
    }
}
