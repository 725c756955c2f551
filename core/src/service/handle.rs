use super::{
    backend::{HandleId, TaskBackend},
    error::{to_task_error, ServiceError},
};
use crate::error::TaskError;
use log::{debug, error, warn};
use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

/// The session's backend. `Rc` keeps every handle on the thread that created the session
pub(crate) type SharedBackend = Rc<RefCell<dyn TaskBackend>>;

/// Liveness token of one session. Only the session holds it strongly, handles hold it weakly
pub(crate) type Session = Rc<SharedBackend>;

/**
 * Scoped ownership of one backend object reference.
 *
 * A handle is released exactly once: either explicitly with `release` or when it is dropped.
 * Default handles and handles whose session is gone are unbound. Using them fails with
 * `TaskError::NotBound` and releasing them does nothing
 */
#[derive(Default)]
pub struct Handle {
    binding: Option<Binding>,
}

struct Binding {
    id: HandleId,
    session: Weak<SharedBackend>,
}

impl Handle {
    pub(crate) fn bind(id: HandleId, session: &Session) -> Handle {
        Handle {
            binding: Some(Binding {
                id,
                session: Rc::downgrade(session),
            }),
        }
    }

    /// Check if the handle still refers to a live session object
    pub fn is_bound(&self) -> bool {
        match &self.binding {
            Some(binding) => binding.session.strong_count() > 0,
            None => false,
        }
    }

    /// Session and id behind the handle
    pub(crate) fn backend(&self) -> Result<(Session, HandleId), TaskError> {
        let binding = match &self.binding {
            Some(result) => result,
            None => return Err(TaskError::NotBound),
        };

        match binding.session.upgrade() {
            Some(session) => Ok((session, binding.id)),
            None => {
                debug!("[taskmaster] Session behind handle {} is gone", binding.id);
                Err(TaskError::NotBound)
            }
        }
    }

    /// Run a backend call against the object this handle refers to
    pub(crate) fn call<T, F>(&self, what: &str, func: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut dyn TaskBackend, HandleId) -> Result<T, ServiceError>,
    {
        let (backend, id) = self.backend()?;
        invoke(&backend, what, |service| func(service, id))
    }

    /// Run a backend call that opens another object and bind the result to the same session
    pub(crate) fn open<F>(&self, what: &str, func: F) -> Result<Handle, TaskError>
    where
        F: FnOnce(&mut dyn TaskBackend, HandleId) -> Result<HandleId, ServiceError>,
    {
        let (backend, id) = self.backend()?;
        let opened = invoke(&backend, what, |service| func(service, id))?;
        Ok(Handle::bind(opened, &backend))
    }

    /// Like `open` for calls returning a collection
    pub(crate) fn open_many<F>(&self, what: &str, func: F) -> Result<Vec<Handle>, TaskError>
    where
        F: FnOnce(&mut dyn TaskBackend, HandleId) -> Result<Vec<HandleId>, ServiceError>,
    {
        let (backend, id) = self.backend()?;
        let opened = invoke(&backend, what, |service| func(service, id))?;
        Ok(opened
            .into_iter()
            .map(|child| Handle::bind(child, &backend))
            .collect())
    }

    /// Release the object reference. Safe to call more than once
    pub fn release(&mut self) {
        let binding = match self.binding.take() {
            Some(result) => result,
            None => return,
        };
        let backend = match binding.session.upgrade() {
            Some(result) => result,
            None => return,
        };

        match backend.try_borrow_mut() {
            Ok(mut service) => service.release(binding.id),
            Err(_err) => warn!(
                "[taskmaster] Session busy, could not release handle {}",
                binding.id
            ),
        };
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(binding) if self.is_bound() => write!(f, "Handle({})", binding.id),
            _ => write!(f, "Handle(unbound)"),
        }
    }
}

/// Run one backend call and map its fault
pub(crate) fn invoke<T, F>(backend: &SharedBackend, what: &str, func: F) -> Result<T, TaskError>
where
    F: FnOnce(&mut dyn TaskBackend) -> Result<T, ServiceError>,
{
    let mut service = match backend.try_borrow_mut() {
        Ok(result) => result,
        Err(err) => {
            error!("[taskmaster] Session is already in use, cannot {what}: {err:?}");
            return Err(TaskError::ServiceFault);
        }
    };
    let result = func(&mut *service);
    drop(service);

    match result {
        Ok(value) => Ok(value),
        Err(ServiceError::NotFound) => {
            debug!("[taskmaster] Could not {what}: not found");
            Err(TaskError::NotFound)
        }
        Err(err) => {
            error!("[taskmaster] Could not {what}: {err}");
            Err(to_task_error(&err))
        }
    }
}
