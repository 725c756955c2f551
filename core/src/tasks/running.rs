use crate::{
    error::TaskError,
    service::handle::Handle,
    variant::PropertyBag,
};
use common::windows::TaskState;
use log::{debug, error};
use serde::Serialize;
use std::ops::{Deref, DerefMut};

/// A live instance of a registered task
#[derive(Debug, Default, Serialize)]
pub struct RunningTask {
    #[serde(skip)]
    handle: Handle,
    pub instance_guid: String,
    pub name: String,
    /// Path of the owning task
    pub path: String,
    pub state: TaskState,
    pub current_action: String,
    pub engine_pid: u32,
}

impl RunningTask {
    pub(crate) fn from_handle(handle: Handle) -> Result<RunningTask, TaskError> {
        let mut task = RunningTask {
            handle,
            ..Default::default()
        };
        task.read()?;
        Ok(task)
    }

    fn read(&mut self) -> Result<(), TaskError> {
        let props = self.handle.call("read running task", |service, id| {
            service.instance_properties(id)
        })?;
        self.apply(&props);
        Ok(())
    }

    fn apply(&mut self, props: &PropertyBag) {
        self.instance_guid = props.string_or_default("InstanceGuid");
        self.name = props.string_or_default("Name");
        self.path = props.string_or_default("Path");
        self.state = TaskState::from_value(props.i32_or("State", 0));
        self.current_action = props.string_or_default("CurrentAction");
        self.engine_pid = props.i32_or("EnginePID", 0).max(0) as u32;
    }

    /// Re-read the instance state from the service
    pub fn refresh(&mut self) -> Result<(), TaskError> {
        self.handle
            .call("refresh running task", |service, id| service.refresh_instance(id))?;
        self.read()
    }

    /// Request termination. Returns once the service accepts the request
    pub fn stop(&self) -> Result<(), TaskError> {
        self.handle
            .call("stop running task", |service, id| service.stop_instance(id))?;
        debug!("[taskmaster] Requested stop of {}", self.instance_guid);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    pub fn release(&mut self) {
        self.handle.release();
    }
}

/// Instances returned by an enumeration
#[derive(Debug, Default, Serialize)]
pub struct RunningTaskCollection(pub Vec<RunningTask>);

impl RunningTaskCollection {
    /// Request termination of every instance. Keeps going after a failure and returns the first error
    pub fn stop(&self) -> Result<(), TaskError> {
        let mut first_error = None;
        for task in &self.0 {
            if let Err(err) = task.stop() {
                error!(
                    "[taskmaster] Could not stop instance {}: {err:?}",
                    task.instance_guid
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn release(&mut self) {
        for task in &mut self.0 {
            task.release();
        }
    }
}

impl Deref for RunningTaskCollection {
    type Target = Vec<RunningTask>;

    fn deref(&self) -> &Vec<RunningTask> {
        &self.0
    }
}

impl DerefMut for RunningTaskCollection {
    fn deref_mut(&mut self) -> &mut Vec<RunningTask> {
        &mut self.0
    }
}

/// Read every instance handle. Instances that ended since the enumeration are skipped
pub(crate) fn collect_instances(handles: Vec<Handle>) -> Result<RunningTaskCollection, TaskError> {
    let mut tasks = Vec::new();
    for handle in handles {
        match RunningTask::from_handle(handle) {
            Ok(result) => tasks.push(result),
            Err(TaskError::NotFound) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(RunningTaskCollection(tasks))
}
