use super::running::{collect_instances, RunningTask, RunningTaskCollection};
use crate::{
    definition::DefinitionBag,
    error::TaskError,
    service::handle::Handle,
    variant::{date_or_zero, PropertyBag},
};
use chrono::{DateTime, Utc};
use common::windows::{TaskDefinition, TaskRunFlags, TaskState};
use log::info;
use serde::Serialize;
use std::ops::{Deref, DerefMut};

/**
 * A task registered with the service.
 *
 * Fields are a snapshot taken when the task was fetched. `refresh` re-reads them.
 * Times the service never reported are the zero time (unix epoch)
 */
#[derive(Debug, Default, Serialize)]
pub struct RegisteredTask {
    #[serde(skip)]
    handle: Handle,
    pub name: String,
    pub path: String,
    pub definition: TaskDefinition,
    pub enabled: bool,
    pub state: TaskState,
    pub missed_runs: u32,
    pub next_run_time: DateTime<Utc>,
    pub last_run_time: DateTime<Utc>,
    pub last_task_result: i32,
}

impl RegisteredTask {
    pub(crate) fn from_handle(handle: Handle) -> Result<RegisteredTask, TaskError> {
        let mut task = RegisteredTask {
            handle,
            ..Default::default()
        };
        task.refresh()?;
        Ok(task)
    }

    fn apply(&mut self, props: &PropertyBag) {
        self.name = props.string_or_default("Name");
        self.path = props.string_or_default("Path");
        self.definition = TaskDefinition::from_property_bag(&props.bag_or_default("Definition"));
        self.enabled = props.bool_or("Enabled", false);
        self.state = TaskState::from_value(props.i32_or("State", 0));
        self.missed_runs = props.i32_or("NumberOfMissedRuns", 0).max(0) as u32;
        self.next_run_time = date_or_zero(props.get("NextRunTime"));
        self.last_run_time = date_or_zero(props.get("LastRunTime"));
        self.last_task_result = props.i32_or("LastTaskResult", 0);
    }

    /// Re-read the task from the service
    pub fn refresh(&mut self) -> Result<(), TaskError> {
        let props = self
            .handle
            .call("read task", |service, id| service.task_properties(id))?;
        self.apply(&props);
        Ok(())
    }

    /// Start the task. A non-empty `arg` replaces `$(Arg0)` in the action arguments
    pub fn run(&self, arg: &str) -> Result<RunningTask, TaskError> {
        let args = if arg.is_empty() {
            Vec::new()
        } else {
            vec![arg.to_string()]
        };
        self.run_ex(&args, TaskRunFlags::NO_FLAGS, 0, "")
    }

    /// Start the task with positional arguments `$(Arg0)` .. `$(Arg31)`
    pub fn run_ex(
        &self,
        args: &[String],
        flags: TaskRunFlags,
        session_id: i32,
        user: &str,
    ) -> Result<RunningTask, TaskError> {
        let handle = self.handle.open("run task", |service, id| {
            service.run_task(id, args, flags.bits(), session_id, user)
        })?;
        let instance = RunningTask::from_handle(handle)?;
        info!(
            "[taskmaster] Started {} as instance {}",
            self.path, instance.instance_guid
        );
        Ok(instance)
    }

    /// Live instances of this task
    pub fn get_instances(&self) -> Result<RunningTaskCollection, TaskError> {
        let handles = self
            .handle
            .open_many("enumerate task instances", |service, id| {
                service.task_instances(id)
            })?;
        collect_instances(handles)
    }

    /// Request termination of every instance of this task
    pub fn stop(&self) -> Result<(), TaskError> {
        self.handle
            .call("stop task", |service, id| service.stop_task(id))
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), TaskError> {
        self.handle.call("enable task", |service, id| {
            service.set_task_enabled(id, enabled)
        })?;
        self.refresh()
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    pub fn release(&mut self) {
        self.handle.release();
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RegisteredTaskCollection(pub Vec<RegisteredTask>);

impl RegisteredTaskCollection {
    pub fn release(&mut self) {
        for task in &mut self.0 {
            task.release();
        }
    }
}

impl Deref for RegisteredTaskCollection {
    type Target = Vec<RegisteredTask>;

    fn deref(&self) -> &Vec<RegisteredTask> {
        &self.0
    }
}

impl DerefMut for RegisteredTaskCollection {
    fn deref_mut(&mut self) -> &mut Vec<RegisteredTask> {
        &mut self.0
    }
}

/// Read every task handle. Tasks deleted since the enumeration are skipped
pub(crate) fn collect_tasks(handles: Vec<Handle>) -> Result<Vec<RegisteredTask>, TaskError> {
    let mut tasks = Vec::new();
    for handle in handles {
        match RegisteredTask::from_handle(handle) {
            Ok(result) => tasks.push(result),
            Err(TaskError::NotFound) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(tasks)
}
