use super::{
    registered::{collect_tasks, RegisteredTask, RegisteredTaskCollection},
    running::{collect_instances, RunningTaskCollection},
};
use crate::{
    definition::DefinitionBag,
    error::TaskError,
    folders::paths::{split_task_path, ROOT},
    service::{backend::RegistrationMode, connection::TaskService},
};
use common::windows::TaskDefinition;
use log::info;
use std::collections::VecDeque;

impl TaskService {
    /**
     * Register `definition` at `path`. Missing folders are created.
     *
     * If a task already exists and `overwrite` is false the existing task is returned unchanged
     * with `false`. Otherwise the task is created or replaced and `true` is returned
     */
    pub fn create_task(
        &self,
        path: &str,
        definition: &TaskDefinition,
        overwrite: bool,
    ) -> Result<(RegisteredTask, bool), TaskError> {
        let (folder_path, name) = split_task_path(path)?;
        let bag = definition.to_property_bag()?;
        let folder = self.ensure_folder(&folder_path)?;

        if !overwrite {
            match folder.open("find task", |service, id| service.get_task(id, &name)) {
                Ok(handle) => {
                    info!("[taskmaster] Task {path} already exists, not overwriting");
                    return Ok((RegisteredTask::from_handle(handle)?, false));
                }
                Err(TaskError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        let mode = if overwrite {
            RegistrationMode::CreateOrUpdate
        } else {
            RegistrationMode::Create
        };
        let handle = folder.open("register task", |service, id| {
            service.register_task(id, &name, &bag, mode)
        })?;
        let task = RegisteredTask::from_handle(handle)?;
        info!("[taskmaster] Registered task {}", task.path);
        Ok((task, true))
    }

    /// Replace the definition of the existing task at `path`
    pub fn update_task(
        &self,
        path: &str,
        definition: &TaskDefinition,
    ) -> Result<RegisteredTask, TaskError> {
        let (folder_path, name) = split_task_path(path)?;
        let bag = definition.to_property_bag()?;
        let folder = self.open_folder(&folder_path)?;

        let handle = folder.open("update task", |service, id| {
            service.register_task(id, &name, &bag, RegistrationMode::Update)
        })?;
        RegisteredTask::from_handle(handle)
    }

    pub fn get_registered_task(&self, path: &str) -> Result<RegisteredTask, TaskError> {
        let (folder_path, name) = split_task_path(path)?;
        let folder = self.open_folder(&folder_path)?;
        let handle = folder.open("get task", |service, id| service.get_task(id, &name))?;
        RegisteredTask::from_handle(handle)
    }

    /// Every registered task in every folder, hidden tasks included
    pub fn get_registered_tasks(&self) -> Result<RegisteredTaskCollection, TaskError> {
        let mut tasks = Vec::new();
        let mut pending = VecDeque::from([self.open_folder(ROOT)?]);

        while let Some(folder) = pending.pop_front() {
            let handles =
                folder.open_many("enumerate tasks", |service, id| service.folder_tasks(id))?;
            tasks.extend(collect_tasks(handles)?);
            pending.extend(
                folder.open_many("enumerate folders", |service, id| service.sub_folders(id))?,
            );
        }
        Ok(RegisteredTaskCollection(tasks))
    }

    pub fn delete_task(&self, path: &str) -> Result<(), TaskError> {
        let (folder_path, name) = split_task_path(path)?;
        let folder = self.open_folder(&folder_path)?;
        folder.call("delete task", |service, id| service.delete_task(id, &name))?;
        info!("[taskmaster] Deleted task {path}");
        Ok(())
    }

    /// Live instances of every task, hidden tasks included
    pub fn get_running_tasks(&self) -> Result<RunningTaskCollection, TaskError> {
        let handles = self.open_many("enumerate running tasks", |service| {
            service.running_tasks(true)
        })?;
        collect_instances(handles)
    }
}
