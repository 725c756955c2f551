use super::paths::{join_path, normalize_path, path_components, split_task_path, ROOT};
use crate::{
    error::TaskError,
    service::{connection::TaskService, handle::Handle},
    tasks::registered::{collect_tasks, RegisteredTask},
};
use log::{error, info};
use serde::Serialize;

/// A folder and everything below it
#[derive(Debug, Default, Serialize)]
pub struct TaskFolder {
    #[serde(skip)]
    handle: Handle,
    pub name: String,
    pub path: String,
    pub sub_folders: Vec<TaskFolder>,
    pub registered_tasks: Vec<RegisteredTask>,
}

impl TaskFolder {
    fn from_handle(handle: Handle) -> Result<TaskFolder, TaskError> {
        let props = handle.call("read folder", |service, id| service.folder_properties(id))?;
        Ok(TaskFolder {
            name: props.string_or_default("Name"),
            path: props.string_or_default("Path"),
            handle,
            ..Default::default()
        })
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_bound()
    }

    /// Release this folder, its tasks and all descendants
    pub fn release(&mut self) {
        self.handle.release();
        for task in &mut self.registered_tasks {
            task.release();
        }
        for folder in &mut self.sub_folders {
            folder.release();
        }
    }
}

/// Read the folder tree below `root`. Each level is fully enumerated before descending
fn read_tree(root: Handle) -> Result<TaskFolder, TaskError> {
    // Parents always precede their children in the arena
    let mut arena: Vec<(TaskFolder, Option<usize>)> = vec![(TaskFolder::from_handle(root)?, None)];
    let mut index = 0;

    while index < arena.len() {
        let tasks = arena[index]
            .0
            .handle
            .open_many("enumerate tasks", |service, id| service.folder_tasks(id))?;
        arena[index].0.registered_tasks = collect_tasks(tasks)?;

        let children = arena[index]
            .0
            .handle
            .open_many("enumerate folders", |service, id| service.sub_folders(id))?;
        for child in children {
            arena.push((TaskFolder::from_handle(child)?, Some(index)));
        }
        index += 1;
    }

    // Children are popped before their parent and in reverse sibling order
    while let Some((mut folder, parent)) = arena.pop() {
        folder.sub_folders.reverse();
        match parent {
            Some(parent) => arena[parent].0.sub_folders.push(folder),
            None => return Ok(folder),
        }
    }
    Ok(TaskFolder::default())
}

impl TaskService {
    /// Open the folder at `path`
    pub(crate) fn open_folder(&self, path: &str) -> Result<Handle, TaskError> {
        let path = normalize_path(path);
        self.open("open folder", |service| service.get_folder(&path))
    }

    /// Open the folder at `path`, creating missing folders along the way
    pub(crate) fn ensure_folder(&self, path: &str) -> Result<Handle, TaskError> {
        let mut current = self.open_folder(ROOT)?;
        let mut current_path = String::from(ROOT);

        for component in path_components(path) {
            let next_path = join_path(&current_path, component);
            current = match self.open_folder(&next_path) {
                Ok(result) => result,
                Err(TaskError::NotFound) => {
                    info!("[taskmaster] Creating folder {next_path}");
                    current.open("create folder", |service, id| {
                        service.create_folder(id, component)
                    })?
                }
                Err(err) => return Err(err),
            };
            current_path = next_path;
        }
        Ok(current)
    }

    /// The whole folder tree starting at the root folder
    pub fn get_task_folders(&self) -> Result<TaskFolder, TaskError> {
        self.get_task_folder(ROOT)
    }

    /// The folder at `path` with all its tasks and descendants.
    /// Use `unwrap_or_default` to fall back to an empty folder
    pub fn get_task_folder(&self, path: &str) -> Result<TaskFolder, TaskError> {
        read_tree(self.open_folder(path)?)
    }

    /// Check if a folder exists. Any failure counts as absent
    pub fn task_folder_exist(&self, path: &str) -> bool {
        self.open_folder(path).is_ok()
    }

    /**
     * Delete the folder at `path`.
     *
     * A folder that still holds tasks or folders is only deleted when `recursive` is set,
     * otherwise `Ok(false)` is returned and nothing changes. Recursive deletes remove the
     * deepest folders first
     */
    pub fn delete_folder(&self, path: &str, recursive: bool) -> Result<bool, TaskError> {
        let path = normalize_path(path);
        if path == ROOT {
            error!("[taskmaster] Refusing to delete the root folder");
            return Err(TaskError::InvalidPath);
        }

        let folder = self.open_folder(&path)?;
        let tasks = folder.open_many("enumerate tasks", |service, id| service.folder_tasks(id))?;
        let children =
            folder.open_many("enumerate folders", |service, id| service.sub_folders(id))?;
        if !recursive && (!tasks.is_empty() || !children.is_empty()) {
            info!("[taskmaster] Folder {path} is not empty, not deleting");
            return Ok(false);
        }
        drop(tasks);
        drop(children);
        drop(folder);

        let mut folders = vec![path.clone()];
        let mut index = 0;
        while index < folders.len() {
            let folder = self.open_folder(&folders[index])?;
            let children =
                folder.open_many("enumerate folders", |service, id| service.sub_folders(id))?;
            for child in children {
                let props =
                    child.call("read folder", |service, id| service.folder_properties(id))?;
                folders.push(props.string_or_default("Path"));
            }
            index += 1;
        }

        for folder_path in folders.iter().rev() {
            let folder = self.open_folder(folder_path)?;
            let tasks =
                folder.open_many("enumerate tasks", |service, id| service.folder_tasks(id))?;
            for task in tasks {
                let name = task
                    .call("read task", |service, id| service.task_properties(id))?
                    .string_or_default("Name");
                folder.call("delete task", |service, id| service.delete_task(id, &name))?;
            }

            let (parent_path, name) = split_task_path(folder_path)?;
            let parent = self.open_folder(&parent_path)?;
            parent.call("delete folder", |service, id| service.delete_folder(id, &name))?;
        }

        info!("[taskmaster] Deleted folder {path}");
        Ok(true)
    }
}
