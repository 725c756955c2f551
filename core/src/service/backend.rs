use super::error::ServiceError;
use crate::variant::PropertyBag;

/// Opaque id of an object reference held by a backend (folder, task, running instance)
pub type HandleId = u64;

/// Who and where to connect. Empty values mean the local machine and current user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub server: String,
    pub user: String,
    pub domain: String,
    pub password: String,
}

/// How `register_task` treats an existing task at the same path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
    Create = 0x2,
    Update = 0x4,
    CreateOrUpdate = 0x6,
}

/**
 * The Task Scheduler service as seen by this library.
 *
 * Every object crosses the boundary either as a `HandleId` (a live reference that must be
 * released) or as a `PropertyBag` snapshot. A backend is not expected to be thread safe,
 * `TaskService` serializes all calls on the thread that created the session.
 *
 * Property names follow the Task Scheduler object model:
 *  - folders: `Name`, `Path`
 *  - tasks: `Name`, `Path`, `State`, `Enabled`, `LastRunTime`, `NextRunTime`,
 *    `LastTaskResult`, `NumberOfMissedRuns`, `Definition`
 *  - instances: `InstanceGuid`, `Name`, `Path`, `State`, `CurrentAction`, `EnginePID`
 *  - connection: `TargetServer`, `ConnectedUser`, `ConnectedDomain`, `HighestVersion`
 */
pub trait TaskBackend {
    fn connect(&mut self, credentials: &Credentials) -> Result<(), ServiceError>;
    fn disconnect(&mut self);
    fn connection_properties(&self) -> Result<PropertyBag, ServiceError>;

    /// Open the folder at an absolute path
    fn get_folder(&mut self, path: &str) -> Result<HandleId, ServiceError>;
    fn create_folder(&mut self, parent: HandleId, name: &str) -> Result<HandleId, ServiceError>;
    /// Delete an empty child folder
    fn delete_folder(&mut self, parent: HandleId, name: &str) -> Result<(), ServiceError>;
    fn folder_properties(&self, folder: HandleId) -> Result<PropertyBag, ServiceError>;
    /// Child folders in service enumeration order
    fn sub_folders(&mut self, folder: HandleId) -> Result<Vec<HandleId>, ServiceError>;
    /// Tasks directly inside the folder, hidden tasks included
    fn folder_tasks(&mut self, folder: HandleId) -> Result<Vec<HandleId>, ServiceError>;

    fn register_task(
        &mut self,
        folder: HandleId,
        name: &str,
        definition: &PropertyBag,
        mode: RegistrationMode,
    ) -> Result<HandleId, ServiceError>;
    fn get_task(&mut self, folder: HandleId, name: &str) -> Result<HandleId, ServiceError>;
    fn delete_task(&mut self, folder: HandleId, name: &str) -> Result<(), ServiceError>;
    fn task_properties(&self, task: HandleId) -> Result<PropertyBag, ServiceError>;
    fn set_task_enabled(&mut self, task: HandleId, enabled: bool) -> Result<(), ServiceError>;

    /// Start an instance. Returns immediately with a handle to the instance
    fn run_task(
        &mut self,
        task: HandleId,
        args: &[String],
        flags: i32,
        session_id: i32,
        user: &str,
    ) -> Result<HandleId, ServiceError>;
    /// Live instances of one task
    fn task_instances(&mut self, task: HandleId) -> Result<Vec<HandleId>, ServiceError>;
    /// Live instances of every task
    fn running_tasks(&mut self, include_hidden: bool) -> Result<Vec<HandleId>, ServiceError>;
    fn instance_properties(&self, instance: HandleId) -> Result<PropertyBag, ServiceError>;
    fn refresh_instance(&mut self, instance: HandleId) -> Result<(), ServiceError>;
    /// Request termination. Returns once the request is accepted
    fn stop_instance(&mut self, instance: HandleId) -> Result<(), ServiceError>;
    /// Request termination of every instance of a task
    fn stop_task(&mut self, task: HandleId) -> Result<(), ServiceError>;

    /// Drop a handle. Unknown handles are ignored
    fn release(&mut self, handle: HandleId);
}
