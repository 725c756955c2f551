use super::{
    backend::{Credentials, HandleId, RegistrationMode, TaskBackend},
    error::ServiceError,
};
use crate::{
    definition::actions::{
        substitute_arguments, ACTION_COM_HANDLER, ACTION_EXEC, ACTION_SEND_EMAIL,
        ACTION_SHOW_MESSAGE,
    },
    folders::paths::{join_path, normalize_path, path_key, ROOT},
    variant::{dates::utc_to_ole_automationtime, PropertyBag, Variant},
};
use chrono::Utc;
use common::windows::{MultipleInstancesPolicy, TaskState};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// `LastTaskResult` of a task that never ran
const TASK_HAS_NOT_RUN: i32 = 0x41303;
/// First fake engine process id handed out
const FIRST_ENGINE_PID: i32 = 4000;
/// Launched command lines kept for inspection
const LAUNCH_HISTORY: usize = 256;

/**
 * Task Scheduler engine kept entirely in memory.
 *
 * Behaves like the service for everything this library observes: case-insensitive paths,
 * insertion ordered enumeration, registration modes, multiple instance policies and the
 * handle table. Actions are never executed. Exec command lines are recorded instead and can
 * be inspected with `launched_commands`
 */
pub struct MemoryBackend {
    reachable: bool,
    connected: bool,
    credentials: Credentials,
    folders: HashMap<String, FolderEntry>,
    tasks: HashMap<String, TaskEntry>,
    instances: Vec<InstanceEntry>,
    launched: Vec<String>,
    handles: HashMap<HandleId, Target>,
    next_handle: HandleId,
    next_pid: i32,
    denied: BTreeSet<String>,
    refused_connects: u32,
}

struct FolderEntry {
    name: String,
    path: String,
    /// Child folder keys in creation order
    folders: Vec<String>,
    /// Task keys in registration order
    tasks: Vec<String>,
}

struct TaskEntry {
    name: String,
    path: String,
    definition: PropertyBag,
    enabled: bool,
    last_run: Option<f64>,
    last_result: i32,
}

struct InstanceEntry {
    guid: String,
    task: String,
    name: String,
    path: String,
    state: TaskState,
    current_action: String,
    pid: i32,
}

#[derive(Clone)]
enum Target {
    Folder(String),
    Task(String),
    Instance(String),
}

impl Default for MemoryBackend {
    fn default() -> MemoryBackend {
        MemoryBackend::new()
    }
}

impl MemoryBackend {
    /// Engine holding only the root folder
    pub fn new() -> MemoryBackend {
        let mut folders = HashMap::new();
        folders.insert(
            path_key(ROOT),
            FolderEntry {
                name: String::from(ROOT),
                path: String::from(ROOT),
                folders: Vec::new(),
                tasks: Vec::new(),
            },
        );

        MemoryBackend {
            reachable: true,
            connected: false,
            credentials: Credentials::default(),
            folders,
            tasks: HashMap::new(),
            instances: Vec::new(),
            launched: Vec::new(),
            handles: HashMap::new(),
            next_handle: 1,
            next_pid: FIRST_ENGINE_PID,
            denied: BTreeSet::new(),
            refused_connects: 0,
        }
    }

    /// Engine that refuses every connection attempt
    pub fn unreachable() -> MemoryBackend {
        let mut backend = MemoryBackend::new();
        backend.reachable = false;
        backend
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_connects(&mut self, count: u32) {
        self.refused_connects = count;
    }

    /// Deny deleting the task or folder at `path`
    pub fn deny_delete(&mut self, path: &str) {
        self.denied.insert(path_key(path));
    }

    /// Command lines of the most recent Exec actions launched, in launch order
    pub fn launched_commands(&self) -> Vec<String> {
        self.launched.clone()
    }

    /// Number of handles not yet released
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn ensure_connected(&self) -> Result<(), ServiceError> {
        if self.connected {
            return Ok(());
        }
        Err(ServiceError::NotConnected)
    }

    fn open(&mut self, target: Target) -> HandleId {
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(id, target);
        id
    }

    fn target(&self, handle: HandleId) -> Result<&Target, ServiceError> {
        self.ensure_connected()?;
        match self.handles.get(&handle) {
            Some(result) => Ok(result),
            None => Err(ServiceError::InvalidHandle),
        }
    }

    fn folder_key(&self, handle: HandleId) -> Result<String, ServiceError> {
        let key = match self.target(handle)? {
            Target::Folder(key) => key.clone(),
            _ => return Err(ServiceError::InvalidHandle),
        };
        if !self.folders.contains_key(&key) {
            return Err(ServiceError::NotFound);
        }
        Ok(key)
    }

    fn task_key(&self, handle: HandleId) -> Result<String, ServiceError> {
        let key = match self.target(handle)? {
            Target::Task(key) => key.clone(),
            _ => return Err(ServiceError::InvalidHandle),
        };
        if !self.tasks.contains_key(&key) {
            return Err(ServiceError::NotFound);
        }
        Ok(key)
    }

    fn instance_index(&self, handle: HandleId) -> Result<Option<usize>, ServiceError> {
        let guid = match self.target(handle)? {
            Target::Instance(guid) => guid,
            _ => return Err(ServiceError::InvalidHandle),
        };
        Ok(self
            .instances
            .iter()
            .position(|instance| &instance.guid == guid))
    }

    fn folder_path(&self, key: &str) -> String {
        match self.folders.get(key) {
            Some(folder) => folder.path.clone(),
            None => String::from(ROOT),
        }
    }

    fn live_instances(&self, task: &str) -> Vec<usize> {
        let mut live = Vec::new();
        for (index, instance) in self.instances.iter().enumerate() {
            if instance.task == task && is_live(instance.state) {
                live.push(index);
            }
        }
        live
    }

    fn end_instance(&mut self, index: usize) {
        let task = match self.instances.get_mut(index) {
            Some(instance) if is_live(instance.state) => {
                instance.state = TaskState::Unknown;
                instance.task.clone()
            }
            _ => return,
        };

        // Oldest queued instance takes the freed slot
        if !self
            .live_instances(&task)
            .iter()
            .any(|live| self.instances[*live].state == TaskState::Running)
        {
            if let Some(next) = self
                .instances
                .iter_mut()
                .find(|instance| instance.task == task && instance.state == TaskState::Queued)
            {
                next.state = TaskState::Running;
            }
        }
    }

    /// Forget finished instances no handle refers to anymore
    fn prune_instances(&mut self) {
        let referenced: BTreeSet<&String> = self
            .handles
            .values()
            .filter_map(|target| match target {
                Target::Instance(guid) => Some(guid),
                _ => None,
            })
            .collect();
        self.instances
            .retain(|instance| is_live(instance.state) || referenced.contains(&instance.guid));
    }

    fn start_instance(&mut self, task: &str, args: &[String], state: TaskState) -> String {
        self.prune_instances();
        let (name, path, actions) = match self.tasks.get_mut(task) {
            Some(entry) => {
                entry.last_run = Some(utc_to_ole_automationtime(&Utc::now()));
                entry.last_result = 0;
                (
                    entry.name.clone(),
                    entry.path.clone(),
                    entry.definition.array_or_default("Actions"),
                )
            }
            None => (String::new(), String::new(), Vec::new()),
        };

        let mut current_action = String::new();
        for action in &actions {
            let Variant::Bag(action) = action else {
                continue;
            };
            if current_action.is_empty() {
                current_action = action.string_or_default("Id");
            }
            if action.i32_or("Type", -1) != ACTION_EXEC {
                continue;
            }
            let command = format!(
                "{} {}",
                action.string_or_default("Path"),
                substitute_arguments(&action.string_or_default("Arguments"), args)
            );
            self.launched.push(command.trim().to_string());
        }
        if self.launched.len() > LAUNCH_HISTORY {
            let extra = self.launched.len() - LAUNCH_HISTORY;
            self.launched.drain(..extra);
        }

        let guid = format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase());
        let pid = self.next_pid;
        self.next_pid += 4;
        debug!("[taskmaster] Started instance {guid} of {path}");

        self.instances.push(InstanceEntry {
            guid: guid.clone(),
            task: task.to_string(),
            name,
            path,
            state,
            current_action,
            pid,
        });
        guid
    }

    fn task_state(&self, key: &str, entry: &TaskEntry) -> TaskState {
        if !entry.enabled {
            return TaskState::Disabled;
        }
        let live = self.live_instances(key);
        if live
            .iter()
            .any(|index| self.instances[*index].state == TaskState::Running)
        {
            return TaskState::Running;
        }
        if !live.is_empty() {
            return TaskState::Queued;
        }
        TaskState::Ready
    }

    fn is_hidden(&self, task: &str) -> bool {
        match self.tasks.get(task) {
            Some(entry) => entry
                .definition
                .bag_or_default("Settings")
                .bool_or("Hidden", false),
            None => false,
        }
    }
}

fn is_live(state: TaskState) -> bool {
    state == TaskState::Running || state == TaskState::Queued
}

/// Registration keeps only definitions with at least one supported action
fn validate_definition(definition: &PropertyBag) -> Result<(), ServiceError> {
    let actions = definition.array_or_default("Actions");
    if actions.is_empty() {
        warn!("[taskmaster] Definition has no actions");
        return Err(ServiceError::InvalidDefinition);
    }

    for action in actions {
        let kind = match action {
            Variant::Bag(action) => action.i32_or("Type", -1),
            _ => -1,
        };
        let supported = [
            ACTION_EXEC,
            ACTION_COM_HANDLER,
            ACTION_SEND_EMAIL,
            ACTION_SHOW_MESSAGE,
        ];
        if !supported.contains(&kind) {
            warn!("[taskmaster] Definition has unsupported action type {kind}");
            return Err(ServiceError::InvalidDefinition);
        }
    }
    Ok(())
}

impl TaskBackend for MemoryBackend {
    fn connect(&mut self, credentials: &Credentials) -> Result<(), ServiceError> {
        if !self.reachable {
            return Err(ServiceError::Unreachable);
        }
        if self.refused_connects > 0 {
            self.refused_connects -= 1;
            return Err(ServiceError::Unreachable);
        }
        if !credentials.user.is_empty() && credentials.password.is_empty() {
            return Err(ServiceError::AccessDenied);
        }

        self.credentials = credentials.clone();
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.handles.clear();
        self.prune_instances();
    }

    fn connection_properties(&self) -> Result<PropertyBag, ServiceError> {
        self.ensure_connected()?;
        let mut bag = PropertyBag::new();
        let server = if self.credentials.server.is_empty() {
            "localhost"
        } else {
            self.credentials.server.as_str()
        };
        let user = if self.credentials.user.is_empty() {
            "SYSTEM"
        } else {
            self.credentials.user.as_str()
        };
        let domain = if self.credentials.domain.is_empty() {
            "WORKGROUP"
        } else {
            self.credentials.domain.as_str()
        };
        bag.set("TargetServer", server);
        bag.set("ConnectedUser", user);
        bag.set("ConnectedDomain", domain);
        // Task Scheduler 2.4
        bag.set("HighestVersion", (1 << 16) | 6);
        Ok(bag)
    }

    fn get_folder(&mut self, path: &str) -> Result<HandleId, ServiceError> {
        self.ensure_connected()?;
        let key = path_key(path);
        if !self.folders.contains_key(&key) {
            return Err(ServiceError::NotFound);
        }
        Ok(self.open(Target::Folder(key)))
    }

    fn create_folder(&mut self, parent: HandleId, name: &str) -> Result<HandleId, ServiceError> {
        let parent_key = self.folder_key(parent)?;
        let path = normalize_path(&join_path(&self.folder_path(&parent_key), name));
        let key = path_key(&path);
        if self.folders.contains_key(&key) {
            return Err(ServiceError::AlreadyExists);
        }

        self.folders.insert(
            key.clone(),
            FolderEntry {
                name: name.to_string(),
                path,
                folders: Vec::new(),
                tasks: Vec::new(),
            },
        );
        if let Some(folder) = self.folders.get_mut(&parent_key) {
            folder.folders.push(key.clone());
        }
        Ok(self.open(Target::Folder(key)))
    }

    fn delete_folder(&mut self, parent: HandleId, name: &str) -> Result<(), ServiceError> {
        let parent_key = self.folder_key(parent)?;
        let key = path_key(&join_path(&self.folder_path(&parent_key), name));
        let folder = match self.folders.get(&key) {
            Some(result) => result,
            None => return Err(ServiceError::NotFound),
        };
        if self.denied.contains(&key) {
            return Err(ServiceError::AccessDenied);
        }
        if !folder.folders.is_empty() || !folder.tasks.is_empty() {
            return Err(ServiceError::NotEmpty);
        }

        self.folders.remove(&key);
        if let Some(folder) = self.folders.get_mut(&parent_key) {
            folder.folders.retain(|child| child != &key);
        }
        Ok(())
    }

    fn folder_properties(&self, folder: HandleId) -> Result<PropertyBag, ServiceError> {
        let key = self.folder_key(folder)?;
        let mut bag = PropertyBag::new();
        if let Some(entry) = self.folders.get(&key) {
            bag.set("Name", entry.name.as_str());
            bag.set("Path", entry.path.as_str());
        }
        Ok(bag)
    }

    fn sub_folders(&mut self, folder: HandleId) -> Result<Vec<HandleId>, ServiceError> {
        let key = self.folder_key(folder)?;
        let children = match self.folders.get(&key) {
            Some(entry) => entry.folders.clone(),
            None => Vec::new(),
        };
        Ok(children
            .into_iter()
            .map(|child| self.open(Target::Folder(child)))
            .collect())
    }

    fn folder_tasks(&mut self, folder: HandleId) -> Result<Vec<HandleId>, ServiceError> {
        let key = self.folder_key(folder)?;
        let tasks = match self.folders.get(&key) {
            Some(entry) => entry.tasks.clone(),
            None => Vec::new(),
        };
        Ok(tasks
            .into_iter()
            .map(|task| self.open(Target::Task(task)))
            .collect())
    }

    fn register_task(
        &mut self,
        folder: HandleId,
        name: &str,
        definition: &PropertyBag,
        mode: RegistrationMode,
    ) -> Result<HandleId, ServiceError> {
        let folder_key = self.folder_key(folder)?;
        validate_definition(definition)?;

        let path = join_path(&self.folder_path(&folder_key), name);
        let key = path_key(&path);
        let exists = self.tasks.contains_key(&key);
        if exists && mode == RegistrationMode::Create {
            return Err(ServiceError::AlreadyExists);
        }
        if !exists && mode == RegistrationMode::Update {
            return Err(ServiceError::NotFound);
        }

        let mut stored = definition.clone();
        let mut info = stored.bag_or_default("RegistrationInfo");
        info.set("URI", path.as_str());
        stored.set("RegistrationInfo", info);
        let enabled = stored.bag_or_default("Settings").bool_or("Enabled", true);

        match self.tasks.get_mut(&key) {
            Some(entry) => {
                entry.definition = stored;
                entry.enabled = enabled;
            }
            None => {
                self.tasks.insert(
                    key.clone(),
                    TaskEntry {
                        name: name.to_string(),
                        path,
                        definition: stored,
                        enabled,
                        last_run: None,
                        last_result: TASK_HAS_NOT_RUN,
                    },
                );
                if let Some(entry) = self.folders.get_mut(&folder_key) {
                    entry.tasks.push(key.clone());
                }
            }
        }
        Ok(self.open(Target::Task(key)))
    }

    fn get_task(&mut self, folder: HandleId, name: &str) -> Result<HandleId, ServiceError> {
        let folder_key = self.folder_key(folder)?;
        let key = path_key(&join_path(&self.folder_path(&folder_key), name));
        if !self.tasks.contains_key(&key) {
            return Err(ServiceError::NotFound);
        }
        Ok(self.open(Target::Task(key)))
    }

    fn delete_task(&mut self, folder: HandleId, name: &str) -> Result<(), ServiceError> {
        let folder_key = self.folder_key(folder)?;
        let key = path_key(&join_path(&self.folder_path(&folder_key), name));
        if !self.tasks.contains_key(&key) {
            return Err(ServiceError::NotFound);
        }
        if self.denied.contains(&key) {
            return Err(ServiceError::AccessDenied);
        }

        for index in self.live_instances(&key) {
            self.end_instance(index);
        }
        self.tasks.remove(&key);
        if let Some(entry) = self.folders.get_mut(&folder_key) {
            entry.tasks.retain(|task| task != &key);
        }
        self.prune_instances();
        Ok(())
    }

    fn task_properties(&self, task: HandleId) -> Result<PropertyBag, ServiceError> {
        let key = self.task_key(task)?;
        let entry = match self.tasks.get(&key) {
            Some(result) => result,
            None => return Err(ServiceError::NotFound),
        };

        let mut bag = PropertyBag::new();
        bag.set("Name", entry.name.as_str());
        bag.set("Path", entry.path.as_str());
        bag.set("State", self.task_state(&key, entry).value());
        bag.set("Enabled", entry.enabled);
        if let Some(last_run) = entry.last_run {
            bag.set("LastRunTime", Variant::Date(last_run));
        }
        bag.set("LastTaskResult", entry.last_result);
        bag.set("NumberOfMissedRuns", 0);
        bag.set("Definition", entry.definition.clone());
        Ok(bag)
    }

    fn set_task_enabled(&mut self, task: HandleId, enabled: bool) -> Result<(), ServiceError> {
        let key = self.task_key(task)?;
        if let Some(entry) = self.tasks.get_mut(&key) {
            entry.enabled = enabled;
            let mut settings = entry.definition.bag_or_default("Settings");
            settings.set("Enabled", enabled);
            entry.definition.set("Settings", settings);
        }
        Ok(())
    }

    fn run_task(
        &mut self,
        task: HandleId,
        args: &[String],
        _flags: i32,
        _session_id: i32,
        _user: &str,
    ) -> Result<HandleId, ServiceError> {
        let key = self.task_key(task)?;
        let (enabled, settings) = match self.tasks.get(&key) {
            Some(entry) => (entry.enabled, entry.definition.bag_or_default("Settings")),
            None => return Err(ServiceError::NotFound),
        };
        if !enabled {
            return Err(ServiceError::TaskDisabled);
        }
        if !settings.bool_or("AllowDemandStart", true) {
            return Err(ServiceError::AccessDenied);
        }

        let policy = MultipleInstancesPolicy::from_value(settings.i32_or(
            "MultipleInstances",
            MultipleInstancesPolicy::default().value(),
        ));
        let live = self.live_instances(&key);

        let guid = match policy {
            MultipleInstancesPolicy::Parallel => {
                self.start_instance(&key, args, TaskState::Running)
            }
            MultipleInstancesPolicy::Queue if !live.is_empty() => {
                self.start_instance(&key, args, TaskState::Queued)
            }
            MultipleInstancesPolicy::IgnoreNew if !live.is_empty() => {
                self.instances[live[0]].guid.clone()
            }
            MultipleInstancesPolicy::StopExisting => {
                for index in live {
                    self.end_instance(index);
                }
                self.start_instance(&key, args, TaskState::Running)
            }
            _ => self.start_instance(&key, args, TaskState::Running),
        };
        Ok(self.open(Target::Instance(guid)))
    }

    fn task_instances(&mut self, task: HandleId) -> Result<Vec<HandleId>, ServiceError> {
        let key = self.task_key(task)?;
        let guids: Vec<String> = self
            .live_instances(&key)
            .into_iter()
            .map(|index| self.instances[index].guid.clone())
            .collect();
        Ok(guids
            .into_iter()
            .map(|guid| self.open(Target::Instance(guid)))
            .collect())
    }

    fn running_tasks(&mut self, include_hidden: bool) -> Result<Vec<HandleId>, ServiceError> {
        self.ensure_connected()?;
        let mut guids = Vec::new();
        for instance in &self.instances {
            if !is_live(instance.state) {
                continue;
            }
            if !include_hidden && self.is_hidden(&instance.task) {
                continue;
            }
            guids.push(instance.guid.clone());
        }
        Ok(guids
            .into_iter()
            .map(|guid| self.open(Target::Instance(guid)))
            .collect())
    }

    fn instance_properties(&self, instance: HandleId) -> Result<PropertyBag, ServiceError> {
        let index = match self.instance_index(instance)? {
            Some(result) => result,
            None => return Err(ServiceError::NotFound),
        };
        let entry = &self.instances[index];

        let mut bag = PropertyBag::new();
        bag.set("InstanceGuid", entry.guid.as_str());
        bag.set("Name", entry.name.as_str());
        bag.set("Path", entry.path.as_str());
        bag.set("State", entry.state.value());
        bag.set_text("CurrentAction", &entry.current_action);
        bag.set("EnginePID", entry.pid);
        Ok(bag)
    }

    fn refresh_instance(&mut self, instance: HandleId) -> Result<(), ServiceError> {
        match self.instance_index(instance)? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound),
        }
    }

    fn stop_instance(&mut self, instance: HandleId) -> Result<(), ServiceError> {
        match self.instance_index(instance)? {
            Some(index) => {
                self.end_instance(index);
                Ok(())
            }
            None => Err(ServiceError::NotFound),
        }
    }

    fn stop_task(&mut self, task: HandleId) -> Result<(), ServiceError> {
        let key = self.task_key(task)?;
        for index in self.live_instances(&key) {
            self.end_instance(index);
        }
        self.prune_instances();
        Ok(())
    }

    fn release(&mut self, handle: HandleId) {
        if let Some(Target::Instance(_)) = self.handles.remove(&handle) {
            self.prune_instances();
        }
    }
}
