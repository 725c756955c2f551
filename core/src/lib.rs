pub mod definition;
pub mod error;
pub mod folders;
pub mod service;
pub mod tasks;
pub mod utils;
pub mod variant;

pub use definition::DefinitionBag;
pub use error::TaskError;
pub use folders::{folder::TaskFolder, paths::normalize_path};
pub use service::{
    backend::{Credentials, TaskBackend},
    connection::{ConnectionInfo, TaskService},
    memory::MemoryBackend,
};
pub use tasks::{
    registered::{RegisteredTask, RegisteredTaskCollection},
    running::{RunningTask, RunningTaskCollection},
};
