pub mod actions;
pub mod registration;
pub mod settings;
pub mod task;
pub mod triggers;

pub use task::DefinitionBag;
