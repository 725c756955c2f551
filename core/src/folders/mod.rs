pub mod folder;
pub mod paths;
