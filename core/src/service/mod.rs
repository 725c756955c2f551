pub mod backend;
pub mod connection;
pub mod error;
pub mod handle;
pub mod memory;
