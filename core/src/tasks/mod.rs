pub mod lifecycle;
pub mod registered;
pub mod running;
