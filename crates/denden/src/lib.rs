pub mod dispatch;
pub mod ipc;
pub mod render;
