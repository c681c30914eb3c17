pub mod config;
pub mod header;
pub mod logs;
pub mod mapping;
pub mod permission;
pub mod request;
pub mod server;
pub mod stage;
pub mod token;
pub mod transaction;
