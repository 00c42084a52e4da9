#![doc = include_str!("README.md")]

pub mod config_man;
pub mod coordinator;
pub mod delta;
pub mod differ;
pub mod doc;
pub mod error;
pub mod http_receptor;
pub mod message;
pub mod op;
pub mod oracle;
pub mod scheduler;
pub mod selection;
pub mod server;
pub mod types;
