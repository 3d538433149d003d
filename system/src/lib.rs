mod cell_table;
mod config;
mod error;
mod gateway;
mod groups;
mod hub;
mod message;
mod periodic;
mod registry;
mod types;

pub use cell_table::*;
pub use config::*;
pub use error::*;
pub use gateway::*;
pub use groups::*;
pub use hub::*;
pub use message::*;
pub use periodic::*;
pub use registry::*;
pub use types::*;

pub extern crate serde;
pub extern crate serde_json;
pub extern crate uuid;
