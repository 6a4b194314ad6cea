#[macro_use]
extern crate log;

pub mod command;
pub mod protocol;
pub mod session;
pub mod state;
