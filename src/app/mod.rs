//! Console client: input parsing, command handling and event rendering.

pub mod action;
pub mod commands;
pub mod console;
pub mod event;
pub mod handler;
pub mod state;
