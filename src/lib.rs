//! clipkeep - Linux desktop clipboard history daemon
//!
//! This library exports the core modules for testing and potential reuse.

pub mod clipboard;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod logging;
pub mod models;
pub mod storage;
