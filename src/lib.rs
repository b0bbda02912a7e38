//! Sharpshooter Server - authoritative multiplayer target range
//!
//! Players connect over TCP, register a name and shoot arrows at two moving
//! targets. The server owns all game state and broadcasts every change to
//! every connected client as newline-delimited text frames.

pub mod app;
pub mod config;
pub mod game;
pub mod net;
pub mod store;
pub mod util;
