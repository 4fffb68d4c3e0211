//! Library crate for party-board-back, exposing modules for the binary and tests.

pub mod bus;
pub mod config;
pub mod dto;
pub mod error;
pub mod minigames;
pub mod routes;
pub mod services;
pub mod state;
