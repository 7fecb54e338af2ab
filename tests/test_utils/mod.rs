//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub mod mock_server;

pub use mock_server::{CapturedRequest, spawn_status_server, tcp_listener};
