//! Client-side session core for the Gram social network.
//!
//! Owns the token lifecycle (decode, persist, silent refresh), the session
//! state machine, and the authenticated REST transport every other client
//! feature goes through.

pub mod config;

pub(crate) mod constants;

pub mod error;

pub mod application;

pub mod session;

pub mod storage;

pub mod transport;

pub mod utils;
