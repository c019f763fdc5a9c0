//! FlightSurety Oracle Library
//!
//! Oracle responder for the FlightSurety contracts: registers a pool of oracle
//! accounts, listens for flight status requests and answers every request whose
//! index one of our oracles holds.

pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod node;
pub mod registry;
pub mod routes;
pub mod services;
