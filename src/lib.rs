//! Project and task tracking with derived delivery status.
//!
//! The `engine` module holds the pure status/validation rules, the access
//! model, and the SQLite-backed store. The `worktrack` binary wires them to a
//! command line.

pub mod engine;
