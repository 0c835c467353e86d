//! Core engine modules for worktrack.

pub mod access;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod forms;
pub mod kanban;
pub mod listing;
pub mod repo;
pub mod resolver;
pub mod session;
pub mod state;
pub mod types;
pub mod validate;
