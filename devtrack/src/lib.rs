//! `DevTrack`: project and task tracking client library.

pub mod app;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod notify;
pub mod projects;
