//! Shared data model and JSON wire definitions for `DevTrack`.

pub mod codec;
pub mod dto;
pub mod model;
