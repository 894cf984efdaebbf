//! Core type definitions used across the FileFlow workspace.

pub mod id;

pub use id::*;
