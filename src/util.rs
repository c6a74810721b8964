//! Shared utility modules used across Quiver components.

pub mod varint;
