//! Live components: data in, patched host tree out.

pub mod component;
pub mod tick;

pub use component::Component;
pub use tick::TickQueue;
