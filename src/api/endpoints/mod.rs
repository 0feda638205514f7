//! Route handlers.

pub mod analysis;
pub mod feedback;
pub mod health;
