//! SeaORM entities.

pub mod message;
