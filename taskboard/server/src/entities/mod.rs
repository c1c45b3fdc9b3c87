//! SeaORM entities for the task board schema.

pub mod prelude;

pub mod task;
pub mod user;
