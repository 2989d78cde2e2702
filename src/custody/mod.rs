//! Custody engines: generation (C3), mutation with adjacency repair (C4),
//! monthly queries (C5), and integrity auditing (C8).

pub mod generator;
pub mod integrity;
pub mod mutation;
pub mod query;
pub mod types;
