//! The navigation engine: tree model, expansion handling, persisted
//! expansion state and search.

pub mod collaborators;
pub mod coordinator;
pub mod listing;
pub mod model;
pub mod node;
pub mod persistence;
pub mod search;
