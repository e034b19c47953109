pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod ipc;
pub mod models;
pub mod scoring;
pub mod store;
pub mod tree;
pub mod visualize;

pub use config::ArborConfig;
pub use error::ArborError;
pub use graph::connected_set;
pub use scoring::ConnectionScore;
pub use store::{GraphStore, InMemoryGraphStore, PgGraphStore};
pub use tree::{build_memory_tree, MemoryTree};
pub use visualize::{derive, VisualStyle, Visualization};
