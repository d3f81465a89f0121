pub mod assistant;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod fallback;
pub mod interaction_log;
pub mod populate;
pub mod retrieval;
pub mod style;
pub mod vector_store;
