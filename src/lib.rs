pub mod config;
pub mod dashboard;
pub mod error;
pub mod generation;
pub mod gpu;
pub mod scheduler;
pub mod shutdown;
pub mod worker;
