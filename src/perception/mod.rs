pub mod monitor;
pub mod pipeline;
pub mod screenshot;
pub mod types;
