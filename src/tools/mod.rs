pub mod assistant;
pub mod matcher;
