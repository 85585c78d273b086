//! different utility modules used throughout the project
/// terminal and file logger
pub mod logger;
