pub mod config;
pub mod error;
pub mod geometry;
pub mod lunge;
pub mod pose;
pub mod protocol;
