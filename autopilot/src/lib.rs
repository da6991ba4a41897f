pub mod benchmark;
pub mod config;
pub mod policies;
pub mod runner;
pub mod trajectory;
pub mod util;
