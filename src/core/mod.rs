pub mod config;
pub mod filter;
pub mod lifecycle;
pub mod runner;
pub mod signature;
pub mod terminal;
