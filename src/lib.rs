pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod utils;

#[cfg(test)]
mod tests;
