pub mod api;
pub mod config;
pub mod control;
pub mod db;
pub mod mqtt;
pub mod sensors;
pub mod state_cache;

#[cfg(test)]
mod testing;
