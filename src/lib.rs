pub mod backend;
pub mod configuration;
pub mod configuration_handler;
pub mod database_interface;
pub mod error;
pub mod http;
pub mod identity;
pub mod local_store;
pub mod schema;
pub mod slot_grid;
pub mod slots;
#[cfg(test)]
mod testutils;
pub mod types;
pub mod week;
pub mod week_view;
