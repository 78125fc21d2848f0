pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod kanban;
pub mod local_store;
pub mod models;
pub mod services;
pub mod state;
pub mod tags;
