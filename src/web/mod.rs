pub mod api;
pub mod auth_channel;
pub mod models;
