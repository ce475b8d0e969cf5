// src/lib.rs - Shared-screen status mirror for a Bambu Lab style printer
pub mod auth;
pub mod cloud;
pub mod config;
pub mod job;
pub mod monitor;
pub mod status;
pub mod telemetry;
pub mod web;
