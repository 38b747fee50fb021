pub mod api;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod storage;
pub mod views;
