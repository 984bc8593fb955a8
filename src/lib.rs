pub mod api;
pub mod auth;
pub mod config;
pub mod geo;
pub mod models;
pub mod redirect;
pub mod routing;
pub mod storage;
pub mod token;
pub mod tracking;
