// Library exports for Readstack
// This allows integration tests and external code to use Readstack modules

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
