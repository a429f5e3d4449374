pub mod agent;
pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod geo;
pub mod ledger;
pub mod model;
pub mod models;
pub mod registry;
pub mod routes;
pub mod seed;
pub mod state;
pub mod state_machine;
