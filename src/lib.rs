pub mod api;
pub mod cache;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod db;
pub mod error;
pub mod owners;
pub mod reconcile;
pub mod series;
pub mod state;
pub mod types;
