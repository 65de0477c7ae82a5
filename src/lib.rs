pub mod analytics;
pub mod config;
pub mod db;
pub mod domain;
pub mod export;
pub mod services;
pub mod state;
pub mod time_utils;
pub mod web;
