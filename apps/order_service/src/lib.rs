// apps/order_service/src/lib.rs

//! HTTP service around the `orderflow` engine: configuration, the Postgres
//! store, request workflows and the actix-web routes.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod pipelines;
pub mod state;
pub mod web;
