//! Tour package booking and loyalty rewards core.
//!
//! Customers assemble packages from plans (flight, accommodation and vehicle
//! legs), each plan orders units of catalog activities, and processing a
//! package reserves that capacity. Separately, customers earn loyalty points
//! and spend them on single-use coupon codes.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod migrator;
pub mod services;

pub use errors::{AppError, ServiceError};
pub use services::TourServices;
