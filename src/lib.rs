// src/lib.rs

//! Profile Crawler Library
//!
//! Turns ZoomInfo company profile URLs into normalized [`models::CompanyRecord`]s.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
