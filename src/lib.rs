// src/lib.rs

//! arXiv weekly digest library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod rendering;
pub mod services;
pub mod storage;
pub mod utils;
