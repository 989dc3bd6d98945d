// src/blockchain/mod.rs

pub mod client;
pub use client::ChainClient;

pub mod models;
pub mod services;
