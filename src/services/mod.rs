// src/services/mod.rs

pub mod bounded_cache;
pub mod callback_executor;
pub mod image_decoder;
pub mod thumbnail_generator;
pub mod thumbnail_service;
