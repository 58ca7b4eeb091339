pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod otp;
pub mod repository;
pub mod service;
