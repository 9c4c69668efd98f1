//! Droidwatch: package identity resolution and telemetry capture for an
//! Android device reached over `adb`.

pub mod api;
pub mod channel;
pub mod config;
pub mod db;
pub mod packages;
pub mod service;
pub mod session;
pub mod telemetry;
