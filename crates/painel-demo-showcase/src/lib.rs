#![forbid(unsafe_code)]

//! Painel demo showcase.
//!
//! Reference screens built on the painel engine, driven by scripted
//! sessions against in-memory collaborators.
//!
//! # Key Components
//!
//! - [`screens`] - Cuisine list, additive item form, registration form
//! - [`memory`] - Queueing data source and recording navigator
//! - [`app`] - One scripted scenario per screen
//! - [`cli`] - Options for the binary

pub mod app;
pub mod cli;
pub mod memory;
pub mod screens;
