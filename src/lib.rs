#![allow(clippy::too_many_arguments)]

pub mod actions;
pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod processor;
pub mod session;
pub mod settings;
