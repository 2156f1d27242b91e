//! melops-train-cli: command-line front end for melops-train.
//!
//! [`cli::run`] resolves parsed arguments into a [`config::Config`] and hands
//! it to [`train::execute`].

pub mod cli;
pub mod config;
pub mod train;
