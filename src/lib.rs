// src/lib.rs — Library root for Kindred

pub mod cli;
pub mod generation;
pub mod infra;
pub mod provider;
