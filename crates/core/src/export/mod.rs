//! Export/import document shapes consumed by the settings UI.

mod export_model;

pub use export_model::*;

#[cfg(test)]
mod export_model_tests;
