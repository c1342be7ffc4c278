//! Cohort builder for cancer-imaging research data.
//!
//! * [`data`] – table model, loading, age normalisation, filtering, exports
//! * [`fetch`] – sequential pathology image downloader
//! * [`radiology`] – radiology manifests from the archive-search service
//! * [`app`], [`downloader`] – the two egui front-ends

pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod radiology;
pub mod state;
pub mod ui;
