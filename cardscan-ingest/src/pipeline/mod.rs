//! Per-file processing pipeline
//!
//! `merge` holds the pure record-combination logic; `processor` drives a
//! single file through validate → extract → merge → dedup → accept under a
//! global file slot, emitting progress events at every stage transition.

pub mod merge;
mod processor;

pub use processor::{FileOutcome, FileProcessor};
