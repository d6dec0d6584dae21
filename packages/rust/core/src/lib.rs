//! Core pipeline orchestration and domain logic for autograde.
//!
//! This crate ties together building a submission, running its questions,
//! and writing the grading report into one end-to-end workflow
//! ([`pipeline::grade_lab`]).

pub mod build;
pub mod cleanup;
pub mod fixtures;
pub mod lab;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod tools;
