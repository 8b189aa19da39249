//! Error envelopes returned by the remote resource API and their translation
//! into uniform, human-readable messages.
//!
//! This crate is pure data: it never performs I/O and has no opinion on how a
//! failed call was transported. Callers hand it the status and the parsed body
//! of a failed response and get back a message plus the decoded envelope, if any.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod problem;
pub mod translate;

pub use problem::{APPLICATION_PROBLEM_JSON, ProblemCode, VendorProblem};
pub use translate::{DEFAULT_VENDOR_NAME, ErrorBody, ErrorTranslator, TranslatedError};
