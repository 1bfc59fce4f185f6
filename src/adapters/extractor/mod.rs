//! Source extractors.

pub mod python;

pub use python::{parse_function, PythonFunctionExtractor};
