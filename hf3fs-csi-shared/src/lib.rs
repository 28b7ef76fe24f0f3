//! Types shared between the 3FS CSI library and its front ends.

pub mod errors;

pub use errors::{CsiError, CsiResult, ErrorKind};
