//! Results of best-effort steps.

use hf3fs_csi_shared::errors::CsiError;

/// Outcome of a best-effort side step, such as marking a mount shared or
/// removing a directory that is no longer needed.
///
/// A failed advisory step is logged when captured and then carried alongside
/// the primary result. It never becomes the operation's error.
#[derive(Debug)]
#[must_use]
pub struct Advisory {
    step: &'static str,
    error: Option<CsiError>,
}

impl Advisory {
    /// A step that succeeded, or had nothing to do.
    pub fn ok(step: &'static str) -> Self {
        Self { step, error: None }
    }

    /// Capture the result of `step`, logging a warning if it failed.
    pub fn capture(step: &'static str, result: Result<(), CsiError>) -> Self {
        match result {
            Ok(()) => Self::ok(step),
            Err(error) => {
                tracing::warn!(step, error = %error, "Best-effort step failed, continuing");
                Self {
                    step,
                    error: Some(error),
                }
            }
        }
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&CsiError> {
        self.error.as_ref()
    }
}
