use std::io;

use thiserror::Error;

/// Errors raised during engine construction.
///
/// Once a [`crate::Capture`] exists, per-frame problems never surface as
/// errors: capture calls degrade to empty frames or zero byte counts so a
/// capture loop can keep running.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The configured pixel format is not in the supported set.
    #[error("pixel format not supported")]
    UnsupportedFormat,

    /// The device node could not be acquired: missing, not a character
    /// device, failed to open, failed capability queries, or refused to
    /// start streaming.
    #[error("camera device unavailable: {reason}")]
    DeviceUnavailable {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// The driver rejected the format negotiation (S_FMT).
    #[error("format rejected by driver")]
    FormatRejected(#[source] io::Error),

    /// The driver granted fewer than one buffer.
    #[error("insufficient buffer memory: requested {requested}, got {granted}; increasing num_buffers may work")]
    InsufficientBuffers { requested: u32, granted: u32 },

    /// Mapping a kernel buffer plane into our address space failed.
    #[error("failed to map buffer {index} plane {plane}")]
    MapFailure {
        index: u32,
        plane: usize,
        #[source]
        source: io::Error,
    },
}

impl CaptureError {
    pub(crate) fn unavailable(reason: impl Into<String>, source: io::Error) -> Self {
        CaptureError::DeviceUnavailable {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn unavailable_plain(reason: impl Into<String>) -> Self {
        CaptureError::DeviceUnavailable {
            reason: reason.into(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = CaptureError::InsufficientBuffers {
            requested: 4,
            granted: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 4"));
        assert!(msg.contains("got 0"));

        let err = CaptureError::unavailable_plain("/dev/video0 is not a character device");
        assert!(err.to_string().contains("not a character device"));
    }
}
