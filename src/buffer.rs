use std::fmt;

use crate::timestamp::Timestamp;
use crate::v4l2::videodev::{V4L2_BUF_TYPE_VIDEO_CAPTURE, V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE};

/// Capture buffer type negotiated with the driver.
///
/// Contiguous formats ride the classic single-plane interface; formats with
/// separately allocated planes require the multi-plane interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Type {
    VideoCapture = V4L2_BUF_TYPE_VIDEO_CAPTURE,
    VideoCaptureMplane = V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
}

impl Type {
    /// Whether buffers of this type carry a plane array in their ioctl
    /// payload.
    pub fn planar(self) -> bool {
        matches!(self, Type::VideoCaptureMplane)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::VideoCapture => write!(f, "video capture"),
            Type::VideoCaptureMplane => write!(f, "video capture (multi-planar)"),
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Buffer state flags reported by the driver on dequeue
    pub struct Flags: u32 {
        const MAPPED                = 0x00000001;
        const QUEUED                = 0x00000002;
        const DONE                  = 0x00000004;
        const KEYFRAME              = 0x00000008;
        const ERROR                 = 0x00000040;
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-frame bookkeeping filled in from the dequeued ioctl payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct Metadata {
    /// Time of capture, usually set by the driver
    pub timestamp: Timestamp,
    /// Frame sequence number, counted by the driver
    pub sequence: u32,
    /// Buffer flags
    pub flags: Flags,
    /// Field order of the frame
    pub field: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_split() {
        assert!(!Type::VideoCapture.planar());
        assert!(Type::VideoCaptureMplane.planar());
        assert_eq!(Type::VideoCapture as u32, 1);
        assert_eq!(Type::VideoCaptureMplane as u32, 9);
    }
}
