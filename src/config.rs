use crate::buffer;
use crate::format::PixelFormat;
use crate::memory::Memory;

/// Hard upper bound on the buffer ring size, mirroring the kernel's
/// VIDEO_MAX_FRAME.
pub const MAX_BUFFERS: u32 = 32;

/// How the buffer ring is backed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Buffering {
    /// Kernel-allocated buffers mapped into our address space (pull model).
    #[default]
    Internal,
    /// Caller-allocated buffers handed to the kernel each frame (push model).
    UserPtr,
}

/// Which frame a capture call returns when several are queued up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Return the oldest queued frame, the usual streaming behaviour.
    #[default]
    Oldest,
    /// Drain the ring and return only the newest frame to minimise latency.
    OnlyNewest,
}

/// Capture crop rectangle, maps to `v4l2_rect`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// An all-zero rectangle means "do not crop".
    pub fn is_zero(&self) -> bool {
        *self == CropRect::default()
    }
}

/// Immutable stream configuration.
///
/// All negotiation happens once at engine construction; the configuration is
/// never consulted for mutable state afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Desired frame width in pixels. The driver may adjust it.
    pub width: u32,
    /// Desired frame height in pixels. The driver may adjust it.
    pub height: u32,
    /// Desired frame rate. The driver picks the closest rate it supports;
    /// read the actual value back after construction.
    pub fps: u32,
    /// Desired pixel format. Consult `v4l2-ctl --list-formats` for what the
    /// device can deliver.
    pub pixel_format: PixelFormat,
    /// Index of the device node, `/dev/video<index>`. V4L2 does not permit
    /// opening the same device twice.
    pub device_index: usize,
    /// Requested ring size, 1..=32. The driver decides how many buffers it
    /// actually grants.
    pub num_buffers: u32,
    /// Memory model for the buffer ring.
    pub buffering: Buffering,
    /// Optional capture crop; all-zero disables cropping.
    pub crop: CropRect,
    /// Whether all planes of a frame live in one contiguous allocation.
    /// Selects between the single-plane and multi-plane capture interfaces.
    pub contiguous: bool,
    /// Frame selection policy for internal buffering.
    pub selection: Selection,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: 0,
            height: 0,
            fps: 0,
            pixel_format: PixelFormat::Nv12,
            device_index: 0,
            num_buffers: 1,
            buffering: Buffering::Internal,
            crop: CropRect::default(),
            contiguous: true,
            selection: Selection::Oldest,
        }
    }
}

impl Config {
    /// Buffer interface implied by the plane layout.
    pub fn buffer_type(&self) -> buffer::Type {
        if self.contiguous {
            buffer::Type::VideoCapture
        } else {
            buffer::Type::VideoCaptureMplane
        }
    }

    /// Memory model implied by the buffering mode.
    pub fn memory(&self) -> Memory {
        match self.buffering {
            Buffering::Internal => Memory::Mmap,
            Buffering::UserPtr => Memory::UserPtr,
        }
    }

    /// Number of plane buffers per frame the engine will expose.
    ///
    /// Derived from the configured format and layout, never from the
    /// kernel's format response: the single-plane interface always carries
    /// one plane regardless of how planar the visual format is.
    pub fn num_planes(&self) -> usize {
        if self.contiguous {
            1
        } else {
            self.pixel_format.planes()
        }
    }

    /// Path of the device node this configuration addresses.
    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.device_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_count_follows_layout() {
        let mut config = Config {
            pixel_format: PixelFormat::Nv12sp,
            contiguous: false,
            ..Config::default()
        };
        assert_eq!(config.num_planes(), 2);
        assert_eq!(config.buffer_type(), buffer::Type::VideoCaptureMplane);

        // The single-plane interface flattens even planar formats.
        config.contiguous = true;
        assert_eq!(config.num_planes(), 1);
        assert_eq!(config.buffer_type(), buffer::Type::VideoCapture);
    }

    #[test]
    fn memory_follows_buffering() {
        let mut config = Config::default();
        assert_eq!(config.memory(), Memory::Mmap);
        config.buffering = Buffering::UserPtr;
        assert_eq!(config.memory(), Memory::UserPtr);
    }

    #[test]
    fn device_path_from_index() {
        let config = Config {
            device_index: 3,
            ..Config::default()
        };
        assert_eq!(config.device_path(), "/dev/video3");
    }
}
