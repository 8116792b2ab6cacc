use std::fmt;

use crate::v4l2::videodev::v4l2_capability;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Device capability flags as reported by VIDIOC_QUERYCAP
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;
        const READ_WRITE            = 0x01000000;
        const ASYNC_IO              = 0x02000000;
        const STREAMING             = 0x04000000;
        const DEVICE_CAPS           = 0x80000000;
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

/// Device capabilities
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),
    /// Capability flags
    pub capabilities: Flags,
}

impl Capabilities {
    /// Whether the node can capture video at all, on either the single-plane
    /// or the multi-plane interface.
    pub fn supports_capture(&self) -> bool {
        self.capabilities
            .intersects(Flags::VIDEO_CAPTURE | Flags::VIDEO_CAPTURE_MPLANE)
    }

    /// Whether the node supports streaming (queue/dequeue) i/o.
    pub fn supports_streaming(&self) -> bool {
        self.capabilities.contains(Flags::STREAMING)
    }
}

fn cstr_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        Capabilities {
            driver: cstr_field(&cap.driver),
            card: cstr_field(&cap.card),
            bus: cstr_field(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities: Flags::from(cap.capabilities),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilities: {}", self.capabilities)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_detection() {
        let mut raw: v4l2_capability = unsafe { std::mem::zeroed() };
        raw.driver[..3].copy_from_slice(b"uvc");
        raw.capabilities = 0x0000_1000 | 0x0400_0000;
        let caps = Capabilities::from(raw);
        assert_eq!(caps.driver, "uvc");
        assert!(caps.supports_capture());
        assert!(caps.supports_streaming());

        let mut raw: v4l2_capability = unsafe { std::mem::zeroed() };
        raw.capabilities = 0x0000_0002;
        let caps = Capabilities::from(raw);
        assert!(!caps.supports_capture());
    }
}
