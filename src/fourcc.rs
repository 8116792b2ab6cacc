use std::{fmt, str};

/// Four character code identifying a pixel format on the wire.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    /// Returns a four character code from its byte representation
    ///
    /// # Example
    ///
    /// ```
    /// use v4lcap::FourCC;
    /// let fourcc = FourCC::new(b"NV12");
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(string) = str::from_utf8(&self.repr) {
            write!(f, "{}", string)?;
        }
        Ok(())
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        u32::from_le_bytes(fourcc.repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let fourcc = FourCC::new(b"YUYV");
        assert_eq!(FourCC::from(u32::from(fourcc)), fourcc);
        assert_eq!(fourcc.to_string(), "YUYV");
    }
}
