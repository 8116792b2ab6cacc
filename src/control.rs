use std::fmt;

/// Control identifiers the capture engine drives.
///
/// Values are the V4L2 CIDs: user-class controls live at
/// `V4L2_CID_BASE` (0x0098_0900), camera-class controls at
/// `V4L2_CID_CAMERA_CLASS_BASE` (0x009a_0900).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Cid {
    Brightness = 0x0098_0900,
    Contrast = 0x0098_0901,
    Saturation = 0x0098_0902,
    Hue = 0x0098_0903,
    AutoWhiteBalance = 0x0098_090c,
    Gain = 0x0098_0913,
    WhiteBalanceTemperature = 0x0098_091a,
    Sharpness = 0x0098_091b,
    ExposureAuto = 0x009a_0901,
    ExposureAbsolute = 0x009a_0902,
    ExposureAutoPriority = 0x009a_0903,
    FocusAbsolute = 0x009a_090a,
    FocusAuto = 0x009a_090c,
    ZoomAbsolute = 0x009a_090d,
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Values of the `ExposureAuto` menu control.
///
/// Aperture priority lets the device pick the exposure time while we fix the
/// aperture; manual hands both over to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExposureMode {
    Auto = 0,
    Manual = 1,
    ShutterPriority = 2,
    AperturePriority = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cids_match_uapi() {
        assert_eq!(Cid::Brightness as u32, 0x0098_0900);
        assert_eq!(Cid::AutoWhiteBalance as u32, 0x0098_0900 + 12);
        assert_eq!(Cid::Gain as u32, 0x0098_0900 + 19);
        assert_eq!(Cid::WhiteBalanceTemperature as u32, 0x0098_0900 + 26);
        assert_eq!(Cid::Sharpness as u32, 0x0098_0900 + 27);
        assert_eq!(Cid::ExposureAuto as u32, 0x009a_0900 + 1);
        assert_eq!(Cid::ExposureAbsolute as u32, 0x009a_0900 + 2);
        assert_eq!(Cid::FocusAbsolute as u32, 0x009a_0900 + 10);
        assert_eq!(Cid::ZoomAbsolute as u32, 0x009a_0900 + 13);
    }
}
