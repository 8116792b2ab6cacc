//! The camera control surface: thin, uniform wrappers over S_CTRL/G_CTRL
//! plus frame rate negotiation.
//!
//! Setters return false when the driver rejects the value; getters return 0
//! (or false) on failure. Both log the failing control, so a capture loop
//! can stay oblivious.

use log::warn;

use crate::buffer;
use crate::control::{Cid, ExposureMode};
use crate::device::Device;
use crate::fraction::Fraction;
use crate::v4l2::videodev::{v4l2_fract, V4L2_CAP_TIMEPERFRAME};

use super::Capture;

/// Asks the driver for `fps` frames per second via S_PARM.
///
/// Returns 0.0 when the driver honored the request exactly (within floating
/// point epsilon), otherwise the rate the driver chose instead.
pub(crate) fn negotiate_fps(device: &Device, buf_type: buffer::Type, fps: f64) -> f64 {
    let timeperframe = v4l2_fract {
        numerator: 1,
        denominator: fps as u32,
    };
    let parm = match device.set_params(buf_type, timeperframe) {
        Ok(parm) => parm,
        Err(e) => {
            warn!("VIDIOC_S_PARM failed: {}", e);
            return 0.0;
        }
    };

    let chosen = Fraction::from(unsafe { parm.parm.capture.timeperframe }).as_fps();
    if chosen == 0.0 || (chosen - fps).abs() <= f64::EPSILON {
        0.0
    } else {
        chosen
    }
}

impl Capture {
    /// Requests a new frame rate.
    ///
    /// Returns 0.0 if the driver honored the request, else the actual rate
    /// it fell back to (typically its maximum for the negotiated format and
    /// resolution).
    pub fn set_fps(&self, fps: f64) -> f64 {
        negotiate_fps(&self.device, self.config.buffer_type(), fps)
    }

    /// The currently configured frame rate, or 0.0 when the device does not
    /// advertise time-per-frame control.
    pub fn fps(&self) -> f64 {
        let parm = match self.device.get_params(self.config.buffer_type()) {
            Ok(parm) => parm,
            Err(e) => {
                warn!("VIDIOC_G_PARM failed: {}", e);
                return 0.0;
            }
        };
        let capture = unsafe { parm.parm.capture };
        if capture.capability & V4L2_CAP_TIMEPERFRAME == 0 {
            return 0.0;
        }
        Fraction::from(capture.timeperframe).as_fps()
    }

    pub fn set_zoom(&self, value: i32) -> bool {
        self.device.set_control(Cid::ZoomAbsolute, value)
    }

    pub fn zoom(&self) -> i32 {
        self.device.get_control(Cid::ZoomAbsolute)
    }

    pub fn set_focus(&self, value: i32) -> bool {
        self.device.set_control(Cid::FocusAbsolute, value)
    }

    pub fn focus(&self) -> i32 {
        self.device.get_control(Cid::FocusAbsolute)
    }

    pub fn set_auto_focus(&self, enable: bool) -> bool {
        self.device.set_control(Cid::FocusAuto, enable as i32)
    }

    pub fn auto_focus(&self) -> bool {
        self.device.get_control(Cid::FocusAuto) != 0
    }

    pub fn set_sharpness(&self, value: i32) -> bool {
        self.device.set_control(Cid::Sharpness, value)
    }

    pub fn sharpness(&self) -> i32 {
        self.device.get_control(Cid::Sharpness)
    }

    pub fn set_brightness(&self, value: i32) -> bool {
        self.device.set_control(Cid::Brightness, value)
    }

    pub fn brightness(&self) -> i32 {
        self.device.get_control(Cid::Brightness)
    }

    pub fn set_contrast(&self, value: i32) -> bool {
        self.device.set_control(Cid::Contrast, value)
    }

    pub fn contrast(&self) -> i32 {
        self.device.get_control(Cid::Contrast)
    }

    pub fn set_saturation(&self, value: i32) -> bool {
        self.device.set_control(Cid::Saturation, value)
    }

    pub fn saturation(&self) -> i32 {
        self.device.get_control(Cid::Saturation)
    }

    pub fn set_hue(&self, value: i32) -> bool {
        self.device.set_control(Cid::Hue, value)
    }

    pub fn hue(&self) -> i32 {
        self.device.get_control(Cid::Hue)
    }

    pub fn set_gain(&self, value: i32) -> bool {
        self.device.set_control(Cid::Gain, value)
    }

    pub fn gain(&self) -> i32 {
        self.device.get_control(Cid::Gain)
    }

    /// Absolute exposure time, in 100 µs units. Only effective while the
    /// exposure mode is manual.
    pub fn set_exposure(&self, value: i32) -> bool {
        self.device.set_control(Cid::ExposureAbsolute, value)
    }

    pub fn exposure(&self) -> i32 {
        self.device.get_control(Cid::ExposureAbsolute)
    }

    pub fn set_white_balance_temperature(&self, value: i32) -> bool {
        self.device.set_control(Cid::WhiteBalanceTemperature, value)
    }

    pub fn white_balance_temperature(&self) -> i32 {
        self.device.get_control(Cid::WhiteBalanceTemperature)
    }

    pub fn set_auto_white_balance(&self, enable: bool) -> bool {
        self.device.set_control(Cid::AutoWhiteBalance, enable as i32)
    }

    pub fn auto_white_balance(&self) -> bool {
        self.device.get_control(Cid::AutoWhiteBalance) != 0
    }

    pub fn set_auto_exposure_mode(&self, mode: ExposureMode) -> bool {
        self.device.set_control(Cid::ExposureAuto, mode as i32)
    }

    /// Raw value of the exposure-mode menu control.
    pub fn auto_exposure_mode(&self) -> i32 {
        self.device.get_control(Cid::ExposureAuto)
    }

    /// In the automatic exposure modes, whether the device may vary the
    /// frame rate to gather more light. Off keeps the rate constant.
    pub fn set_auto_exposure_priority(&self, on: bool) -> bool {
        self.device.set_control(Cid::ExposureAutoPriority, on as i32)
    }

    pub fn auto_exposure_priority(&self) -> bool {
        self.device.get_control(Cid::ExposureAutoPriority) != 0
    }

    /// Switches to manual exposure and applies the given exposure time.
    ///
    /// At 30 fps a frame spans 1/30 s = 330 units of 100 µs, which bounds
    /// the useful value; tune to the ambient light from there.
    pub fn set_manual_exposure_value(&self, value: i32) -> bool {
        self.set_auto_exposure_mode(ExposureMode::Manual);
        self.device.set_control(Cid::ExposureAbsolute, value)
    }

    pub fn manual_exposure_value(&self) -> i32 {
        self.device.get_control(Cid::ExposureAbsolute)
    }
}
