use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;
use std::{fs, io, mem};

use log::{info, warn};

use crate::buffer;
use crate::capability::Capabilities;
use crate::config::{Config, CropRect};
use crate::control::Cid;
use crate::error::{CaptureError, Result};
use crate::v4l2;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Owns the file descriptor of a `/dev/video<index>` node.
///
/// V4L2 does not permit opening the same device twice, so the descriptor is
/// held exclusively for the lifetime of the engine and closed on drop.
pub struct Device {
    fd: std::os::raw::c_int,
    path: PathBuf,
}

impl Device {
    /// Opens and validates the device node addressed by a configuration.
    ///
    /// The node must exist, be a character device, open read-write in
    /// non-blocking mode, and advertise video capture plus streaming i/o.
    pub(crate) fn open(config: &Config) -> Result<Self> {
        let path = PathBuf::from(config.device_path());

        let meta = fs::metadata(&path).map_err(|e| {
            CaptureError::unavailable(format!("cannot identify {}", path.display()), e)
        })?;
        if !meta.file_type().is_char_device() {
            return Err(CaptureError::unavailable_plain(format!(
                "{} is not a character device",
                path.display()
            )));
        }

        let fd = v4l2::open(&path, libc::O_RDWR | libc::O_NONBLOCK)
            .map_err(|e| CaptureError::unavailable(format!("cannot open {}", path.display()), e))?;
        let dev = Device { fd, path };

        let caps = dev
            .query_caps()
            .map_err(|e| CaptureError::unavailable("VIDIOC_QUERYCAP failed", e))?;
        if !caps.supports_capture() {
            return Err(CaptureError::unavailable_plain(format!(
                "{} ({}) is not a video capture device",
                dev.path.display(),
                caps.card
            )));
        }
        if !caps.supports_streaming() {
            return Err(CaptureError::unavailable_plain(format!(
                "{} ({}) does not support streaming i/o",
                dev.path.display(),
                caps.card
            )));
        }
        info!(
            "opened {} (fd {}): {} [{}]",
            dev.path.display(),
            dev.fd,
            caps.card,
            caps.driver
        );

        Ok(dev)
    }

    pub(crate) fn fd(&self) -> std::os::raw::c_int {
        self.fd
    }

    /// Query for device capabilities
    ///
    /// This returns video4linux framework defined information such as card,
    /// driver and the capability flags.
    pub fn query_caps(&self) -> io::Result<Capabilities> {
        unsafe {
            let mut v4l2_caps: v4l2_capability = mem::zeroed();
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_QUERYCAP,
                &mut v4l2_caps as *mut _ as *mut std::os::raw::c_void,
            )?;
            Ok(Capabilities::from(v4l2_caps))
        }
    }

    /// Applies the configured crop rectangle if the device supports cropping.
    ///
    /// A zero rectangle is a no-op. Rejections are logged and ignored; crop
    /// support is best-effort across drivers.
    pub(crate) fn apply_crop(&self, buf_type: buffer::Type, rect: CropRect) {
        if rect.is_zero() {
            return;
        }

        let mut cropcap: v4l2_cropcap = unsafe { mem::zeroed() };
        cropcap.type_ = buf_type as u32;
        let supported = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_CROPCAP,
                &mut cropcap as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if supported.is_err() {
            warn!("{}: VIDIOC_CROPCAP not supported", self.path.display());
            return;
        }

        let mut crop: v4l2_crop = unsafe { mem::zeroed() };
        crop.type_ = buf_type as u32;
        crop.c = v4l2_rect {
            left: rect.left as i32,
            top: rect.top as i32,
            width: rect.width,
            height: rect.height,
        };
        let applied = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_S_CROP,
                &mut crop as *mut _ as *mut std::os::raw::c_void,
            )
        };
        match applied {
            Ok(()) => info!(
                "crop set to {}x{}+{}+{} (bounds {}x{})",
                rect.width, rect.height, rect.left, rect.top,
                cropcap.bounds.width, cropcap.bounds.height
            ),
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                warn!("{}: cropping not supported", self.path.display())
            }
            Err(e) => warn!("VIDIOC_S_CROP: {}", e),
        }
    }

    /// Negotiates the streaming format (S_FMT).
    ///
    /// Issued exactly once per device: changing the format afterwards would
    /// require freeing every buffer first, which the engine does not
    /// support. The driver may adjust width and height; the payload is
    /// returned with the driver's view of the format.
    pub(crate) fn set_format(&self, mut payload: v4l2_format) -> Result<v4l2_format> {
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_S_FMT,
                &mut payload as *mut _ as *mut std::os::raw::c_void,
            )
        }
        .map_err(CaptureError::FormatRejected)?;
        Ok(payload)
    }

    /// Writes streaming parameters (S_PARM), returning the driver's view.
    pub(crate) fn set_params(
        &self,
        buf_type: buffer::Type,
        timeperframe: v4l2_fract,
    ) -> io::Result<v4l2_streamparm> {
        let mut parm: v4l2_streamparm = unsafe { mem::zeroed() };
        parm.type_ = buf_type as u32;
        unsafe {
            parm.parm.capture.timeperframe = timeperframe;
        }
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_S_PARM,
                &mut parm as *mut _ as *mut std::os::raw::c_void,
            )?;
        }
        Ok(parm)
    }

    /// Reads streaming parameters (G_PARM).
    pub(crate) fn get_params(&self, buf_type: buffer::Type) -> io::Result<v4l2_streamparm> {
        let mut parm: v4l2_streamparm = unsafe { mem::zeroed() };
        parm.type_ = buf_type as u32;
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_G_PARM,
                &mut parm as *mut _ as *mut std::os::raw::c_void,
            )?;
        }
        Ok(parm)
    }

    /// Starts streaming i/o on the given buffer queue.
    pub(crate) fn stream_on(&self, buf_type: buffer::Type) -> io::Result<()> {
        let mut typ = buf_type as u32;
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_STREAMON,
                &mut typ as *mut _ as *mut std::os::raw::c_void,
            )
        }
    }

    /// Stops streaming i/o, returning all queued buffers to the application.
    pub(crate) fn stream_off(&self, buf_type: buffer::Type) -> io::Result<()> {
        let mut typ = buf_type as u32;
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_STREAMOFF,
                &mut typ as *mut _ as *mut std::os::raw::c_void,
            )
        }
    }

    /// Writes a single control value (S_CTRL).
    pub(crate) fn set_control(&self, cid: Cid, value: i32) -> bool {
        let mut ctrl = v4l2_control {
            id: cid as u32,
            value,
        };
        let res = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_S_CTRL,
                &mut ctrl as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if let Err(e) = res {
            warn!("error setting {}: {}", cid, e);
            return false;
        }
        true
    }

    /// Reads a single control value (G_CTRL); 0 when the ioctl fails.
    pub(crate) fn get_control(&self, cid: Cid) -> i32 {
        let mut ctrl = v4l2_control {
            id: cid as u32,
            value: 0,
        };
        let res = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_G_CTRL,
                &mut ctrl as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if let Err(e) = res {
            warn!("error getting {}: {}", cid, e);
            return 0;
        }
        ctrl.value
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            warn!("closing {} failed: {}", self.path.display(), e);
        }
    }
}
