//! Hand-maintained declarations for the subset of `linux/videodev2.h` this
//! crate actually issues ioctls with.
//!
//! We carry our own copies of these payload structs instead of generating
//! bindings at build time: the UAPI layouts are frozen, and owning the
//! definitions keeps the `m` unions directly accessible. Layout assertions
//! live in the test module below; sizes feed into the ioctl request codes,
//! so a wrong size here means a wrong ioctl number.

#![allow(non_camel_case_types)]

use std::os::raw::c_ulong;

pub use libc::timeval;

pub const VIDEO_MAX_PLANES: usize = 8;

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;

pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_MEMORY_USERPTR: u32 = 2;

pub const V4L2_FIELD_NONE: u32 = 1;
pub const V4L2_FIELD_INTERLACED: u32 = 4;

pub const V4L2_QUANTIZATION_FULL_RANGE: u32 = 1;
pub const V4L2_QUANTIZATION_LIM_RANGE: u32 = 2;

/// `v4l2_captureparm.capability` flag: the driver honors `timeperframe`.
pub const V4L2_CAP_TIMEPERFRAME: u32 = 0x1000;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct v4l2_fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct v4l2_rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_cropcap {
    pub type_: u32,
    pub bounds: v4l2_rect,
    pub defrect: v4l2_rect,
    pub pixelaspect: v4l2_fract,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_crop {
    pub type_: u32,
    pub c: v4l2_rect,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_plane_pix_format {
    pub sizeimage: u32,
    pub bytesperline: u32,
    pub reserved: [u16; 6],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_pix_format_mplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [v4l2_plane_pix_format; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
    pub reserved: [u8; 7],
}

/// The kernel union also carries window/overlay formats holding pointers,
/// which is what pushes its alignment to that of a pointer on LP64. The
/// `_align` member reproduces that without declaring types we never use.
#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_format_fmt {
    pub pix: v4l2_pix_format,
    pub pix_mp: v4l2_pix_format_mplane,
    pub raw_data: [u8; 200],
    #[cfg(target_pointer_width = "64")]
    _align: [u64; 25],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_fmt,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_plane_m {
    pub mem_offset: u32,
    pub userptr: c_ulong,
    pub fd: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_plane {
    pub bytesused: u32,
    pub length: u32,
    pub m: v4l2_plane_m,
    pub data_offset: u32,
    pub reserved: [u32; 11],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: c_ulong,
    pub planes: *mut v4l2_plane,
    pub fd: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_exportbuffer {
    pub type_: u32,
    pub index: u32,
    pub plane: u32,
    pub flags: u32,
    pub fd: i32,
    pub reserved: [u32; 11],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_captureparm {
    pub capability: u32,
    pub capturemode: u32,
    pub timeperframe: v4l2_fract,
    pub extendedmode: u32,
    pub readbuffers: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_streamparm_parm {
    pub capture: v4l2_captureparm,
    pub raw_data: [u8; 200],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_streamparm {
    pub type_: u32,
    pub parm: v4l2_streamparm_parm,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_control {
    pub id: u32,
    pub value: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    // These mirror the sizeof values of the kernel UAPI headers. The ioctl
    // request codes encode the payload size, so any drift here breaks every
    // call at runtime with ENOTTY.
    #[test]
    fn payload_sizes_match_uapi() {
        assert_eq!(size_of::<v4l2_capability>(), 104);
        assert_eq!(size_of::<v4l2_fract>(), 8);
        assert_eq!(size_of::<v4l2_rect>(), 16);
        assert_eq!(size_of::<v4l2_cropcap>(), 44);
        assert_eq!(size_of::<v4l2_crop>(), 20);
        assert_eq!(size_of::<v4l2_pix_format>(), 48);
        assert_eq!(size_of::<v4l2_plane_pix_format>(), 20);
        assert_eq!(size_of::<v4l2_pix_format_mplane>(), 192);
        assert_eq!(size_of::<v4l2_requestbuffers>(), 20);
        assert_eq!(size_of::<v4l2_exportbuffer>(), 64);
        assert_eq!(size_of::<v4l2_captureparm>(), 40);
        assert_eq!(size_of::<v4l2_streamparm>(), 204);
        assert_eq!(size_of::<v4l2_control>(), 8);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn lp64_payload_sizes_match_uapi() {
        assert_eq!(size_of::<v4l2_format>(), 208);
        assert_eq!(align_of::<v4l2_format>(), 8);
        assert_eq!(size_of::<v4l2_buffer>(), 88);
        assert_eq!(size_of::<v4l2_plane>(), 64);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn buffer_field_offsets() {
        // Spot-check the two structs whose unions we read and write through.
        let buf: v4l2_buffer = unsafe { std::mem::zeroed() };
        let base = &buf as *const _ as usize;
        assert_eq!(&buf.index as *const _ as usize - base, 0);
        assert_eq!(&buf.sequence as *const _ as usize - base, 56);
        let plane: v4l2_plane = unsafe { std::mem::zeroed() };
        let base = &plane as *const _ as usize;
        assert_eq!(&plane.data_offset as *const _ as usize - base, 16);
    }
}
