//! Zero-copy video capture for Video4Linux2 devices.
//!
//! This crate drives the V4L2 streaming i/o protocol directly: it opens a
//! camera node, negotiates a pixel format and frame rate, sets up a ring of
//! kernel-shared buffers and cycles them through the QBUF/DQBUF protocol,
//! handing out per-plane views of each frame without copying.
//!
//! Two memory models are supported behind one interface. With internal
//! buffering the kernel allocates the ring and the engine maps it
//! ([`Capture::get_frame_data`] returns views into those mappings, exported
//! as DMA-BUFs when the driver cooperates). With user-pointer buffering the
//! caller owns the memory and hands it to the kernel for every frame
//! ([`Capture::put_frame_data`]).

#[cfg(not(target_os = "linux"))]
compile_error!("this crate talks to the V4L2 kernel interface and only builds on Linux");

pub mod v4l2;

mod buffer;
pub use buffer::{Flags as BufferFlags, Metadata, Type as BufferType};

mod capability;
pub use capability::Capabilities;

mod capture;
pub use capture::{Capture, Frame};

mod config;
pub use config::{Buffering, Config, CropRect, Selection, MAX_BUFFERS};

mod control;
pub use control::{Cid, ExposureMode};

mod device;

mod error;
pub use error::{CaptureError, Result};

mod format;
pub use format::{Format, PixelFormat};

mod fourcc;
pub use fourcc::FourCC;

mod fraction;
pub use fraction::Fraction;

mod io;

mod memory;
pub use memory::{AlignedBuffer, Memory, PLANE_ALIGNMENT};

mod select;

mod timestamp;
pub use timestamp::Timestamp;
