use log::{info, warn};

use crate::buffer::Metadata;
use crate::config::{Buffering, Config, MAX_BUFFERS};
use crate::control::{Cid, ExposureMode};
use crate::device::Device;
use crate::error::{CaptureError, Result};
use crate::format::{Format, PixelFormat};
use crate::io::mmap::Ring;
use crate::io::userptr::Exchange;
use crate::memory::AlignedBuffer;

pub mod controls;

/// One captured frame: a borrowed view per plane plus driver metadata.
///
/// The views point straight into the buffer backing the frame (a kernel
/// mapping in memory-mapped mode); they stay valid and unclobbered until the
/// next capture call, which is when the underlying slot is handed back to
/// the driver. Each view is trimmed to the bytes the driver actually wrote,
/// not the plane's capacity.
#[derive(Debug, Default)]
pub struct Frame<'a> {
    planes: Vec<&'a [u8]>,
    meta: Metadata,
}

impl<'a> Frame<'a> {
    fn empty() -> Self {
        Frame::default()
    }

    /// Whether this capture round produced no payload (timeout, transient
    /// i/o error or dropped frame).
    pub fn is_empty(&self) -> bool {
        self.planes.iter().all(|plane| plane.is_empty())
    }

    pub fn planes(&self) -> &[&'a [u8]] {
        &self.planes
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }
}

/// Backing state for the two memory models; selected once at construction.
enum Io {
    Ring(Ring),
    Exchange(Exchange),
}

/// The capture engine.
///
/// Owns the device node and the buffer ring, and drives the queue/dequeue
/// protocol. Not safe for concurrent use; callers serialize on `&mut self`.
///
/// # Example
///
/// ```no_run
/// use v4lcap::{Capture, Config, PixelFormat};
///
/// let mut cap = Capture::open(Config {
///     width: 1920,
///     height: 1080,
///     fps: 30,
///     pixel_format: PixelFormat::Nv12,
///     num_buffers: 4,
///     ..Config::default()
/// })?;
/// let frame = cap.get_frame_data();
/// if !frame.is_empty() {
///     println!("{} bytes in plane 0", frame.planes()[0].len());
/// }
/// # Ok::<(), v4lcap::CaptureError>(())
/// ```
pub struct Capture {
    // Field order is drop order: buffers must unmap before the device fd
    // closes.
    io: Io,
    device: Device,
    format: Format,
    config: Config,
    frame_order: u64,
    warned_copy: bool,
}

impl Capture {
    /// Opens the configured device and brings it to a streaming state.
    ///
    /// Negotiation order: open and capability checks, crop, S_FMT (exactly
    /// once), frame rate, buffer allocation and mapping, initial queueing,
    /// STREAMON. Any failure along the way is permanent and surfaces here;
    /// after construction succeeds, capture calls only degrade, they never
    /// fail.
    pub fn open(config: Config) -> Result<Self> {
        let request = Format::request(&config)?;

        let device = Device::open(&config)?;
        device.apply_crop(config.buffer_type(), config.crop);

        let raw = device.set_format(request)?;
        let format = Format::new(raw, config.buffer_type(), config.num_planes());
        info!(
            "format negotiated: {}x{} {} ({} plane(s))",
            format.width(),
            format.height(),
            config.pixel_format,
            format.num_planes()
        );

        let chosen = controls::negotiate_fps(&device, config.buffer_type(), f64::from(config.fps));
        if chosen == 0.0 {
            info!("fps set to {}", config.fps);
        } else {
            info!("driver chose {} fps instead of {}", chosen, config.fps);
        }
        // Reasonable exposure defaults for a streaming pipeline: let the
        // device meter exposure but keep the frame rate constant.
        device.set_control(Cid::ExposureAuto, ExposureMode::AperturePriority as i32);
        device.set_control(Cid::ExposureAutoPriority, 0);

        let count = config.num_buffers.min(MAX_BUFFERS);
        let io = match config.buffering {
            Buffering::Internal => Io::Ring(Ring::new(&device, &format, count)?),
            Buffering::UserPtr => Io::Exchange(Exchange::new(&device, &format, count)?),
        };

        device
            .stream_on(config.buffer_type())
            .map_err(|e| CaptureError::unavailable("VIDIOC_STREAMON failed", e))?;

        Ok(Capture {
            io,
            device,
            format,
            config,
            frame_order: 0,
            warned_copy: false,
        })
    }

    /// Captures one frame and returns zero-copy views of its planes.
    ///
    /// Returns an empty frame when nothing is ready within the wait window;
    /// that usually means frames are being requested faster than the
    /// configured rate. In user-pointer mode this exchanges the internally
    /// allocated frames and returns a view of the one the selection policy
    /// picks.
    pub fn get_frame_data(&mut self) -> Frame<'_> {
        let selection = self.config.selection;
        let captured = match &mut self.io {
            Io::Ring(ring) => ring.capture(selection, &mut self.frame_order),
            Io::Exchange(exchange) => exchange.capture(selection, &mut self.frame_order),
        };
        match captured {
            Some((planes, meta)) => Frame { planes, meta },
            None => Frame::empty(),
        }
    }

    /// Fills caller-owned frames and reports bytes written per plane.
    ///
    /// The natural entry point in user-pointer mode: all frames are queued,
    /// the queue is drained before returning, and the result matrix has one
    /// row per frame and one column per plane. A zero row means that frame
    /// failed this round. In memory-mapped mode the kernel views are copied
    /// into the caller's buffers instead, costing one memcpy per plane.
    pub fn put_frame_data(&mut self, frames: &mut [Vec<AlignedBuffer>]) -> Vec<Vec<usize>> {
        match &mut self.io {
            Io::Exchange(exchange) => exchange.put(frames, &mut self.frame_order),
            Io::Ring(ring) => {
                if !self.warned_copy {
                    warn!(
                        "put_frame_data in memory-mapped mode copies every plane; \
                         get_frame_data avoids the copy"
                    );
                    self.warned_copy = true;
                }

                let selection = self.config.selection;
                let planes_count = self.format.num_planes();
                let mut sizes = vec![vec![0usize; planes_count]; frames.len()];
                for (frame, row) in frames.iter_mut().zip(sizes.iter_mut()) {
                    let Some((views, _)) = ring.capture(selection, &mut self.frame_order) else {
                        continue;
                    };
                    if frame.len() < views.len() {
                        warn!(
                            "caller frame carries {} plane(s), format needs {}",
                            frame.len(),
                            views.len()
                        );
                        continue;
                    }
                    for ((view, backing), size) in
                        views.iter().zip(frame.iter_mut()).zip(row.iter_mut())
                    {
                        if backing.len() < view.len() {
                            warn!(
                                "caller plane of {} bytes cannot hold {} payload bytes",
                                backing.len(),
                                view.len()
                            );
                            continue;
                        }
                        backing[..view.len()].copy_from_slice(view);
                        *size = view.len();
                    }
                }
                sizes
            }
        }
    }

    /// Allocates one frame of aligned plane buffers sized for the
    /// negotiated format, ready for [`Capture::put_frame_data`].
    pub fn alloc_frame(&self) -> Vec<AlignedBuffer> {
        (0..self.format.num_planes())
            .map(|plane| AlignedBuffer::new(self.format.plane_size(plane) as usize))
            .collect()
    }

    pub fn configuration(&self) -> &Config {
        &self.config
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.config.pixel_format
    }

    /// Frame width as negotiated with the driver (may differ from the
    /// configured width).
    pub fn width(&self) -> u32 {
        self.format.width()
    }

    /// Frame height as negotiated with the driver.
    pub fn height(&self) -> u32 {
        self.format.height()
    }

    pub fn num_planes(&self) -> usize {
        self.format.num_planes()
    }

    /// Number of buffers the driver actually granted.
    pub fn num_buffers(&self) -> usize {
        match &self.io {
            Io::Ring(ring) => ring.len(),
            Io::Exchange(exchange) => exchange.len(),
        }
    }

    /// Monotonic capture counter.
    ///
    /// Counts dequeue attempts, not delivered frames: a failed or corrupt
    /// dequeue advances it too, so it measures how often the engine went to
    /// the kernel for a frame. A capture call that times out waiting never
    /// reaches the dequeue and leaves the counter untouched.
    pub fn frame_order(&self) -> u64 {
        self.frame_order
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Err(e) = self.device.stream_off(self.config.buffer_type()) {
            warn!("VIDIOC_STREAMOFF failed: {}", e);
        }
    }
}
