use std::os::raw::c_ulong;

use log::{debug, info, warn};

use crate::buffer::Metadata;
use crate::config::Selection;
use crate::device::Device;
use crate::error::{CaptureError, Result};
use crate::format::Format;
use crate::io::queue::{Dequeue, Queue};
use crate::memory::{AlignedBuffer, Memory};

/// The user-pointer exchange.
///
/// No long-lived kernel state: every capture call queues the caller's plane
/// buffers, waits for readiness and drains exactly as many buffers as were
/// queued, so the kernel never holds a user pointer across calls. The
/// exchange also owns a set of internally allocated frames so pull-style
/// capture works in this mode too.
pub(crate) struct Exchange {
    queue: Queue,
    plane_sizes: Vec<u32>,
    bufs: Vec<Vec<AlignedBuffer>>,
}

impl Exchange {
    pub fn new(device: &Device, format: &Format, count: u32) -> Result<Self> {
        let mut queue = Queue::new(
            device.fd(),
            format.buf_type(),
            Memory::UserPtr,
            format.num_planes(),
        );
        let granted = queue.request(count).map_err(|e| {
            CaptureError::unavailable(
                "VIDIOC_REQBUFS failed; the device may not support user pointer i/o",
                e,
            )
        })?;
        if granted < 1 {
            return Err(CaptureError::InsufficientBuffers {
                requested: count,
                granted,
            });
        }
        queue.set_count(granted);
        info!("driver granted {} of {} requested buffers", granted, count);

        let plane_sizes: Vec<u32> = (0..format.num_planes())
            .map(|plane| format.plane_size(plane))
            .collect();
        let bufs = (0..granted)
            .map(|_| {
                plane_sizes
                    .iter()
                    .map(|&size| AlignedBuffer::new(size as usize))
                    .collect()
            })
            .collect();

        Ok(Exchange {
            queue,
            plane_sizes,
            bufs,
        })
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    /// Runs one transactional exchange over caller-owned frames.
    pub fn put(&self, frames: &mut [Vec<AlignedBuffer>], frame_order: &mut u64) -> Vec<Vec<usize>> {
        exchange(&self.queue, &self.plane_sizes, frames, frame_order).0
    }

    /// Pull-style capture over the internally allocated frames.
    pub fn capture(
        &mut self,
        selection: Selection,
        frame_order: &mut u64,
    ) -> Option<(Vec<&[u8]>, Metadata)> {
        let Exchange {
            queue,
            plane_sizes,
            bufs,
        } = self;
        let (sizes, metas) = exchange(queue, plane_sizes, bufs, frame_order);
        if sizes.is_empty() {
            return None;
        }

        let row = match selection {
            Selection::Oldest => 0,
            Selection::OnlyNewest => sizes.len() - 1,
        };
        let views = bufs[row]
            .iter()
            .zip(&sizes[row])
            .map(|(plane, &used)| &plane[..used.min(plane.len())])
            .collect();
        Some((views, metas[row]))
    }
}

/// Queues every adequately sized frame, waits for readiness, then drains
/// exactly the queued count. Returns the `[frames][planes]` byte matrix and
/// the per-frame metadata; rows that failed to queue or drain stay zero.
fn exchange(
    queue: &Queue,
    plane_sizes: &[u32],
    frames: &mut [Vec<AlignedBuffer>],
    frame_order: &mut u64,
) -> (Vec<Vec<usize>>, Vec<Metadata>) {
    let planes_count = plane_sizes.len();
    let mut sizes = vec![vec![0usize; planes_count]; frames.len()];
    let mut metas = vec![Metadata::default(); frames.len()];

    let mut queued = 0usize;
    for (index, frame) in frames.iter_mut().enumerate() {
        *frame_order += 1;

        let under_provisioned = frame.len() < planes_count
            || frame
                .iter()
                .zip(plane_sizes)
                .any(|(plane, &need)| plane.len() < need as usize);
        if under_provisioned {
            warn!(
                "user frame {} is smaller than the negotiated format requires, skipping",
                index
            );
            continue;
        }

        let mut planes = queue.plane_array();
        let mut buf = queue.payload(&mut planes);
        buf.index = index as u32;
        if queue.planar() {
            for (plane, (backing, &size)) in planes
                .iter_mut()
                .zip(frame.iter_mut().zip(plane_sizes))
                .take(planes_count)
            {
                plane.m.userptr = backing.as_mut_ptr() as c_ulong;
                plane.length = size;
                plane.data_offset = 0;
            }
        } else {
            buf.m.userptr = frame[0].as_mut_ptr() as c_ulong;
            buf.length = plane_sizes[0];
        }

        if queue.enqueue_payload(&mut buf).is_ok() {
            queued += 1;
        }
    }

    if queued == 0 {
        return (sizes, metas);
    }

    if !queue.wait_ready() {
        debug!("frames requested faster than the configured rate, drain may stall");
    }

    // Drain everything we queued: the kernel must not keep a user pointer
    // past this call.
    let mut drained = 0usize;
    while drained < queued {
        match queue.dequeue() {
            Dequeue::Frame(dequeued) => {
                drained += 1;
                let row = dequeued.index as usize;
                if row < sizes.len() {
                    for (size, &used) in sizes[row]
                        .iter_mut()
                        .zip(dequeued.bytesused.iter())
                        .take(planes_count)
                    {
                        *size = used as usize;
                    }
                    metas[row] = dequeued.meta;
                }
            }
            // Not ready yet: wait another round without consuming a slot.
            Dequeue::NotReady => {
                queue.wait_ready();
            }
            Dequeue::Corrupted | Dequeue::Failed => {
                drained += 1;
            }
        }
    }

    (sizes, metas)
}
