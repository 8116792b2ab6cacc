use std::os::unix::io::RawFd;
use std::{mem, ptr, slice};

use log::{debug, info, warn};

use crate::error::{CaptureError, Result};
use crate::format::Format;
use crate::io::queue::Queue;
use crate::v4l2;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// One kernel buffer plane mapped into our address space.
///
/// When the driver exports the plane as a DMA-BUF we map through that fd at
/// offset zero and keep the fd for the lifetime of the mapping; otherwise we
/// map through the device fd at the queried offset. Either way the mapping
/// is shared with the kernel, so the slice must only be read while its slot
/// is not queued.
pub(crate) struct MappedPlane {
    ptr: *mut u8,
    len: usize,
    dmabuf: Option<RawFd>,
}

impl MappedPlane {
    /// The mapped region, in full. Capture paths slice it down to the
    /// driver-reported payload size.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for MappedPlane {
    fn drop(&mut self) {
        // Unmap before closing the export fd backing the mapping.
        if let Err(e) = unsafe { v4l2::munmap(self.ptr as *mut std::os::raw::c_void, self.len) } {
            warn!("munmap failed: {}", e);
        }
        if let Some(fd) = self.dmabuf {
            if let Err(e) = v4l2::close(fd) {
                warn!("closing DMA-BUF fd {} failed: {}", fd, e);
            }
        }
    }
}

/// The ring of kernel-owned buffers, mapped plane by plane.
pub(crate) struct Arena {
    pub bufs: Vec<Vec<MappedPlane>>,
}

impl Arena {
    /// Requests the ring from the driver and maps every plane.
    ///
    /// DMA-BUF export is opportunistic: the first EXPBUF failure disables
    /// further attempts and all remaining planes map through the device fd.
    pub fn allocate(fd: RawFd, queue: &mut Queue, format: &Format, count: u32) -> Result<Self> {
        let granted = queue
            .request(count)
            .map_err(|e| CaptureError::unavailable("VIDIOC_REQBUFS failed", e))?;
        if granted < 1 {
            return Err(CaptureError::InsufficientBuffers {
                requested: count,
                granted,
            });
        }
        queue.set_count(granted);
        info!("driver granted {} of {} requested buffers", granted, count);

        let planar = format.buf_type().planar();
        let mut dmabuf_available = true;
        let mut bufs = Vec::with_capacity(granted as usize);

        for index in 0..granted {
            let mut planes = queue.plane_array();
            let mut buf = queue.payload(&mut planes);
            buf.index = index;
            if !planar {
                buf.length = format.plane_size(0);
            }
            unsafe {
                v4l2::ioctl(
                    fd,
                    vidioc::VIDIOC_QUERYBUF,
                    &mut buf as *mut _ as *mut std::os::raw::c_void,
                )
            }
            .map_err(|e| CaptureError::unavailable("VIDIOC_QUERYBUF failed", e))?;

            let mut mapped = Vec::with_capacity(format.num_planes());
            for plane in 0..format.num_planes() {
                let (len, offset) = if planar {
                    (planes[plane].length as usize, unsafe {
                        planes[plane].m.mem_offset
                    })
                } else {
                    (buf.length as usize, unsafe { buf.m.offset })
                };

                let dmabuf = if dmabuf_available {
                    match export_plane(fd, buf.type_, index, plane as u32) {
                        Ok(export_fd) => {
                            debug!("DMA-BUF fd for buffer {} plane {} is {}", index, plane, export_fd);
                            Some(export_fd)
                        }
                        Err(e) => {
                            info!("VIDIOC_EXPBUF: {}; falling back to device-offset mmap", e);
                            dmabuf_available = false;
                            None
                        }
                    }
                } else {
                    None
                };

                let (map_fd, map_offset) = match dmabuf {
                    Some(export_fd) => (export_fd, 0),
                    None => (fd, offset as libc::off_t),
                };
                let ptr = unsafe {
                    v4l2::mmap(
                        ptr::null_mut(),
                        len,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_SHARED,
                        map_fd,
                        map_offset,
                    )
                }
                .map_err(|e| {
                    // The fd would leak without a MappedPlane to own it.
                    if let Some(export_fd) = dmabuf {
                        let _ = v4l2::close(export_fd);
                    }
                    CaptureError::MapFailure {
                        index,
                        plane,
                        source: e,
                    }
                })?;

                mapped.push(MappedPlane {
                    ptr: ptr as *mut u8,
                    len,
                    dmabuf,
                });
            }
            bufs.push(mapped);
        }

        Ok(Arena { bufs })
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }
}

fn export_plane(fd: RawFd, buf_type: u32, index: u32, plane: u32) -> std::io::Result<RawFd> {
    let mut expbuf: v4l2_exportbuffer = unsafe { mem::zeroed() };
    expbuf.type_ = buf_type;
    expbuf.index = index;
    expbuf.plane = plane;
    expbuf.flags = (libc::O_CLOEXEC | libc::O_RDWR) as u32;
    unsafe {
        v4l2::ioctl(
            fd,
            vidioc::VIDIOC_EXPBUF,
            &mut expbuf as *mut _ as *mut std::os::raw::c_void,
        )?;
    }
    Ok(expbuf.fd)
}
