use std::os::unix::io::RawFd;
use std::time::Duration;
use std::{io, mem};

use log::{debug, error};

use crate::buffer::{self, Metadata};
use crate::memory::Memory;
use crate::select::{make_timeval, select, FdSet};
use crate::v4l2;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// How long a capture call waits for the device fd to become readable
/// before giving up and reporting an empty frame.
pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_millis(200);

/// One successfully dequeued buffer.
#[derive(Debug, Clone)]
pub(crate) struct Dequeued {
    /// Ring slot the kernel handed back.
    pub index: u32,
    /// Bytes of payload per plane, as reported by the driver.
    pub bytesused: Vec<u32>,
    pub meta: Metadata,
}

/// Outcome of a single DQBUF attempt.
pub(crate) enum Dequeue {
    Frame(Dequeued),
    /// The outgoing queue is empty (EAGAIN).
    NotReady,
    /// Transient i/o error, the frame is lost but streaming continues (EIO).
    Corrupted,
    /// Hard failure or an out-of-range slot index; already logged.
    Failed,
}

/// QBUF/DQBUF plumbing shared by both memory models.
///
/// Owns no buffers itself; it only knows how to build the ioctl payloads for
/// the negotiated buffer type and how to classify errnos the way a capture
/// loop needs them.
pub(crate) struct Queue {
    fd: RawFd,
    buf_type: buffer::Type,
    memory: Memory,
    num_planes: usize,
    /// Number of slots the driver granted; dequeued indices are validated
    /// against this.
    count: u32,
}

impl Queue {
    pub fn new(fd: RawFd, buf_type: buffer::Type, memory: Memory, num_planes: usize) -> Self {
        Queue {
            fd,
            buf_type,
            memory,
            num_planes,
            count: 0,
        }
    }

    pub fn set_count(&mut self, count: u32) {
        self.count = count;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn planar(&self) -> bool {
        self.buf_type.planar()
    }

    /// Requests `count` buffers from the driver, returning how many it
    /// actually granted.
    pub fn request(&self, count: u32) -> io::Result<u32> {
        let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = self.buf_type as u32;
        req.memory = self.memory as u32;
        unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_REQBUFS,
                &mut req as *mut _ as *mut std::os::raw::c_void,
            )?;
        }
        Ok(req.count)
    }

    /// Zero-initialised ioctl payload for this queue. For the multi-plane
    /// interface the payload references the caller-provided plane array,
    /// which must stay alive for the duration of the ioctl.
    pub fn payload(&self, planes: &mut [v4l2_plane]) -> v4l2_buffer {
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = self.buf_type as u32;
        buf.memory = self.memory as u32;
        if self.buf_type.planar() {
            buf.length = self.num_planes as u32;
            buf.m.planes = planes.as_mut_ptr();
        }
        buf
    }

    /// Fresh zeroed plane array sized for this queue's format.
    pub fn plane_array(&self) -> Vec<v4l2_plane> {
        vec![unsafe { mem::zeroed() }; self.num_planes]
    }

    /// Waits for the device to signal a ready frame.
    ///
    /// Returns false on timeout and on EINTR; the caller treats both as "no
    /// frame this round".
    pub fn wait_ready(&self) -> bool {
        let mut fds = FdSet::new();
        fds.set(self.fd);
        let mut timeout = make_timeval(WAIT_TIMEOUT);

        match select(self.fd + 1, Some(&mut fds), None, None, Some(&mut timeout)) {
            Ok(0) => {
                debug!("select() timeout on fd {}", self.fd);
                false
            }
            Ok(_) => true,
            Err(e) if e.raw_os_error() == Some(libc::EINTR) => {
                debug!("select() interrupted");
                false
            }
            Err(e) => {
                error!("select() failed: {}", e);
                false
            }
        }
    }

    /// Hands a ring slot back to the driver's incoming queue.
    ///
    /// The error is logged here so capture paths can ignore the result;
    /// construction propagates it instead.
    pub fn enqueue(&self, index: u32) -> io::Result<()> {
        let mut planes = self.plane_array();
        let mut buf = self.payload(&mut planes);
        buf.index = index;
        let res = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_QBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if let Err(ref e) = res {
            error!("VIDIOC_QBUF failed for buffer {}: {}", index, e);
        }
        res
    }

    /// Submits a fully populated payload (user-pointer queueing).
    pub fn enqueue_payload(&self, buf: &mut v4l2_buffer) -> io::Result<()> {
        let res = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_QBUF,
                buf as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if let Err(ref e) = res {
            error!("VIDIOC_QBUF failed for buffer {}: {}", buf.index, e);
        }
        res
    }

    /// Removes one buffer from the driver's outgoing queue.
    pub fn dequeue(&self) -> Dequeue {
        let mut planes = self.plane_array();
        let mut buf = self.payload(&mut planes);
        let res = unsafe {
            v4l2::ioctl(
                self.fd,
                vidioc::VIDIOC_DQBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )
        };

        if let Err(e) = res {
            return match e.raw_os_error() {
                Some(libc::EAGAIN) => Dequeue::NotReady,
                Some(libc::EIO) => {
                    debug!("VIDIOC_DQBUF: i/o error, skipping frame");
                    Dequeue::Corrupted
                }
                _ => {
                    error!("VIDIOC_DQBUF failed: {}", e);
                    Dequeue::Failed
                }
            };
        }

        if buf.index >= self.count {
            error!(
                "VIDIOC_DQBUF returned out-of-range buffer index {} (ring size {})",
                buf.index, self.count
            );
            return Dequeue::Failed;
        }

        let bytesused = if self.buf_type.planar() {
            planes.iter().map(|p| p.bytesused).collect()
        } else {
            vec![buf.bytesused]
        };

        Dequeue::Frame(Dequeued {
            index: buf.index,
            bytesused,
            meta: Metadata {
                timestamp: buf.timestamp.into(),
                sequence: buf.sequence,
                flags: buf.flags.into(),
                field: buf.field,
            },
        })
    }
}
