use std::collections::{BTreeMap, VecDeque};

use log::debug;

use crate::buffer::Metadata;
use crate::config::Selection;
use crate::device::Device;
use crate::error::{CaptureError, Result};
use crate::format::Format;
use crate::io::queue::{Dequeue, Dequeued, Queue};
use crate::memory::Memory;

mod arena;
use arena::Arena;

/// The memory-mapped buffer ring and its dequeue/requeue state machine.
///
/// Slots cycle between three states: queued to the kernel, held by the
/// caller (at most one, the slot backing the most recently returned frame)
/// and parked in the pending-requeue queue. Requeueing the held slot is
/// deferred to the start of the next capture call so the caller keeps
/// exclusive read access to the returned planes for the whole inter-call
/// interval, without a copy.
pub(crate) struct Ring {
    arena: Arena,
    queue: Queue,
    pending: VecDeque<u32>,
}

impl Ring {
    /// Allocates and maps the ring, then primes every slot into the
    /// kernel's incoming queue so the driver can start filling frames the
    /// moment streaming turns on.
    pub fn new(device: &Device, format: &Format, count: u32) -> Result<Self> {
        let mut queue = Queue::new(
            device.fd(),
            format.buf_type(),
            Memory::Mmap,
            format.num_planes(),
        );
        let arena = Arena::allocate(device.fd(), &mut queue, format, count)?;

        for index in 0..queue.count() {
            queue.enqueue(index).map_err(|e| {
                CaptureError::unavailable("VIDIOC_QBUF failed while priming the ring", e)
            })?;
        }

        Ok(Ring {
            arena,
            queue,
            pending: VecDeque::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Runs one capture round under the given selection policy.
    ///
    /// Returns `None` on timeout or when no slot could be dequeued; the
    /// engine reports that as an empty frame and stays healthy.
    pub fn capture(
        &mut self,
        selection: Selection,
        frame_order: &mut u64,
    ) -> Option<(Vec<&[u8]>, Metadata)> {
        // Hand back whatever the caller was reading since the last call.
        while let Some(index) = self.pending.pop_front() {
            let _ = self.queue.enqueue(index);
        }

        if !self.queue.wait_ready() {
            debug!("no frame ready, returning an empty view");
            return None;
        }

        match selection {
            Selection::Oldest => {
                *frame_order += 1;
                match self.queue.dequeue() {
                    Dequeue::Frame(dequeued) => {
                        self.pending.push_back(dequeued.index);
                        Some(self.views(dequeued))
                    }
                    _ => None,
                }
            }
            Selection::OnlyNewest => {
                // Drain up to a full ring worth of frames; the map keeps one
                // entry per distinct microsecond, later arrivals replacing
                // earlier ones on a tie.
                let mut by_time: BTreeMap<i64, Dequeued> = BTreeMap::new();
                for _ in 0..self.arena.len() {
                    *frame_order += 1;
                    if let Dequeue::Frame(dequeued) = self.queue.dequeue() {
                        by_time.insert(dequeued.meta.timestamp.as_micros(), dequeued);
                    }
                }

                let (newest, stale) = split_newest(by_time)?;
                // The losers were never exposed to the caller, so they can
                // go straight back to the kernel.
                for dequeued in stale {
                    let _ = self.queue.enqueue(dequeued.index);
                }
                self.pending.push_back(newest.index);
                Some(self.views(newest))
            }
        }
    }

    /// Plane views of a dequeued slot, trimmed to the driver-reported
    /// payload sizes.
    fn views(&self, dequeued: Dequeued) -> (Vec<&[u8]>, Metadata) {
        let planes = self.arena.bufs[dequeued.index as usize]
            .iter()
            .zip(&dequeued.bytesused)
            .map(|(plane, &used)| {
                let mapped = plane.as_slice();
                &mapped[..(used as usize).min(mapped.len())]
            })
            .collect();
        (planes, dequeued.meta)
    }
}

/// Splits a time-ordered drain result into the newest entry and the rest.
fn split_newest<T>(mut by_time: BTreeMap<i64, T>) -> Option<(T, Vec<T>)> {
    let newest_key = *by_time.keys().next_back()?;
    let newest = by_time.remove(&newest_key).expect("key just observed");
    Some((newest, by_time.into_values().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_newest_picks_largest_timestamp() {
        let mut by_time = BTreeMap::new();
        by_time.insert(1_000_100, "a");
        by_time.insert(2_000_050, "c");
        by_time.insert(1_000_200, "b");
        let (newest, stale) = split_newest(by_time).unwrap();
        assert_eq!(newest, "c");
        assert_eq!(stale, vec!["a", "b"]);
    }

    #[test]
    fn split_newest_empty_drain() {
        assert!(split_newest::<u32>(BTreeMap::new()).is_none());
    }

    #[test]
    fn split_newest_single_entry() {
        let mut by_time = BTreeMap::new();
        by_time.insert(42, "only");
        let (newest, stale) = split_newest(by_time).unwrap();
        assert_eq!(newest, "only");
        assert!(stale.is_empty());
    }

    #[test]
    fn microsecond_ties_keep_the_later_arrival() {
        let mut by_time = BTreeMap::new();
        by_time.insert(1_000_000, "first");
        by_time.insert(1_000_000, "second");
        let (newest, stale) = split_newest(by_time).unwrap();
        assert_eq!(newest, "second");
        assert!(stale.is_empty());
    }
}
