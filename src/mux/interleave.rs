//! Cross-stream interleaving in front of a container writer.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::Muxer;
use crate::error::Result;
use crate::pipeline::types::{EncodedPacket, TimeBase, compare_ts};

/// Reorders packets from several streams into one dts-ordered sequence.
///
/// Each stream is already in dts order on its own. A packet is released once
/// every stream has something queued and it is the earliest of the queue
/// heads; whatever is left is released in order before the trailer.
pub struct Interleaver {
    inner: Box<dyn Muxer>,
    queues: Vec<VecDeque<EncodedPacket>>,
}

impl Interleaver {
    pub fn new(inner: Box<dyn Muxer>) -> Self {
        let queues = (0..inner.stream_count()).map(|_| VecDeque::new()).collect();
        Self { inner, queues }
    }

    /// Packets held back waiting for another stream
    pub fn queued(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Index of the queue whose head has the earliest timestamp.
    fn earliest(&self) -> Option<usize> {
        let mut best: Option<(usize, &EncodedPacket)> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            let Some(head) = queue.front() else {
                continue;
            };
            best = match best {
                Some((_, current)) if !precedes(head, current) => best,
                _ => Some((index, head)),
            };
        }
        best.map(|(index, _)| index)
    }

    fn release(&mut self, all: bool) -> Result<()> {
        while all || self.queues.iter().all(|q| !q.is_empty()) {
            let Some(index) = self.earliest() else {
                break;
            };
            if let Some(packet) = self.queues[index].pop_front() {
                self.inner.write_packet(packet)?;
            }
        }
        Ok(())
    }
}

/// Whether `a` has to be written before `b`. Untimed packets go first.
fn precedes(a: &EncodedPacket, b: &EncodedPacket) -> bool {
    match (a.ordering_ts(), b.ordering_ts()) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a_ts), Some(b_ts)) => {
            compare_ts(a_ts, a.time_base, b_ts, b.time_base) == Ordering::Less
        }
    }
}

impl Muxer for Interleaver {
    fn stream_count(&self) -> usize {
        self.inner.stream_count()
    }

    fn write_header(&mut self) -> Result<()> {
        self.inner.write_header()
    }

    fn stream_time_base(&self, stream_index: usize) -> Result<TimeBase> {
        self.inner.stream_time_base(stream_index)
    }

    fn write_packet(&mut self, packet: EncodedPacket) -> Result<()> {
        match self.queues.get_mut(packet.stream_index) {
            Some(queue) => queue.push_back(packet),
            // not one of ours, let the container reject it
            None => return self.inner.write_packet(packet),
        }
        self.release(false)
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.release(true)?;
        self.inner.write_trailer()
    }
}
