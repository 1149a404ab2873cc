//! In-memory link between the host side and the target model.

use std::collections::VecDeque;

use serdow_port::Channel;
use serdow_protocol::{Chunk, Config, Progress, Segment, SkipReason, Target};

/// What goes wrong on a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip the bits of this byte of the packet on its way to the target
    Corrupt(usize),
    /// The target's reply never arrives
    DropReply,
}

pub struct Wire {
    pub target: Target,
    pub writes: Vec<Vec<u8>>,
    pub resets: usize,
    inbound: VecDeque<u8>,
    /// Faults by write index
    faults: Vec<(usize, Fault)>,
}

impl Wire {
    pub fn new(config: Config) -> Self {
        Self {
            target: Target::new(config),
            writes: Vec::new(),
            resets: 0,
            inbound: VecDeque::new(),
            faults: Vec::new(),
        }
    }

    pub fn with_fault(mut self, write: usize, fault: Fault) -> Self {
        self.faults.push((write, fault));
        self
    }
}

impl Channel for Wire {
    fn write(&mut self, buf: &[u8]) -> serdow_port::Result<()> {
        let index = self.writes.len();
        self.writes.push(buf.to_vec());

        let fault = self
            .faults
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, fault)| *fault);

        let mut bytes = buf.to_vec();
        if let Some(Fault::Corrupt(at)) = fault {
            bytes[at] = !bytes[at];
        }
        let reply = self.target.feed(&bytes);
        if fault != Some(Fault::DropReply) {
            self.inbound.extend(reply);
        }

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> serdow_port::Result<usize> {
        let n = buf.len().min(self.inbound.len());
        for (dst, src) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn reset_input_buffer(&mut self) -> serdow_port::Result<()> {
        self.resets += 1;
        self.inbound.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Skipped(String, SkipReason),
    Chunk { address: u32, len: usize, percent: usize },
    Done(String),
    Entry(u32),
}

#[derive(Default)]
pub struct Recorder(pub Vec<Event>);

impl Progress for Recorder {
    fn skipped(&mut self, segment: &Segment, reason: SkipReason) {
        self.0.push(Event::Skipped(segment.to_string(), reason));
    }

    fn chunk_sent(&mut self, segment: &Segment, chunk: &Chunk, sent: usize) {
        self.0.push(Event::Chunk {
            address: chunk.address,
            len: chunk.len,
            percent: serdow_protocol::chunk::percent(sent, segment.file_size as usize),
        });
    }

    fn segment_done(&mut self, segment: &Segment) {
        self.0.push(Event::Done(segment.to_string()));
    }

    fn entry_sent(&mut self, entry: u32) {
        self.0.push(Event::Entry(entry));
    }
}

pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 256) as u8).collect()
}
