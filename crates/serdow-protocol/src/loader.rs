//! Whole-image transfer: every segment, then the entry packet.
use std::fmt::Display;

use derive_ctor::ctor;
use serdow_port::Channel;
use tracing::info;

use crate::{
    Result,
    chunk::{Chunker, Progress, Segment},
    packet,
    transmit::{Delivery, Transmitter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Data packets, the entry packet not included
    pub packets: usize,
    pub bytes: usize,
    /// Extra attempts over all packets, the entry packet included
    pub resends: usize,
    pub segments: usize,
    pub skipped: usize,
    pub entry: u32,
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bytes in {} packets ({} resent) from {} segments, {} skipped, entry 0x{:08x}",
            self.bytes,
            self.packets,
            self.resends,
            self.segments,
            self.skipped,
            self.entry
        )
    }
}

#[derive(ctor)]
pub struct Loader<C: Channel, P: Progress> {
    transmitter: Transmitter<C>,
    progress: P,
}

impl<C: Channel, P: Progress> Loader<C, P> {
    /// Send all loadable `segments`, then announce `entry`.
    pub fn load(&mut self, segments: &[Segment], entry: u32) -> Result<Summary> {
        let chunker = Chunker::new(*self.transmitter.config());
        let sent = chunker.send_segments(&mut self.transmitter, segments, &mut self.progress)?;
        let delivery = self.announce_entry(entry)?;

        let summary = Summary {
            packets: sent.packets,
            bytes: sent.bytes,
            resends: (sent.attempts - sent.packets) + (delivery.attempts - 1),
            segments: sent.segments,
            skipped: sent.skipped,
            entry,
        };
        info!("{summary}");
        Ok(summary)
    }

    /// Send the zero-length packet that starts the program at `entry`.
    pub fn announce_entry(&mut self, entry: u32) -> Result<Delivery> {
        let packet = packet::entry(self.transmitter.config(), entry);
        let delivery = self.transmitter.send(&packet)?;
        self.progress.entry_sent(entry);
        Ok(delivery)
    }

    pub fn into_parts(self) -> (Transmitter<C>, P) {
        (self.transmitter, self.progress)
    }
}
