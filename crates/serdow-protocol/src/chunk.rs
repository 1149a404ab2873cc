//! Segment chunking
//!
//! Only file-backed bytes are sent. Whatever lies between `file_size` and `memory_size` is
//! left to the target.
use std::fmt::Display;

use derive_ctor::ctor;
use derive_more::IsVariant;
use serdow_port::Channel;
use tracing::debug;

use crate::{Config, Result, err::Error, packet, transmit::Transmitter};

/// Loadable unit of an executable image.
#[derive(Debug, Clone, ctor)]
pub struct Segment<'a> {
    /// Segment type as named by the image reader
    pub kind: String,
    pub physical_address: u32,
    pub file_size: u32,
    pub memory_size: u32,
    /// Bytes backing the segment in the image
    pub data: &'a [u8],
}

impl Segment<'_> {
    /// Why this segment carries nothing to send, if so.
    ///
    /// Anything placed at physical address 0 is treated as boot code of the target itself.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if self.physical_address == 0 {
            Some(SkipReason::Boot)
        } else if self.file_size == 0 {
            Some(SkipReason::Empty)
        } else {
            None
        }
    }
}

impl Display for Segment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @{:08X}", self.kind, self.physical_address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum SkipReason {
    Boot,
    Empty,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boot => write!(f, "boot"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Slice of a segment sent as one data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ctor)]
pub struct Chunk {
    /// Offset into the segment's file-backed bytes
    pub offset: usize,
    pub len: usize,
    /// Target address of the first byte
    pub address: u32,
}

/// Observer for transfer progress. Every hook is optional.
pub trait Progress {
    fn skipped(&mut self, _segment: &Segment, _reason: SkipReason) {}

    /// `sent` is the number of bytes of `segment` acknowledged so far.
    fn chunk_sent(&mut self, _segment: &Segment, _chunk: &Chunk, _sent: usize) {}

    fn segment_done(&mut self, _segment: &Segment) {}

    fn entry_sent(&mut self, _entry: u32) {}
}

impl Progress for () {}

/// Share of `total` covered by `sent`, rounded down.
pub fn percent(sent: usize, total: usize) -> usize {
    if total == 0 { 100 } else { sent * 100 / total }
}

/// Totals of one [`Chunker::send_segments`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sent {
    pub packets: usize,
    pub bytes: usize,
    pub attempts: usize,
    pub segments: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, ctor)]
pub struct Chunker {
    config: Config,
}

impl Chunker {
    /// Split `file_size` bytes placed at `address` into packet-sized chunks, lowest offset first.
    pub fn plan(&self, address: u32, file_size: usize) -> impl Iterator<Item = Chunk> {
        let max = self.config.max_packet_len.max(1);
        (0..file_size).step_by(max).map(move |offset| {
            Chunk::new(
                offset,
                max.min(file_size - offset),
                address.wrapping_add(offset as u32),
            )
        })
    }

    /// Send every loadable segment in order.
    ///
    /// The first failed packet aborts the whole transfer.
    pub fn send_segments<C: Channel, P: Progress>(
        &self,
        transmitter: &mut Transmitter<C>,
        segments: &[Segment],
        progress: &mut P,
    ) -> Result<Sent> {
        let mut sent = Sent::default();

        for segment in segments {
            if let Some(reason) = segment.skip_reason() {
                debug!("skipping {reason} section {segment}");
                progress.skipped(segment, reason);
                sent.skipped += 1;
                continue;
            }

            let (packets, attempts) = self.send_segment(transmitter, segment, progress)?;
            sent.packets += packets;
            sent.attempts += attempts;
            sent.bytes += segment.file_size as usize;
            sent.segments += 1;
            progress.segment_done(segment);
        }

        Ok(sent)
    }

    fn send_segment<C: Channel, P: Progress>(
        &self,
        transmitter: &mut Transmitter<C>,
        segment: &Segment,
        progress: &mut P,
    ) -> Result<(usize, usize)> {
        let file_size = segment.file_size as usize;
        if segment.data.len() < file_size {
            return Err(Error::SegmentTruncated {
                address: segment.physical_address,
                file_size: segment.file_size,
                available: segment.data.len(),
            });
        }
        if u64::from(segment.physical_address) + file_size as u64 - 1 > u64::from(u32::MAX) {
            return Err(Error::AddressOverflow(segment.physical_address, file_size));
        }

        let mut packets = 0;
        let mut attempts = 0;
        for chunk in self.plan(segment.physical_address, file_size) {
            let payload = &segment.data[chunk.offset..chunk.offset + chunk.len];
            let delivery = transmitter.send(&packet::frame(&self.config, chunk.address, payload))?;

            packets += 1;
            attempts += delivery.attempts;
            progress.chunk_sent(segment, &chunk, chunk.offset + chunk.len);
        }

        Ok((packets, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_packet_len: usize) -> Chunker {
        Chunker::new(Config::new(crate::MAGIC, max_packet_len, 10))
    }

    #[test]
    fn plan_covers_segment_in_order() {
        for (size, max) in [(1, 1024), (1024, 1024), (1025, 1024), (1500, 1024), (4096, 512), (7, 3)] {
            let chunks: Vec<_> = chunker(max).plan(0x1000, size).collect();

            assert_eq!(chunks.len(), size.div_ceil(max));
            let mut next = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.offset, next);
                assert_eq!(chunk.address, 0x1000 + next as u32);
                if i + 1 != chunks.len() {
                    assert_eq!(chunk.len, max);
                }
                next += chunk.len;
            }
            assert_eq!(next, size);
        }
    }

    #[test]
    fn plan_of_empty_segment_is_empty() {
        assert_eq!(chunker(1024).plan(0x1000, 0).count(), 0);
    }

    #[test]
    fn skip_reasons() {
        let data = [0u8; 4];
        let boot = Segment::new("LOAD".into(), 0, 4, 4, &data);
        let empty = Segment::new("LOAD".into(), 0x1000, 0, 0x100, &data[..0]);
        let bss_only = Segment::new("LOAD".into(), 0, 0, 0x100, &data[..0]);
        let load = Segment::new("LOAD".into(), 0x1000, 4, 8, &data);

        assert_eq!(boot.skip_reason(), Some(SkipReason::Boot));
        assert_eq!(empty.skip_reason(), Some(SkipReason::Empty));
        assert_eq!(bss_only.skip_reason(), Some(SkipReason::Boot));
        assert_eq!(load.skip_reason(), None);
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(percent(1024, 1500), 68);
        assert_eq!(percent(1500, 1500), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn segment_description() {
        let segment = Segment::new("LOAD".into(), 0x08000000, 0, 0, &[]);
        assert_eq!(segment.to_string(), "LOAD @08000000");
    }
}
