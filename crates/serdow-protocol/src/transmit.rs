//! Reliable packet delivery
//!
//! Each attempt walks `Idle -> Sent -> Verifying` and ends in `Success`, `Retry` or, once the
//! attempt budget is spent, `Exhausted`.
use derive_ctor::ctor;
use derive_more::IsVariant;
use serdow_port::{Channel, Reply};
use thiserror::Error as TError;
use tracing::{debug, warn};

use crate::{Config, Result, err::Error};

/// Why an attempt was not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TError, IsVariant)]
pub enum Mismatch {
    #[error("Received wrong checksum ({received:#010X} instead of {expected:#010X})")]
    ChecksumMismatch { expected: u32, received: u32 },
    #[error("Target sent {received} bytes instead of 4")]
    ShortReply { received: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum State {
    /// Ready to (re)send, input buffer not yet reset.
    Idle { attempt: usize },
    /// Packet written, checksum known.
    Sent { attempt: usize, checksum: u32 },
    /// Reply read, not yet compared.
    Verifying {
        attempt: usize,
        checksum: u32,
        reply: Reply<u32>,
    },
    Success { attempt: usize, checksum: u32 },
    Retry { attempt: usize, mismatch: Mismatch },
    Exhausted,
}

/// Acknowledged packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ctor)]
pub struct Delivery {
    /// Attempts it took, starting at 1.
    pub attempts: usize,
    /// CRC-32 of the packet, as echoed by the target.
    pub checksum: u32,
}

/// Sends packets over `C` and waits for the matching checksum.
#[derive(ctor)]
pub struct Transmitter<C: Channel> {
    channel: C,
    config: Config,
}

impl<C: Channel> Transmitter<C> {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give the channel back, e.g. to relay target output.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Deliver `packet`, resending it until the target echoes its CRC-32.
    ///
    /// Fails with [`Error::RetriesExhausted`] after `max_send_tries` unacknowledged attempts.
    /// Channel errors are not retried.
    pub fn send(&mut self, packet: &[u8]) -> Result<Delivery> {
        let mut state = if self.config.max_send_tries == 0 {
            State::Exhausted
        } else {
            State::Idle { attempt: 1 }
        };

        loop {
            state = match state {
                State::Idle { attempt } => {
                    /* A late reply to the previous attempt must not be taken for this one */
                    self.channel.reset_input_buffer()?;
                    self.channel.write(packet)?;
                    State::Sent {
                        attempt,
                        checksum: crc32fast::hash(packet),
                    }
                }
                State::Sent { attempt, checksum } => State::Verifying {
                    attempt,
                    checksum,
                    reply: self.channel.try_read_u32_le()?,
                },
                State::Verifying {
                    attempt,
                    checksum,
                    reply,
                } => verify(attempt, checksum, reply),
                State::Retry { attempt, mismatch } => {
                    warn!(attempt, "{mismatch}");
                    if attempt < self.config.max_send_tries {
                        State::Idle {
                            attempt: attempt + 1,
                        }
                    } else {
                        State::Exhausted
                    }
                }
                State::Success { attempt, checksum } => {
                    debug!(attempt, "acknowledged with {checksum:#010x}");
                    return Ok(Delivery::new(attempt, checksum));
                }
                State::Exhausted => {
                    return Err(Error::RetriesExhausted {
                        tries: self.config.max_send_tries,
                    });
                }
            }
        }
    }
}

fn verify(attempt: usize, checksum: u32, reply: Reply<u32>) -> State {
    match reply {
        Reply::Complete(received) if received == checksum => State::Success { attempt, checksum },
        Reply::Complete(received) => State::Retry {
            attempt,
            mismatch: Mismatch::ChecksumMismatch {
                expected: checksum,
                received,
            },
        },
        Reply::Short(received) => State::Retry {
            attempt,
            mismatch: Mismatch::ShortReply { received },
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Answers the n-th write with the n-th scripted reply.
    #[derive(Default)]
    struct Scripted {
        replies: VecDeque<Vec<u8>>,
        inbound: VecDeque<u8>,
        resets: usize,
        writes: Vec<Vec<u8>>,
    }

    impl Channel for Scripted {
        fn write(&mut self, buf: &[u8]) -> serdow_port::Result<()> {
            self.writes.push(buf.to_vec());
            if let Some(reply) = self.replies.pop_front() {
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

    const PACKET: &[u8] = b"\xAA\x55\xAA\x55\x02\x00\x00\x00\x00\x10\x00\x00hi";

    fn transmitter(replies: Vec<Vec<u8>>) -> Transmitter<Scripted> {
        Transmitter::new(
            Scripted {
                replies: replies.into(),
                ..Default::default()
            },
            Config::default(),
        )
    }

    fn good() -> Vec<u8> {
        crc32fast::hash(PACKET).to_le_bytes().to_vec()
    }

    fn bad() -> Vec<u8> {
        (!crc32fast::hash(PACKET)).to_le_bytes().to_vec()
    }

    #[test]
    fn succeeds_on_kth_attempt() {
        for k in 1..=MAX_TRIES {
            let mut replies = vec![bad(); k - 1];
            replies.push(good());
            let mut tx = transmitter(replies);

            let delivery = tx.send(PACKET).unwrap();
            assert_eq!(delivery.attempts, k);
            assert_eq!(delivery.checksum, crc32fast::hash(PACKET));

            let channel = tx.into_inner();
            assert_eq!(channel.resets, k);
            assert_eq!(channel.writes.len(), k);
            assert!(channel.writes.iter().all(|w| w == PACKET));
        }
    }

    #[test]
    fn gives_up_after_exactly_max_tries() {
        let mut tx = transmitter(vec![bad(); 20]);
        assert!(matches!(
            tx.send(PACKET),
            Err(Error::RetriesExhausted { tries: 10 })
        ));

        let channel = tx.into_inner();
        assert_eq!(channel.writes.len(), MAX_TRIES);
        assert_eq!(channel.resets, MAX_TRIES);
    }

    #[test]
    fn silent_target_exhausts_tries() {
        let mut tx = transmitter(vec![]);
        assert!(tx.send(PACKET).is_err());
        assert_eq!(tx.into_inner().writes.len(), MAX_TRIES);
    }

    #[test]
    fn short_reply_is_retried() {
        let mut tx = transmitter(vec![good()[..3].to_vec(), good()]);
        assert_eq!(tx.send(PACKET).unwrap().attempts, 2);
    }

    #[test]
    fn stale_reply_is_discarded() {
        let mut tx = transmitter(vec![vec![], good()]);
        tx.channel_mut().inbound.extend(good());

        assert_eq!(tx.send(PACKET).unwrap().attempts, 2);
    }

    #[test]
    fn honours_configured_tries() {
        let mut tx = Transmitter::new(
            Scripted {
                replies: vec![bad(); 5].into(),
                ..Default::default()
            },
            Config::new(crate::MAGIC, 1024, 3),
        );
        assert!(matches!(
            tx.send(PACKET),
            Err(Error::RetriesExhausted { tries: 3 })
        ));
        assert_eq!(tx.into_inner().writes.len(), 3);
    }

    #[test]
    fn verify_classifies_replies() {
        assert!(verify(1, 7, Reply::Complete(7)).is_success());
        assert_eq!(
            verify(2, 7, Reply::Complete(8)),
            State::Retry {
                attempt: 2,
                mismatch: Mismatch::ChecksumMismatch {
                    expected: 7,
                    received: 8
                }
            }
        );
        assert_eq!(
            verify(3, 7, Reply::Short(1)),
            State::Retry {
                attempt: 3,
                mismatch: Mismatch::ShortReply { received: 1 }
            }
        );
    }

    #[test]
    fn mismatch_messages() {
        assert_eq!(
            Mismatch::ChecksumMismatch {
                expected: 0x1234ABCD,
                received: 0x0
            }
            .to_string(),
            "Received wrong checksum (0x00000000 instead of 0x1234ABCD)"
        );
        assert_eq!(
            Mismatch::ShortReply { received: 2 }.to_string(),
            "Target sent 2 bytes instead of 4"
        );
    }

    const MAX_TRIES: usize = crate::MAX_SEND_TRIES;
}
