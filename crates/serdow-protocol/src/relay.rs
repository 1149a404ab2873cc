//! Target output relay
//!
//! After the entry packet the target owns the line and prints whatever it likes. Lines are
//! passed through as soon as they arrive; lines that aren't UTF-8 are replaced by the decode
//! error in inverse video.
use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use derive_ctor::ctor;
use serdow_port::Channel;
use tracing::{debug, warn};

use crate::{Result, err::Error};

const INVERSE: &str = "\x1B[7m";
const RESET: &str = "\x1B[0m";

#[derive(ctor)]
pub struct Relay<C: Channel, W: Write> {
    channel: C,
    console: W,
}

impl<C: Channel, W: Write> Relay<C, W> {
    /// Forward a single line, if one arrives before the read timeout.
    ///
    /// Returns whether anything was read.
    pub fn relay_line(&mut self) -> Result<bool> {
        let line = self.channel.read_line()?;
        if line.is_empty() {
            return Ok(false);
        }

        match std::str::from_utf8(&line) {
            Ok(text) => self.console.write_all(text.as_bytes())?,
            Err(e) => {
                warn!("dropping {} undecodable bytes: {e}", line.len());
                writeln!(self.console, "{INVERSE}{e}{RESET}")?;
            }
        }
        self.console.flush()?;

        Ok(true)
    }

    /// Relay lines until `stop` is raised.
    ///
    /// The flag is checked once per line, read timeout or [`serdow_port::MAX_LINE_LEN`] bytes.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::Relaxed) {
            self.relay_line()?;
        }

        debug!("relay stopped");
        Ok(())
    }

    pub fn into_parts(self) -> (C, W) {
        (self.channel, self.console)
    }
}

impl<C, W> Relay<C, W>
where
    C: Channel + Send + 'static,
    W: Write + Send + 'static,
{
    /// Run the relay on its own thread.
    pub fn spawn(mut self) -> Result<RelayHandle<C, W>> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = thread::Builder::new()
            .name("relay".into())
            .spawn(move || self.run(&flag).map(|()| self))?;

        Ok(RelayHandle { stop, thread })
    }
}

pub struct RelayHandle<C: Channel, W: Write> {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<Relay<C, W>>>,
}

impl<C: Channel, W: Write> RelayHandle<C, W> {
    /// Ask the relay to stop after the current read.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the relay thread and take the relay back.
    pub fn join(self) -> Result<Relay<C, W>> {
        self.thread
            .join()
            .map_err(|_| Error::Custom("relay thread panicked".into()))?
    }
}
