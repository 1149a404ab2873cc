use std::io::Write;

use colored::Colorize;
use serdow_protocol::{Chunk, Progress, Segment, SkipReason, chunk::percent};
use tracing::debug;

/// Width of the progress bar, one `#` per 3%.
const BAR_WIDTH: usize = 33;

/// Terminal progress for a transfer.
///
/// Each chunk rewrites the current line; a segment ends with a newline.
pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            debug!("progress output failed: {e}");
        }
    }
}

pub fn progress_line(desc: &str, sent: usize, total: usize) -> String {
    let percent = percent(sent, total);
    let bar = format!("[{:width$}]", "#".repeat(percent / 3), width = BAR_WIDTH);
    let kib = sent as f64 / 1024.0;
    let stat = format!("{kib:8.1} KiB {bar} {percent:>3}%");
    format!(" {desc:24}{stat:>55}")
}

impl<W: Write> Progress for Console<W> {
    fn skipped(&mut self, segment: &Segment, reason: SkipReason) {
        let line = format!("skipping {reason} section {segment}");
        self.emit(&format!("{}\n", line.yellow()));
    }

    fn chunk_sent(&mut self, segment: &Segment, _chunk: &Chunk, sent: usize) {
        let line = progress_line(&segment.to_string(), sent, segment.file_size as usize);
        self.emit(&format!("{line}\r"));
    }

    fn segment_done(&mut self, _segment: &Segment) {
        self.emit("\n");
    }

    fn entry_sent(&mut self, entry: u32) {
        self.emit(&format!(
            "Transmission complete; entry point address: 0x{entry:08x}\n{}\n",
            "-".repeat(80)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_layout() {
        let line = progress_line("PT_LOAD @08000000", 1024, 1500);
        assert_eq!(line.len(), 1 + 24 + 55);
        assert!(line.starts_with(" PT_LOAD @08000000       "));
        assert!(line.ends_with(&format!("1.0 KiB [{:33}]  68%", "#".repeat(22))));
    }

    #[test]
    fn full_bar_at_completion() {
        let line = progress_line("PT_LOAD @08000000", 1500, 1500);
        assert!(line.ends_with(&format!("1.5 KiB [{}] 100%", "#".repeat(33))));
    }

    /// Sink whose writes always fail.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_output_does_not_stop_the_transfer() {
        let mut console = Console::new(Broken);
        console.segment_done(&Segment::new("PT_LOAD".into(), 0x1000, 0, 0, &[]));
        console.entry_sent(0x1000);
    }

    #[test]
    fn transfer_output() {
        colored::control::set_override(false);

        let data = [0u8; 1500];
        let boot = Segment::new("PT_LOAD".into(), 0, 16, 16, &data[..16]);
        let text = Segment::new("PT_LOAD".into(), 0x08000000, 1500, 1500, &data);
        let chunk = Chunk::new(0, 1024, 0x08000000);

        let mut console = Console::new(Vec::new());
        console.skipped(&boot, SkipReason::Boot);
        console.chunk_sent(&text, &chunk, 1024);
        console.segment_done(&text);
        console.entry_sent(0x08000100);

        let out = String::from_utf8(console.into_inner()).unwrap();
        let lines: Vec<_> = out.split('\n').collect();
        assert_eq!(lines[0], "skipping boot section PT_LOAD @00000000");
        assert!(lines[1].ends_with("68%\r"));
        assert_eq!(
            lines[2],
            "Transmission complete; entry point address: 0x08000100"
        );
        assert_eq!(lines[3], "-".repeat(80));
    }
}
