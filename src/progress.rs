//! Progress reporting: byte-based bar over the source file, and a reader adapter that
//! feeds it.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::time::Duration;

const BYTES_TEMPLATE: &str = "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
     {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(BYTES_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    if let Some(msg) = label {
        pb.set_message(msg.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Label for one pass, prefixed with the user's label when set.
pub fn pass_label(prefix: Option<&str>, pass: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}: {pass}"),
        _ => pass.to_string(),
    }
}

/// Counts raw bytes pulled through `inner` onto an optional progress bar.
/// Wrap the file *before* any decompression so the bar tracks on-disk size.
pub struct ProgressReader<R> {
    inner: R,
    pb: Option<ProgressBar>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, pb: Option<ProgressBar>) -> Self {
        Self { inner, pb }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(pb) = &self.pb {
            pb.inc(n as u64);
        }
        Ok(n)
    }
}
