//! Match reporter
//!
//! Workers send matched paths over a channel to a dedicated thread that
//! writes one path per line, in the order the matches arrive.

use crate::error::WorkerError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Matches buffered between workers and the output sink
const CHANNEL_SIZE: usize = 1024;

/// Writes matched paths as they are produced
pub struct Reporter<W: Write + Send + 'static> {
    sender: Sender<PathBuf>,
    handle: JoinHandle<io::Result<(W, u64)>>,
}

impl<W: Write + Send + 'static> Reporter<W> {
    /// Spawn the reporter thread
    ///
    /// With `absolute_base` set, relative paths are joined onto it before
    /// being written; absolute paths are written unchanged.
    pub fn spawn(writer: W, absolute_base: Option<PathBuf>) -> Result<Self, WorkerError> {
        let (sender, receiver) = bounded(CHANNEL_SIZE);

        let handle = thread::Builder::new()
            .name("reporter".to_string())
            .spawn(move || report_loop(writer, receiver, absolute_base))
            .map_err(|e| WorkerError::Reporter(e.to_string()))?;

        Ok(Self { sender, handle })
    }

    /// Channel the scanner sends matches to
    pub fn sender(&self) -> &Sender<PathBuf> {
        &self.sender
    }

    /// Close the channel and wait for every queued match to be written
    ///
    /// Returns the sink and the number of lines written.
    pub fn finish(self) -> Result<(W, u64), WorkerError> {
        drop(self.sender);
        match self.handle.join() {
            Ok(Ok(done)) => Ok(done),
            Ok(Err(e)) => Err(WorkerError::Reporter(e.to_string())),
            Err(_) => Err(WorkerError::Reporter("reporter thread panicked".into())),
        }
    }
}

fn report_loop<W: Write>(
    mut writer: W,
    receiver: Receiver<PathBuf>,
    absolute_base: Option<PathBuf>,
) -> io::Result<(W, u64)> {
    let mut written = 0u64;

    for path in receiver {
        match &absolute_base {
            Some(base) => writeln!(writer, "{}", absolutize(base, &path).display())?,
            None => writeln!(writer, "{}", path.display())?,
        }
        written += 1;
    }

    writer.flush()?;
    debug!("Reporter finished, wrote {} matches", written);
    Ok((writer, written))
}

/// Join a relative path onto `base`, dropping `.` components
///
/// Absolute paths are returned unchanged, so applying this twice is the
/// same as applying it once.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    base.join(relative)
}
