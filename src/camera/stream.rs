use super::{Camera, Frame};
use crate::error::Error;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Lines, Stdin},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{info, trace};

/// Longest single sleep while pacing a recording, so a stop request is noticed.
const PACE_SLICE: Duration = Duration::from_millis(50);

/// Reads frames written one JSON document per line, either live from the
/// camera bridge or from a recording.
pub(crate) struct StreamCamera<R> {
    lines: Lines<R>,
    line_num: usize,
    real_time: bool,
    // wall clock and frame timestamp of the first paced frame
    epoch: Option<(Instant, u64)>,
    running: Option<Arc<AtomicBool>>,
}

impl<R> StreamCamera<R>
where
    R: BufRead,
{
    pub(crate) fn new(reader: R, real_time: bool) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            real_time,
            epoch: None,
            running: None,
        }
    }

    /// Stop waiting between paced frames once `running` is cleared.
    pub(crate) fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(true, |running| running.load(Ordering::SeqCst))
    }

    /// Sleep until `timestamp_ns` is due relative to the first frame.
    fn pace(&mut self, timestamp_ns: u64) {
        let (start, first_ns) = *self
            .epoch
            .get_or_insert_with(|| (Instant::now(), timestamp_ns));
        let due = start + Duration::from_nanos(timestamp_ns.saturating_sub(first_ns));
        while self.is_running() {
            let now = Instant::now();
            if due <= now {
                break;
            }
            thread::sleep((due - now).min(PACE_SLICE));
        }
    }
}

impl StreamCamera<BufReader<File>> {
    /// Open a recording, replayed at capture speed when `real_time` is set.
    pub(crate) fn open_recording<P>(path: P, real_time: bool) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::OpenCamera(e, path.to_path_buf()))?;
        info!(message = "using recording", path = %path.display(), real_time);
        Ok(Self::new(BufReader::new(file), real_time))
    }

    /// Open a live device or FIFO that the camera bridge writes frames to.
    pub(crate) fn open_device<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::OpenCamera(e, path.to_path_buf()))?;
        info!(message = "using live device", path = %path.display());
        Ok(Self::new(BufReader::new(file), false))
    }
}

impl StreamCamera<BufReader<Stdin>> {
    pub(crate) fn stdin() -> Self {
        info!(message = "using live stream from stdin");
        Self::new(BufReader::new(io::stdin()), false)
    }
}

impl<R> Camera for StreamCamera<R>
where
    R: BufRead,
{
    fn grab(&mut self) -> Result<Option<Frame>, Error> {
        let line = loop {
            let line = match self.lines.next() {
                Some(line) => line.map_err(Error::ReadFrame)?,
                None => return Ok(None),
            };
            self.line_num += 1;
            if !line.trim().is_empty() {
                break line;
            }
        };

        let frame: Frame =
            serde_json::from_str(&line).map_err(|e| Error::DecodeFrame(e, self.line_num))?;
        trace!(
            line = self.line_num,
            timestamp_ns = frame.timestamp_ns,
            bodies = frame.bodies.len()
        );

        if self.real_time {
            self.pace(frame.timestamp_ns);
        }
        Ok(Some(frame))
    }
}
