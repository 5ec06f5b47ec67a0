use crate::{
    error::Error,
    extract::{self, BodySample, Joints},
    pose::Detection,
};
use chrono::{NaiveDateTime, Timelike};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info};

pub(crate) const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Name of a run, derived from when it started, e.g. `Zed2i_2022-04-05_93` for 09:03.
pub(crate) fn experiment_name(prefix: &str, started: NaiveDateTime) -> String {
    format!(
        "{}_{}_{}{}",
        prefix,
        started.format("%Y-%m-%d"),
        started.hour(),
        started.minute()
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Row {
    #[serde(rename = "ID_exp")]
    pub(crate) experiment: String,
    #[serde(rename = "date_exp")]
    pub(crate) date: String,
    pub(crate) height: String,
    #[serde(rename = "ID_subject")]
    pub(crate) subject: i32,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) time: String,
    pub(crate) joints: Joints,
}

/// Rows recorded during one run, exported as an object keyed by row index.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SampleLog {
    experiment: String,
    height: String,
    rows: Vec<Row>,
}

impl SampleLog {
    pub(crate) fn new<E, H>(experiment: E, height: H) -> Self
    where
        E: Into<String>,
        H: Into<String>,
    {
        Self {
            experiment: experiment.into(),
            height: height.into(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn experiment(&self) -> &str {
        &self.experiment
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn push(&mut self, sample: BodySample) {
        let BodySample {
            id,
            date,
            time,
            joints,
            x,
            y,
        } = sample;

        self.rows.push(Row {
            experiment: self.experiment.clone(),
            date,
            height: self.height.clone(),
            subject: id,
            x,
            y,
            time,
            joints,
        });
    }

    pub(crate) fn write_json<W>(&self, writer: W) -> Result<(), Error>
    where
        W: Write,
    {
        serde_json::to_writer(writer, self).map_err(Error::SerializeSampleLog)
    }

    /// Write the log to `<dir>/<experiment>.json`, returning the path written.
    pub(crate) fn save<P>(&self, dir: P) -> Result<PathBuf, Error>
    where
        P: AsRef<Path>,
    {
        let path = dir.as_ref().join(format!("{}.json", self.experiment));
        let file = File::create(&path).map_err(|e| Error::CreateOutput(e, path.clone()))?;
        let mut writer = BufWriter::new(file);
        self.write_json(&mut writer)?;
        writer.flush().map_err(Error::FlushOutput)?;
        Ok(path)
    }
}

impl Serialize for SampleLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (index, row) in self.rows.iter().enumerate() {
            map.serialize_entry(&index.to_string(), row)?;
        }
        map.end()
    }
}

/// Gates extraction to at most one sample per interval.
pub(crate) struct Sampler {
    interval: Duration,
    tracking_enabled: bool,
    last_sample: Instant,
    log: SampleLog,
}

impl Sampler {
    pub(crate) fn new(
        log: SampleLog,
        interval: Duration,
        tracking_enabled: bool,
        start: Instant,
    ) -> Self {
        Self {
            interval,
            tracking_enabled,
            last_sample: start,
            log,
        }
    }

    /// Offer a frame's bodies to the sampler. Returns whether a row was recorded.
    pub(crate) fn on_frame(&mut self, now: Instant, detections: &[Detection]) -> bool {
        if now.saturating_duration_since(self.last_sample) < self.interval {
            return false;
        }
        self.last_sample = now;

        match extract::extract(detections, self.tracking_enabled) {
            Some(sample) => {
                debug!(message = "recorded sample", id = sample.id, x = sample.x, y = sample.y);
                self.log.push(sample);
                true
            }
            None => false,
        }
    }

    pub(crate) fn tracking_enabled(&self) -> bool {
        self.tracking_enabled
    }

    pub(crate) fn log(&self) -> &SampleLog {
        &self.log
    }

    pub(crate) fn into_log(self) -> SampleLog {
        info!(
            message = "sampling finished",
            experiment = self.log.experiment(),
            rows = self.log.len()
        );
        self.log
    }
}
