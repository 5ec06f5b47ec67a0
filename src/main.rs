use anyhow::{Context, Result};
use camera::{Camera, RuntimeParams, StreamCamera};
use chrono::Local;
use error::Error;
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::cast::ToPrimitive;
use sample::{SampleLog, Sampler};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use structopt::StructOpt;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;

mod camera;
mod error;
mod extract;
mod pose;
mod sample;

/// Report what the camera currently sees.
fn draw_status(
    bodies: &[pose::Detection],
    tracking_enabled: bool,
    samples: usize,
    frame_duration: Duration,
    nframes: usize,
    pb_status: Option<&ProgressBar>,
) -> Result<(), Error> {
    let nframes = nframes.to_f64().ok_or(Error::ConvertToF64)?;
    let tracked = bodies
        .iter()
        .filter(|body| body.is_renderable(tracking_enabled))
        .count();
    let status_text = format!(
        "FPS => cam: {:.1}, bodies: {}, tracked: {}, samples: {}",
        nframes / frame_duration.as_secs_f64().max(f64::EPSILON),
        bodies.len(),
        tracked,
        samples,
    );

    if let Some(pb_status) = pb_status {
        pb_status.set_message(status_text);
        pb_status.inc(1);
    }

    Ok(())
}

/// Poll the camera until it runs dry or `running` is cleared, then hand back
/// everything that was sampled.
fn run(
    camera: &mut dyn Camera,
    mut sampler: Sampler,
    runtime_params: &RuntimeParams,
    running: &AtomicBool,
    pb_status: Option<&ProgressBar>,
) -> Result<SampleLog, Error> {
    let mut frame_duration = Duration::default();
    let mut nframes = 0;

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        let frame = match camera.grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("detection stream ended");
                break;
            }
            Err(error) => {
                debug!(message = "skipping frame", %error);
                continue;
            }
        };
        frame_duration += frame_start.elapsed();
        nframes += 1;

        let bodies = frame.retrieve_bodies(runtime_params);
        draw_status(
            &bodies,
            sampler.tracking_enabled(),
            sampler.log().len(),
            frame_duration,
            nframes,
            pb_status,
        )?;
        sampler.on_frame(Instant::now(), &bodies);
    }

    Ok(sampler.into_log())
}

#[derive(structopt::StructOpt)]
struct Opt {
    /// Path to a recorded detection stream. The live device is used when omitted.
    recording: Option<PathBuf>,

    /// Live detection stream written by the camera bridge, `-` for stdin.
    ///
    /// Ctrl-C takes effect once the next frame arrives or the stream closes.
    #[structopt(short, long, default_value = "-")]
    device: PathBuf,

    /// Accept bodies the camera is not actively tracking.
    #[structopt(long)]
    disable_tracking: bool,

    /// Detection confidence threshold, from 0 to 100.
    #[structopt(short, long, default_value = "40")]
    confidence_threshold: f32,

    /// Minimum time between two samples [default: 200].
    #[structopt(short, long)]
    sample_interval_ms: Option<u64>,

    /// Subject height label stored with every sample.
    #[structopt(short = "-H", long, default_value = "183")]
    height: String,

    /// Prefix of the experiment name and output file.
    #[structopt(short, long, default_value = "Zed2i")]
    prefix: String,

    /// Directory the sample log is written to.
    #[structopt(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(long)]
    show_progress: bool,
}

fn open_camera(
    recording: Option<&Path>,
    device: &Path,
    running: &Arc<AtomicBool>,
) -> Result<Box<dyn Camera>> {
    let camera: Box<dyn Camera> = match recording {
        Some(path) => Box::new(
            StreamCamera::open_recording(path, true)
                .context("failed opening recording")?
                .with_running(running.clone()),
        ),
        None if device.as_os_str() == "-" => Box::new(StreamCamera::stdin()),
        None => {
            Box::new(StreamCamera::open_device(device).context("failed opening live device")?)
        }
    };
    Ok(camera)
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let tracking_enabled = !opt.disable_tracking;
    let runtime_params = RuntimeParams {
        detection_confidence_threshold: opt.confidence_threshold,
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    info!("running body tracking export, press Ctrl-C to quit");

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();

    ctrlc::set_handler(move || {
        running_ctrl_c.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    let mut camera = open_camera(opt.recording.as_deref(), &opt.device, &running)?;

    let started = Local::now().naive_local();
    let experiment = sample::experiment_name(&opt.prefix, started);
    info!(message = "starting experiment", %experiment, tracking_enabled);

    let pb_status = if opt.show_progress {
        Some(
            ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                    .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
            ),
        )
    } else {
        None
    };

    let sampler = Sampler::new(
        SampleLog::new(experiment, opt.height),
        opt.sample_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(sample::DEFAULT_SAMPLE_INTERVAL),
        tracking_enabled,
        Instant::now(),
    );
    let log = run(
        camera.as_mut(),
        sampler,
        &runtime_params,
        &running,
        pb_status.as_ref(),
    )
    .context("capture loop failed")?;

    if let Some(pb_status) = pb_status {
        pb_status.finish_and_clear();
    }

    if log.is_empty() {
        warn!(message = "no bodies were sampled", experiment = log.experiment());
    }
    let path = log
        .save(&opt.output_dir)
        .context("failed writing sample log")?;
    info!(message = "wrote sample log", path = %path.display(), rows = log.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::Frame,
        pose::{Detection, Point3, TrackingState, NUM_JOINTS},
    };
    use serde_json::Value;
    use std::{collections::VecDeque, io};

    /// Hands out a fixed sequence of grab results, then reports end of stream.
    struct ScriptedCamera {
        grabs: VecDeque<Result<Option<Frame>, Error>>,
        ngrabs: usize,
        stop_on_grab: Option<Arc<AtomicBool>>,
    }

    impl ScriptedCamera {
        fn new<I>(grabs: I) -> Self
        where
            I: IntoIterator<Item = Result<Option<Frame>, Error>>,
        {
            Self {
                grabs: grabs.into_iter().collect(),
                ngrabs: 0,
                stop_on_grab: None,
            }
        }
    }

    impl Camera for ScriptedCamera {
        fn grab(&mut self) -> Result<Option<Frame>, Error> {
            self.ngrabs += 1;
            if let Some(running) = &self.stop_on_grab {
                running.store(false, Ordering::SeqCst);
            }
            self.grabs.pop_front().unwrap_or(Ok(None))
        }
    }

    fn frame(id: i32, confidence: f32) -> Result<Option<Frame>, Error> {
        Ok(Some(Frame {
            timestamp_ns: 0,
            bodies: vec![Detection {
                id,
                tracking_state: TrackingState::Ok,
                confidence,
                keypoints: vec![Point3::new(1.0, 2.0, 3.0); NUM_JOINTS],
            }],
        }))
    }

    fn failed_grab() -> Result<Option<Frame>, Error> {
        Err(Error::ReadFrame(io::Error::new(
            io::ErrorKind::Other,
            "bridge hiccup",
        )))
    }

    // sample every frame, the gate itself is covered in `sample`
    fn sampler() -> Sampler {
        Sampler::new(
            SampleLog::new("run", "183"),
            Duration::from_millis(0),
            true,
            Instant::now(),
        )
    }

    fn subjects(log: &SampleLog) -> Vec<i64> {
        let mut buffer = Vec::new();
        log.write_json(&mut buffer).unwrap();
        let value: Value = serde_json::from_slice(&buffer).unwrap();
        (0..log.len())
            .map(|index| value[index.to_string()]["ID_subject"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn failed_grab_is_skipped_and_stream_end_stops() {
        let mut camera = ScriptedCamera::new(vec![
            frame(1, 90.0),
            failed_grab(),
            frame(2, 90.0),
            Ok(None),
            frame(3, 90.0),
        ]);
        let running = AtomicBool::new(true);

        let log = run(
            &mut camera,
            sampler(),
            &RuntimeParams::default(),
            &running,
            None,
        )
        .unwrap();

        assert_eq!(subjects(&log), vec![1, 2]);
        assert_eq!(camera.ngrabs, 4);
    }

    #[test]
    fn low_confidence_bodies_are_not_sampled() {
        let mut camera = ScriptedCamera::new(vec![frame(1, 10.0), frame(2, 75.0)]);
        let running = AtomicBool::new(true);

        let log = run(
            &mut camera,
            sampler(),
            &RuntimeParams::default(),
            &running,
            None,
        )
        .unwrap();

        assert_eq!(subjects(&log), vec![2]);
    }

    #[test]
    fn stopped_before_start_grabs_nothing() {
        let mut camera = ScriptedCamera::new(vec![frame(1, 90.0)]);
        let running = AtomicBool::new(false);

        let log = run(
            &mut camera,
            sampler(),
            &RuntimeParams::default(),
            &running,
            None,
        )
        .unwrap();

        assert!(log.is_empty());
        assert_eq!(camera.ngrabs, 0);
    }

    #[test]
    fn stop_request_ends_loop_after_current_frame() {
        let running = Arc::new(AtomicBool::new(true));
        let mut camera = ScriptedCamera::new(vec![frame(1, 90.0), frame(2, 90.0)]);
        camera.stop_on_grab = Some(running.clone());

        let log = run(
            &mut camera,
            sampler(),
            &RuntimeParams::default(),
            &running,
            None,
        )
        .unwrap();

        assert_eq!(subjects(&log), vec![1]);
        assert_eq!(camera.ngrabs, 1);
    }

    #[test]
    fn recording_is_sampled_at_capture_speed() {
        let body = serde_json::json!({
            "tracking_state": "ok",
            "keypoints": vec![[1.0, 2.0, 3.0]; NUM_JOINTS],
        });
        let mut lines = String::new();
        for (id, timestamp_ns) in &[(1, 0u64), (2, 250_000_000u64)] {
            let mut body = body.clone();
            body["id"] = (*id).into();
            let frame = serde_json::json!({ "timestamp_ns": timestamp_ns, "bodies": [body] });
            lines.push_str(&frame.to_string());
            lines.push('\n');
        }
        let path = std::env::temp_dir().join(format!(
            "body-export-recording-{}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, lines).unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let mut camera = open_camera(Some(&path), Path::new("-"), &running).unwrap();
        let sampler = Sampler::new(
            SampleLog::new("run", "183"),
            sample::DEFAULT_SAMPLE_INTERVAL,
            true,
            Instant::now(),
        );
        let log = run(
            camera.as_mut(),
            sampler,
            &RuntimeParams::default(),
            &running,
            None,
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        // the first frame arrives before the interval has elapsed
        assert_eq!(subjects(&log), vec![2]);
    }
}
