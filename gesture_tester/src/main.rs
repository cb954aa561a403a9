use anyhow::{Context, anyhow};
use clap::Parser;
use gesture_vision::core_modules::overlay;
use gesture_vision::{FrameReport, GestureLabel, GesturePipeline, Phase, PipelineConfig, Region};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_QUEUE_DEPTH: usize = 4;
const WINDOW_NAME: &str = "gesture_vision";
const DEBUG_WINDOW_NAME: &str = "gesture_vision silhouette";
const ESCAPE_KEY: i32 = 27;

/// Runs the gesture pipeline over a camera or video file and shows or records the result.
#[derive(Debug, Parser)]
#[command(name = "gesture_tester", version)]
struct Args {
    /// Camera index or path to a video file.
    #[arg(default_value = "0")]
    source: String,
    /// JSON file with a pipeline configuration. Frame dimensions are taken from the source.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the annotated stream to this video file.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Frame rate of the output video.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Do not open a preview window.
    #[arg(long)]
    headless: bool,
    /// Open a second window with the thresholded mask and its contour.
    #[arg(long)]
    debug_view: bool,
    /// Save a silhouette view every time the label changes.
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Override the number of calibration frames.
    #[arg(long)]
    calibration_frames: Option<u64>,
    /// Override the foreground threshold.
    #[arg(long)]
    threshold: Option<u8>,
}

#[derive(Debug, PartialEq, Eq)]
enum Control {
    Continue,
    Stop,
}

/// Everything the display loop owns once the first frame has arrived.
struct Session {
    pipeline: GesturePipeline,
    writer: Option<VideoWriter>,
    show: bool,
    debug_view: bool,
    debug_dir: Option<PathBuf>,
    last_label: Option<GestureLabel>,
}

impl Session {
    fn start(args: &Args, width: u32, height: u32) -> anyhow::Result<Self> {
        let config = load_config(args, width, height)?;
        info!(width, height, region = ?config.region, "starting gesture pipeline");
        let pipeline = GesturePipeline::new(config)?;

        let writer = match &args.output {
            Some(path) => {
                let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
                let path = path.to_str().ok_or_else(|| anyhow!("output path is not valid UTF-8"))?;
                Some(VideoWriter::new(
                    path,
                    fourcc,
                    args.fps,
                    core::Size::new(width as i32, height as i32),
                    true,
                )?)
            }
            None => None,
        };

        if let Some(dir) = &args.debug_dir {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }

        Ok(Self {
            pipeline,
            writer,
            show: !args.headless,
            debug_view: !args.headless && args.debug_view,
            debug_dir: args.debug_dir.clone(),
            last_label: None,
        })
    }

    fn step(&mut self, mut frame: Mat) -> anyhow::Result<Control> {
        let rgb = mat_to_rgb(&frame)?;
        let report = self.pipeline.process_frame(&rgb)?;

        if self.last_label != Some(report.label) {
            info!(
                frame = report.frame_index,
                label = %report.label,
                gesture = ?report.label.gesture(),
                "label changed"
            );
            self.save_debug_view(&report)?;
            self.last_label = Some(report.label);
        }

        annotate(&mut frame, &self.pipeline.config().region, report.label)?;

        if let Some(writer) = self.writer.as_mut() {
            writer.write(&frame)?;
        }
        if self.show {
            highgui::imshow(WINDOW_NAME, &frame)?;
            if self.debug_view {
                self.show_debug_view(&report)?;
            }
            if highgui::wait_key(1)? == ESCAPE_KEY {
                return Ok(Control::Stop);
            }
        }
        Ok(Control::Continue)
    }

    fn show_debug_view(&self, report: &FrameReport) -> anyhow::Result<()> {
        let Some(silhouette) = &report.silhouette else {
            return Ok(());
        };
        let hand = report.hand.as_ref().map(|h| h.extremities());
        let view = overlay::silhouette_view(silhouette, hand, &self.pipeline.config().heuristics);
        highgui::imshow(DEBUG_WINDOW_NAME, &rgb_to_mat(&view)?)?;
        Ok(())
    }

    fn save_debug_view(&self, report: &FrameReport) -> anyhow::Result<()> {
        let (Some(dir), Some(silhouette)) = (&self.debug_dir, &report.silhouette) else {
            return Ok(());
        };
        if report.phase != Phase::Detecting {
            return Ok(());
        }
        let hand = report.hand.as_ref().map(|h| h.extremities());
        let view = overlay::silhouette_view(silhouette, hand, &self.pipeline.config().heuristics);
        let path = dir.join(format!("frame_{:05}_{:?}.png", report.frame_index, report.label));
        overlay::save_png(&path, &view)?;
        Ok(())
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("GESTURE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

fn load_config(args: &Args, width: u32, height: u32) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let mut config: PipelineConfig = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing {}", path.display()))?;
            config.frame_width = width;
            config.frame_height = height;
            config
        }
        None => PipelineConfig::for_frame(width, height),
    };
    if let Some(frames) = args.calibration_frames {
        config.calibration_frames = frames;
    }
    if let Some(threshold) = args.threshold {
        config.foreground_threshold = threshold;
    }
    Ok(config)
}

fn open_capture(source: &str) -> opencv::Result<VideoCapture> {
    match source.parse::<i32>() {
        Ok(index) => VideoCapture::new(index, videoio::CAP_ANY),
        Err(_) => VideoCapture::from_file(source, videoio::CAP_ANY),
    }
}

/// Reads frames on a blocking thread until the source runs dry or the receiver goes away.
fn spawn_capture(source: String, frames: mpsc::Sender<Mat>) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::task::spawn_blocking(move || {
        let mut cap = open_capture(&source)?;
        if !cap.is_opened()? {
            return Err(anyhow!("could not open video source {source}"));
        }
        loop {
            let mut frame = Mat::default();
            match cap.read(&mut frame) {
                Ok(true) if !frame.empty() => {}
                Ok(_) => {
                    info!("video source exhausted");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read frame");
                    break;
                }
            }
            if frames.blocking_send(frame).is_err() {
                break;
            }
        }
        Ok(())
    })
}

/// Converts an OpenCV BGR frame into an RGB buffer for the pipeline.
fn mat_to_rgb(frame: &Mat) -> anyhow::Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    RgbImage::from_raw(width, height, data).ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))
}

/// Converts an RGB buffer into an OpenCV BGR frame for display.
fn rgb_to_mat(image: &RgbImage) -> anyhow::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Outlines the region and writes the label with a dark outline under a light fill.
fn annotate(frame: &mut Mat, region: &Region, label: GestureLabel) -> opencv::Result<()> {
    let rect = Rect::new(
        region.left as i32,
        region.top as i32,
        region.width() as i32,
        region.height() as i32,
    );
    imgproc::rectangle(frame, rect, Scalar::new(255.0, 255.0, 255.0, 0.0), 2, imgproc::LINE_8, 0)?;

    let origin = core::Point::new(10, 60);
    for (color, thickness) in [(Scalar::all(0.0), 6), (Scalar::all(255.0), 2)] {
        imgproc::put_text(
            frame,
            label.as_str(),
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.2,
            color,
            thickness,
            imgproc::LINE_AA,
            false,
        )?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let (tx, mut rx) = mpsc::channel::<Mat>(FRAME_QUEUE_DEPTH);
    let capture = spawn_capture(args.source.clone(), tx);
    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    let mut session: Option<Session> = None;

    loop {
        let frame = tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = &mut interrupt => {
                info!("interrupted");
                break;
            }
        };

        if session.is_none() {
            session = Some(Session::start(&args, frame.cols() as u32, frame.rows() as u32)?);
        }
        if let Some(active) = session.as_mut() {
            if active.step(frame)? == Control::Stop {
                break;
            }
        }
    }

    drop(rx);
    capture.await??;
    if let Some(session) = session {
        info!(frames = session.pipeline.frames_elapsed(), "processing complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn debug_view_conversion_keeps_channel_order() {
        let mut view = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        view.put_pixel(3, 2, Rgb([255, 0, 0]));

        let bgr = rgb_to_mat(&view).unwrap();
        assert_eq!((bgr.cols(), bgr.rows()), (8, 4));
        assert_eq!(bgr.at_2d::<core::Vec3b>(2, 3).unwrap().0, [0, 0, 255]);
        assert_eq!(mat_to_rgb(&bgr).unwrap(), view);
    }

    #[test]
    fn cli_overrides_apply_to_the_source_frame() {
        let args = Args::parse_from(["gesture_tester", "clip.mp4", "--calibration-frames", "5", "--threshold", "40"]);
        let config = load_config(&args, 320, 240).unwrap();
        assert_eq!((config.frame_width, config.frame_height), (320, 240));
        assert_eq!(config.calibration_frames, 5);
        assert_eq!(config.foreground_threshold, 40);
        assert!(config.validate().is_ok());
    }
}
