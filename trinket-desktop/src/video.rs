use anyhow::{Error, Result};
use flume::Sender;
use image::{EncodableLayout, RgbaImage};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, error, info};
use trinket_img::session::Event;

use nokhwa::{
    Camera, nokhwa_initialize,
    pixel_format::RgbAFormat,
    query,
    utils::{ApiBackend, RequestedFormat, RequestedFormatType},
};

pub fn create_input_stream(fps: u32) -> Result<Camera> {
    nokhwa_initialize(|granted| {
        debug!("User said {}", granted);
    });

    let cameras = query(ApiBackend::Auto)?;
    cameras
        .iter()
        .for_each(|cam| debug!("Found camera: {:?}", cam));

    let cam_info = cameras
        .last()
        .ok_or_else(|| Error::msg("No camera found"))?;
    let mut camera = Camera::new(
        cam_info.index().clone(),
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
    )?;

    camera.set_frame_rate(fps)?;
    camera.open_stream()?;
    Ok(camera)
}

/// Opens the camera on its own thread and feeds its frames to the session.
/// Returns the capture resolution once the stream is up.
pub fn spawn_capture(fps: u32, tx: Sender<Event>) -> Result<(u32, u32)> {
    let (ready_tx, ready_rx) = flume::bounded(1);

    thread::spawn(move || {
        let mut camera = match create_input_stream(fps) {
            Ok(camera) => camera,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let resolution = camera.resolution();
        let _ = ready_tx.send(Ok((resolution.width(), resolution.height())));

        loop {
            let frame = match camera
                .frame()
                .and_then(|buf| buf.decode_image::<RgbAFormat>())
            {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to pull frame from webcam: {e:?}");
                    break;
                }
            };

            if tx.send(Event::Frame(frame)).is_err() {
                break;
            }
        }

        if let Err(e) = camera.stop_stream() {
            error!("Failed to stop camera: {e:?}");
        }
        let _ = tx.send(Event::Shutdown);
    });

    ready_rx.recv()?
}

pub struct OutputVideoStream {
    output_proc: std::process::Child,
}

impl Drop for OutputVideoStream {
    fn drop(&mut self) {
        if let Err(e) = self.output_proc.kill() {
            error!("Failed to stop output process {e:?}");
        }
    }
}

impl OutputVideoStream {
    /// Pipes raw RGBA frames to a v4l2 loopback `device` through ffmpeg, or
    /// to an ffplay window when no device is given.
    pub fn new(width: u32, height: u32, fps: u32, device: Option<String>) -> Result<Self> {
        let size = format!("{width}x{height}");
        let rate = fps.to_string();
        let mut command = match device {
            Some(d) => {
                let dev_path = format!("/dev/{d}");
                info!("Writing {size} video to {dev_path}");
                let mut command = Command::new("ffmpeg");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgba",
                    "-s",
                    size.as_str(),
                    "-r",
                    rate.as_str(),
                    "-i",
                    "-",
                    "-map",
                    "0:v",
                    "-vf",
                    "format=yuv420p",
                    "-f",
                    "v4l2",
                    dev_path.as_str(),
                ]);
                command
            }
            None => {
                let mut command = Command::new("ffplay");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pixel_format",
                    "rgba",
                    "-video_size",
                    size.as_str(),
                    "-framerate",
                    rate.as_str(),
                    "-window_title",
                    "trinket",
                    "-fflags",
                    "nobuffer",
                    "-flags",
                    "low_delay",
                    "-",
                ]);
                command
            }
        };
        let output_proc = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;

        Ok(Self { output_proc })
    }

    pub fn write_frame(&mut self, img: &RgbaImage) -> Result<()> {
        let stdin = self
            .output_proc
            .stdin
            .as_mut()
            .ok_or_else(|| Error::msg("Output process closed its input"))?;
        stdin.write_all(img.as_bytes())?;
        Ok(())
    }
}
