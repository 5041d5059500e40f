use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use image::DynamicImage;
use v4l::io::traits::CaptureStream;

use crate::camera::v4l2::{self, Camera};
use crate::common::{FaceGateError, Result};

const CHANNEL_CAPACITY: usize = 4;
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum CameraEvent {
    Frame(DynamicImage),
    ReadError(String),
}

/// Start the capture thread.
///
/// The thread owns the camera and pushes decoded frames over a bounded
/// channel; the returned flag stops it. The device handle is released
/// whenever the thread returns, including stop, channel disconnect, and a
/// failed stream start.
pub fn spawn(camera: Camera) -> Result<(Receiver<CameraEvent>, Arc<AtomicBool>)> {
    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    thread::Builder::new()
        .name("camera-capture".into())
        .spawn(move || run(camera, tx, stop_flag))
        .map_err(|e| FaceGateError::Camera(format!("failed to spawn capture thread: {}", e)))?;

    Ok((rx, stop))
}

fn run(mut camera: Camera, tx: Sender<CameraEvent>, stop: Arc<AtomicBool>) {
    let format = camera.frame_format();
    let mut stream = match camera.start_stream() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(CameraEvent::ReadError(e.to_string()));
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        let event = match stream.next() {
            Ok((buf, _meta)) => match v4l2::decode_frame(buf, &format) {
                Ok(frame) => CameraEvent::Frame(frame),
                Err(e) => CameraEvent::ReadError(e.to_string()),
            },
            Err(e) => {
                thread::sleep(READ_RETRY_DELAY);
                CameraEvent::ReadError(e.to_string())
            }
        };

        match tx.try_send(event) {
            Ok(()) => {}
            // UI is behind; drop the frame rather than queue stale ones.
            Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
    }

    tracing::debug!("camera capture thread exiting");
}
