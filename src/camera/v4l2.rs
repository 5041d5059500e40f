use crate::common::config::CameraConfig;
use crate::common::{FaceGateError, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// Pixel layout of the negotiated capture format, copied out of the driver
/// so frames can be decoded without touching the device handle.
#[derive(Debug, Clone, Copy)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: [u8; 4],
}

pub struct Camera {
    device: Device,
    format: FrameFormat,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let device = Device::new(config.device_index as usize).map_err(|e| {
            FaceGateError::Camera(format!(
                "failed to open camera {}: {}",
                config.device_index, e
            ))
        })?;

        let mut fmt = device
            .format()
            .map_err(|e| FaceGateError::Camera(format!("failed to query format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;
        if !is_supported(fmt.fourcc.repr) {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!(error = %e, "could not set requested capture format, using device defaults");
        }

        let mut actual = device
            .format()
            .map_err(|e| FaceGateError::Camera(format!("failed to read back format: {}", e)))?;

        // Some drivers refuse MJPG; YUYV is the usual raw fallback.
        if !is_supported(actual.fourcc.repr) {
            fmt.fourcc = FourCC::new(b"YUYV");
            device
                .set_format(&fmt)
                .map_err(|e| FaceGateError::Camera(format!("failed to set capture format: {}", e)))?;
            actual = device
                .format()
                .map_err(|e| FaceGateError::Camera(format!("failed to read back format: {}", e)))?;
        }

        if !is_supported(actual.fourcc.repr) {
            return Err(FaceGateError::Camera(format!(
                "unsupported pixel format {}",
                fourcc_name(actual.fourcc.repr)
            )));
        }

        if actual.width != config.width || actual.height != config.height {
            tracing::info!(
                width = actual.width,
                height = actual.height,
                requested_width = config.width,
                requested_height = config.height,
                "camera resolution differs from requested"
            );
        }
        tracing::info!(
            device = config.device_index,
            format = %fourcc_name(actual.fourcc.repr),
            width = actual.width,
            height = actual.height,
            "camera opened"
        );

        Ok(Self {
            device,
            format: FrameFormat {
                width: actual.width,
                height: actual.height,
                fourcc: actual.fourcc.repr,
            },
        })
    }

    pub fn frame_format(&self) -> FrameFormat {
        self.format
    }

    pub fn start_stream(&mut self) -> Result<MmapStream<'_>> {
        MmapStream::with_buffers(&mut self.device, Type::VideoCapture, 4)
            .map_err(|e| FaceGateError::Camera(format!("failed to start capture stream: {}", e)))
    }
}

fn is_supported(fourcc: [u8; 4]) -> bool {
    matches!(&fourcc, b"MJPG" | b"YUYV" | b"GREY")
}

fn fourcc_name(fourcc: [u8; 4]) -> String {
    String::from_utf8_lossy(&fourcc).into_owned()
}

/// Decode one raw capture buffer into an RGB-capable image.
pub fn decode_frame(data: &[u8], format: &FrameFormat) -> Result<DynamicImage> {
    match &format.fourcc {
        b"MJPG" => {
            image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(FaceGateError::from)
        }
        b"YUYV" => yuyv_to_image(data, format.width, format.height),
        b"GREY" => grey_to_image(data, format.width, format.height),
        other => Err(FaceGateError::Camera(format!(
            "unsupported pixel format {}",
            fourcc_name(*other)
        ))),
    }
}

fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data.to_vec())
        .ok_or_else(|| FaceGateError::Camera("GREY frame has the wrong length".into()))?;
    Ok(DynamicImage::ImageLuma8(buffer))
}

fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let rgb = yuyv_to_rgb(data, width, height)?;
    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| FaceGateError::Camera("YUYV frame has the wrong length".into()))
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = (width as usize) * (height as usize) * 2;
    if yuyv.len() < expected {
        return Err(FaceGateError::Camera(format!(
            "YUYV frame too short: expected {} bytes, got {}",
            expected,
            yuyv.len()
        )));
    }

    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        push_pixel(&mut rgb, chunk[0], chunk[1], chunk[3]);
        push_pixel(&mut rgb, chunk[2], chunk[1], chunk[3]);
    }
    Ok(rgb)
}

// BT.601 integer conversion
fn push_pixel(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    out.push(r.clamp(0, 255) as u8);
    out.push(g.clamp(0, 255) as u8);
    out.push(b.clamp(0, 255) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_black_and_white_pixels() {
        // Two pixels sharing neutral chroma: Y=16 is black, Y=235 is white.
        let yuyv = [16u8, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn yuyv_red_pixel() {
        // V well above neutral pushes red up and green down.
        let yuyv = [81u8, 90, 81, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        let (r, g, b) = (rgb[0], rgb[1], rgb[2]);
        assert!(r > 200, "red channel too low: {}", r);
        assert!(g < 60, "green channel too high: {}", g);
        assert!(b < 60, "blue channel too high: {}", b);
    }

    #[test]
    fn yuyv_rejects_short_buffer() {
        let yuyv = [16u8, 128, 235];
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn grey_frame_dimensions() {
        let data = vec![128u8; 6];
        let img = grey_to_image(&data, 3, 2).unwrap();
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
    }

    #[test]
    fn grey_rejects_wrong_length() {
        let data = vec![128u8; 5];
        assert!(grey_to_image(&data, 3, 2).is_err());
    }

    #[test]
    fn decode_rejects_unknown_fourcc() {
        let format = FrameFormat {
            width: 2,
            height: 2,
            fourcc: *b"H264",
        };
        assert!(decode_frame(&[0u8; 16], &format).is_err());
    }
}
