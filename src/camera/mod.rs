pub mod v4l2;
pub mod worker;

pub use v4l2::Camera;
pub use worker::CameraEvent;
