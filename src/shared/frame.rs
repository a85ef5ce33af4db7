// This is free and unencumbered software released into the public domain.

use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
}

impl Frame {
    pub fn new_bgra(data: impl Into<Bytes>, width: u32, height: u32, timestamp_ns: u64) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width as usize * PixelFormat::Bgra8.bytes_per_pixel(),
            pixel_format: PixelFormat::Bgra8,
            timestamp_ns,
        }
    }
}
