//! Test fixtures: encoded images.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(RgbImage::from_pixel(width, height, Rgb([40, 120, 200])), ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(RgbImage::from_pixel(width, height, Rgb([200, 60, 10])), ImageFormat::Jpeg)
}

/// PNG full of noise, so it does not compress below a few kilobytes.
pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x9E37_79B9;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    encode(img, ImageFormat::Png)
}

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}
