// the fixed 16-color RGBI palette and the monitor scan timing that
// everything downstream of the quantizer agrees on

use crate::color::{self, Rgb};

#[cfg(test)]
#[path = "./cga_test.rs"]
mod cga_test;

/// packed framebuffer geometry expected by the scan generator
pub mod framebuffer {
    /// 4 bpp, one RGBI nibble per pixel
    pub const BPP: i32 = 4;
    pub const WIDTH: i32 = 320;
    pub const HEIGHT: i32 = 200;
    pub const PITCH: i32 = (WIDTH * BPP + 7) / 8;

    pub const fn bytes() -> usize {
        (HEIGHT * PITCH) as usize
    }
}

/// scan layout of the 5153-class monitor.
///
/// Counts are native pixels per row and rows per frame, adapted from
/// http://www.paradigmlift.net/projects/teensy_cga.html
pub mod monitor_timing {
    use super::framebuffer;

    pub const PIXEL_CLOCK: i64 = 14_318_180;

    /// framebuffer pixel width in native pixels
    pub const FRAMEBUFFER_PIXEL_WIDTH: i64 = 640 / framebuffer::WIDTH as i64;

    pub const HSCAN_LEFT_BLANKING: i64 = 56;
    pub const HSCAN_LEFT_OVERSCAN: i64 = 40;
    pub const HSCAN_VISIBLE: i64 = 640;
    pub const HSCAN_RIGHT_OVERSCAN: i64 = 72;
    pub const HSCAN_RIGHT_BLANKING: i64 = 40;
    pub const HSCAN_SYNC: i64 = 64;

    pub const VSCAN_TOP_BLANKING: i64 = 239 - 228;
    pub const VSCAN_TOP_OVERSCAN: i64 = 261 - 239;
    pub const VSCAN_VISIBLE: i64 = 200;
    pub const VSCAN_BOTTOM_OVERSCAN: i64 = 223 - 200;
    pub const VSCAN_BOTTOM_BLANKING: i64 = 225 - 223;
    pub const VSCAN_SYNC: i64 = 228 - 225;

    pub const fn pixel_interval_ns(pixels: i64, framebuffer_pixel_width: i64) -> i64 {
        pixels * framebuffer_pixel_width * 1_000_000_000 / PIXEL_CLOCK
    }

    /// every pixel slot in one scan row, sync included
    pub const fn hscan_total() -> i64 {
        HSCAN_LEFT_BLANKING
            + HSCAN_LEFT_OVERSCAN
            + HSCAN_VISIBLE
            + HSCAN_RIGHT_OVERSCAN
            + HSCAN_RIGHT_BLANKING
            + HSCAN_SYNC
    }
}

/// the 16 RGBI colors in sRGB, index = IRGB nibble.
///
/// Color 6 has its green halved, the historical dark-yellow-to-brown
/// fix of the RGBI monitors.
/// Based on https://en.wikipedia.org/wiki/Color_Graphics_Adapter#With_an_RGBI_monitor
pub fn gen_cga_palette() -> Vec<Rgb> {
    let major = 2.0 / 3.0f32;
    let minor = 1.0 / 3.0f32;
    let mut ret = Vec::with_capacity(16);

    for color_number in 0..16u32 {
        let mut c = [
            major * (color_number & 4) as f32 / 4.0 + minor * (color_number & 8) as f32 / 8.0,
            major * (color_number & 2) as f32 / 2.0 + minor * (color_number & 8) as f32 / 8.0,
            major * (color_number & 1) as f32 / 1.0 + minor * (color_number & 8) as f32 / 8.0,
        ];

        if color_number == 6 {
            c[1] /= 2.0;
        }

        ret.push(c);
    }

    ret
}

/// expand a palette with every unordered pair midpoint; returns the
/// combined palette and the (left, right) index of each entry
pub fn combine_palette(in_palette: &[Rgb]) -> (Vec<Rgb>, Vec<(u8, u8)>) {
    let num = in_palette.len() * (in_palette.len() + 1) / 2;
    let mut ret = Vec::with_capacity(num);
    let mut indices = Vec::with_capacity(num);

    for i in 0..in_palette.len() {
        for j in i..in_palette.len() {
            ret.push(color::lerp(in_palette[i], in_palette[j], 0.5));
            indices.push((i as u8, j as u8));
        }
    }

    (ret, indices)
}

pub fn palette_to_linear(palette: &[Rgb]) -> Vec<Rgb> {
    palette.iter().map(|&c| color::to_linear(c)).collect()
}

lazy_static! {
    static ref CGA_PALETTE_LINEAR: Vec<Rgb> = palette_to_linear(&gen_cga_palette());
}

/// the RGBI palette in linear light, memoized
pub fn cga_palette() -> &'static [Rgb] {
    &CGA_PALETTE_LINEAR
}
