// nearest-color and dither-pair selection against a linear palette,
// plus the precomputed lookup table the bayer quantizer runs on

use std::thread;

use crate::bayer;
use crate::color::{self, Rgb};
use crate::pixel::{PixelFormat, FMT_R5G6B5};

#[cfg(test)]
#[path = "./dither_test.rs"]
mod dither_test;

/// a palette pair and the blend point between them; left == right
/// denotes a solid color
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DitheredColor {
    pub left_color: u8,
    pub right_color: u8,
    pub mix: f32,
}

impl DitheredColor {
    pub fn get_dithered(&self, bm: &bayer::Map, x: i32, y: i32) -> u8 {
        if bm.is_on(x, y, self.mix) {
            self.right_color
        } else {
            self.left_color
        }
    }
}

/// which RGBI pairs may be dithered against each other.
///
/// Mixing perceptually distant hues produces visible checkerboards,
/// so each chromatic family only pairs with its neighbors on the hue
/// circle; black only mixes with the dark colors, dark grey with
/// nothing, and the dark colors never with white.
pub fn allowed_dither(left: usize, right: usize) -> bool {
    if left == right {
        return true;
    }

    let (left, right) = if right < left { (right, left) } else { (left, right) };

    if left == 0 {
        return (right >= 1 && right <= 6) || right == 8;
    }

    if left == 8 {
        return false;
    }

    let is_blue = left == 1 || right == 1 || left == 9 || right == 9;
    let is_green = left == 2 || right == 2 || left == 10 || right == 10;
    let is_cyan = left == 3 || right == 3 || left == 11 || right == 11;
    let is_red = left == 4 || right == 4 || left == 12 || right == 12;
    let is_magenta = left == 5 || right == 5 || left == 13 || right == 13;
    let is_yellow = left == 6 || right == 6 || left == 14 || right == 14;

    if is_blue && (is_green || is_yellow || is_red) {
        return false;
    }

    if is_green && (is_blue || is_red || is_magenta) {
        return false;
    }

    if is_cyan && (is_red || is_magenta || is_yellow) {
        return false;
    }

    if is_red && (is_green || is_blue || is_cyan) {
        return false;
    }

    if is_magenta && (is_green || is_cyan || is_yellow) {
        return false;
    }

    if is_yellow && (is_blue || is_cyan || is_magenta) {
        return false;
    }

    if left == 4 && right == 14 {
        return false; // dark red with bright yellow
    }

    if left <= 6 && right == 15 {
        return false; // dark colors with white
    }

    true
}

/// index of the palette entry nearest to the color; first entry wins
/// ties
pub fn eval_nearest_color(linear_palette: &[Rgb], linear_color: Rgb) -> u8 {
    let mut best_distance = f32::MAX;
    let mut best = 0;

    for (i, &candidate) in linear_palette.iter().enumerate() {
        let dist = color::distance(linear_color, candidate);

        if dist >= best_distance {
            continue;
        }

        best = i;
        best_distance = dist;
    }

    best as u8
}

/// blend point of target projected on the left->right segment,
/// clamped to [0, 1]; 0 for a degenerate (solid) pair
pub fn eval_dither_mix(target: Rgb, left: Rgb, right: Rgb) -> f32 {
    let target_from_left = color::sub(target, left);
    let delta = color::sub(right, left);
    let delta_len2 = color::dot(delta, delta);

    if delta_len2 == 0.0 {
        return 0.0;
    }

    color::clamp_scalar(color::dot(target_from_left, delta) / delta_len2, 0.0, 1.0)
}

/// best solid color or admissible dither pair for the target color,
/// by euclidean distance to the projection point
pub fn eval_nearest_dithered_color<F>(
    linear_palette: &[Rgb],
    allowed_dither: F,
    linear_color: Rgb,
) -> DitheredColor
where
    F: Fn(usize, usize) -> bool,
{
    let mut best_distance = f32::MAX;
    let mut best = DitheredColor::default();

    // solid colors first, so pairs must strictly improve on them
    for (i, &left) in linear_palette.iter().enumerate() {
        let dist = color::distance(linear_color, left);

        if dist >= best_distance {
            continue;
        }

        best_distance = dist;
        best = DitheredColor {
            left_color: i as u8,
            right_color: i as u8,
            mix: 0.0,
        };
    }

    for (i, &left) in linear_palette.iter().enumerate() {
        for j in i + 1..linear_palette.len() {
            if !allowed_dither(i, j) {
                continue;
            }

            let right = linear_palette[j];
            let mix_level = eval_dither_mix(linear_color, left, right);
            let mix_point = color::add(left, color::mul(color::sub(right, left), mix_level));
            let dist = color::distance(linear_color, mix_point);

            if dist >= best_distance {
                continue;
            }

            best_distance = dist;
            best = DitheredColor {
                left_color: i as u8,
                right_color: j as u8,
                mix: mix_level,
            };
        }
    }

    best
}

/// dither decisions precomputed for every reduced-precision sRGB key.
///
/// Built once per palette configuration, immutable afterwards. The
/// lookup key quantizes the color; the stored pair is kept but the
/// mix is re-derived from the exact color, so blend precision
/// survives the quantization.
#[derive(Clone)]
pub struct DitherLut {
    linear_palette: Vec<Rgb>,
    lookup: Vec<DitheredColor>,
}

impl DitherLut {
    pub fn pixel_fmt() -> PixelFormat {
        FMT_R5G6B5
    }

    pub fn empty() -> Self {
        DitherLut {
            linear_palette: Vec::new(),
            lookup: Vec::new(),
        }
    }

    /// evaluate `dither_lookup` for every key, in parallel over
    /// disjoint key ranges; returns once every worker has joined
    pub fn build<F>(linear_palette: &[Rgb], dither_lookup: F) -> Self
    where
        F: Fn(Rgb) -> DitheredColor + Sync,
    {
        let fmt = Self::pixel_fmt();
        let len = 1usize << fmt.visible_bits();
        let mut lookup = vec![DitheredColor::default(); len];
        let thread_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        thread::scope(|s| {
            let mut rest = &mut lookup[..];
            let mut begin = 0usize;

            for i in 0..thread_count {
                let end = len * (i + 1) / thread_count;
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(end - begin);
                rest = tail;

                let dither_lookup = &dither_lookup;
                s.spawn(move || {
                    for (offset, slot) in chunk.iter_mut().enumerate() {
                        let key = (begin + offset) as u32;
                        let linear = color::to_linear(fmt.to_float_srgb(key));
                        *slot = dither_lookup(linear);
                    }
                });

                begin = end;
            }
        });

        DitherLut {
            linear_palette: linear_palette.to_vec(),
            lookup,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn get(&self, linear_color: Rgb) -> DitheredColor {
        let key = Self::pixel_fmt().from_float_srgb(color::to_srgb(linear_color));
        let mut result = self.lookup[key as usize];

        result.mix = eval_dither_mix(
            linear_color,
            self.linear_palette[result.left_color as usize],
            self.linear_palette[result.right_color as usize],
        );

        result
    }
}
