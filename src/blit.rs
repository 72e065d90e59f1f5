// aspect-preserving fit and the packed-CGA-to-screen blitter used by
// the display sinks

use crate::frame::FrameData;
use crate::pixel::{FMT_A8R8G8B8, FMT_R5G6B5};

#[cfg(test)]
#[path = "./blit_test.rs"]
mod blit_test;

// non-emulated blits carry the RGBI signal on dedicated bits of the
// screen word (DPI data lines 0-3)
pub const BLUE_BIT: u32 = 0;
pub const GREEN_BIT: u32 = 1;
pub const RED_BIT: u32 = 2;
pub const INTENSITY_BIT: u32 = 3;

#[derive(Clone, Debug)]
pub struct BltOptions {
    /// render through the palette instead of raw RGBI line bits
    pub emulate_cga: bool,
    /// a8r8g8b8 colors, one per RGBI index; used when emulating
    pub palette: Vec<u32>,
    /// force one temporal subframe instead of following frame_count
    pub flicker_select: Option<u32>,
    pub y_div: usize,
    pub y_divs: usize,
    pub frame_count: u32,
    pub offset: [i32; 2],
}

impl BltOptions {
    pub fn new() -> Self {
        BltOptions {
            emulate_cga: false,
            palette: Vec::new(),
            flicker_select: None,
            y_div: 0,
            y_divs: 1,
            frame_count: 0,
            offset: [0, 0],
        }
    }
}

/// largest (width, height) inside the destination that preserves the
/// source aspect, corrected for non-square destination pixels
pub fn best_fit(src_aspect_ratio: f32, dest_width: i32, dest_height: i32, dest_aspect_ratio: f32) -> (i32, i32) {
    let mut candidate_width = src_aspect_ratio;
    let mut candidate_height = 1.0f32;
    let s = dest_aspect_ratio / src_aspect_ratio;

    if s < 1.0 {
        candidate_width *= s;
        candidate_height *= s;
    }

    candidate_width *= dest_height as f32;
    candidate_height *= dest_height as f32;

    let dest_pixel_aspect = dest_width as f32 / (dest_height as f32 * dest_aspect_ratio);

    candidate_width *= dest_pixel_aspect;

    (
        (candidate_width + 0.5).floor() as i32,
        (candidate_height + 0.5).floor() as i32,
    )
}

/// integer pixel replication factors for the fitted placement, both
/// at least 1. A source taller than its fit (the 640x400 container
/// for 640x200 content) briefly computes a negative line-skip factor
/// before the floor.
pub fn get_scaling_factors(
    src_width: i32,
    src_height: i32,
    src_aspect_ratio: f32,
    dest_width: i32,
    dest_height: i32,
    dest_aspect_ratio: f32,
) -> (i32, i32) {
    let (width, height) = best_fit(src_aspect_ratio, dest_width, dest_height, dest_aspect_ratio);

    let x_s = width / src_width;
    let mut y_s = height / src_height;

    if y_s == 0 {
        y_s = -src_height / height;
    }

    (x_s.max(1), y_s.max(1))
}

/// centered, clipped, block-replicating copy of a packed CGA (4/8
/// bpp), r5g6b5 or a8r8g8b8 frame onto an a8r8g8b8 screen.
///
/// Rows can be sub-banded with (y_div, y_divs) so several workers
/// blit one frame without overlap. When not emulating, scales under
/// 3x or non-CGA depths are skipped outright: the analog output hack
/// feeds the monitor from the screen bits and breaks below that.
pub fn blt(buffer: &FrameData, screen: &FrameData, x_scaling: i32, y_scaling: i32, options: &BltOptions) {
    let frame_count = match options.flicker_select {
        Some(forced) => forced,
        None => options.frame_count,
    };

    if !options.emulate_cga && (x_scaling < 3 || (buffer.bpp != 4 && buffer.bpp != 8)) {
        log::debug!(
            "blt: skipping, scale {}x with {} bpp fails the cga monitor safeties",
            x_scaling,
            buffer.bpp
        );
        return;
    }

    let cx = screen.width / 2 - buffer.width * x_scaling / 2 + options.offset[0];
    let cy = screen.height / 2 - buffer.height * y_scaling / 2 + options.offset[1];

    // clip against the screen, then translate back to source pixels
    let mut bx = cx.max(0).min(screen.width - 1);
    let mut by = cy.max(0).min(screen.height - 1);
    let mut ex = (cx + buffer.width * x_scaling).max(0).min(screen.width);
    let mut ey = (cy + buffer.height * y_scaling).max(0).min(screen.height);

    bx = bx.max(cx).min(cx + buffer.width * x_scaling - 1);
    by = by.max(cy).min(cy + buffer.height * y_scaling - 1);
    ex = ex.max(cx).min(cx + buffer.width * x_scaling);
    ey = ey.max(cy).min(cy + buffer.height * y_scaling);

    bx -= cx;
    by -= cy;
    ex -= cx;
    ey -= cy;

    bx = (bx + x_scaling - 1) / x_scaling;
    by = (by + y_scaling - 1) / y_scaling;
    ex /= x_scaling;
    ey /= y_scaling;

    debug_assert!(bx >= 0 && bx < buffer.width);
    debug_assert!(by >= 0 && by < buffer.height);
    debug_assert!(ex >= 0 && ex <= buffer.width);
    debug_assert!(ey >= 0 && ey <= buffer.height);

    // band assignment for parallel dispatch
    {
        let h = ey - by;

        ey = by + h * (options.y_div as i32 + 1) / options.y_divs as i32;
        by += h * options.y_div as i32 / options.y_divs as i32;
    }

    for y in by..ey {
        for x in bx..ex {
            let col_uint = match buffer.bpp {
                4 | 8 => {
                    let idx = if buffer.bpp == 4 {
                        let shr = if x % 2 == 1 { 4 } else { 0 };
                        (buffer.read::<u8>(x, y) >> shr) & 0xF
                    } else {
                        (buffer.read::<u8>(x, y) >> (4 * (frame_count % 2))) & 0xF
                    };

                    if options.emulate_cga {
                        options.palette[idx as usize]
                    } else {
                        let idx = u32::from(idx);
                        ((idx & 0x1) << BLUE_BIT)
                            | ((idx & 0x2) << (GREEN_BIT - 1))
                            | ((idx & 0x4) << (RED_BIT - 2))
                            | ((idx & 0x8) << (INTENSITY_BIT - 3))
                    }
                }
                16 => FMT_A8R8G8B8.from_float_srgb(FMT_R5G6B5.to_float_srgb(u32::from(buffer.read::<u16>(x, y)))),
                32 => buffer.read::<u32>(x, y),
                _ => 0,
            };

            for y_s in 0..y_scaling {
                for x_s in 0..x_scaling {
                    screen.write::<u32>(x * x_scaling + x_s + cx, y * y_scaling + y_s + cy, col_uint);
                }
            }
        }
    }
}

/// fit the frame to the screen and blit; non-emulated output forces
/// the 3x minimum horizontal scale and the 4/3 monitor aspect
pub fn blt_fit(buffer: &FrameData, screen: &FrameData, options: &BltOptions) {
    let mut screen_ar = screen.width as f32 / screen.height as f32;

    if !options.emulate_cga {
        screen_ar = 4.0 / 3.0;
    }

    let (mut x_scaling, y_scaling) = get_scaling_factors(
        buffer.width,
        buffer.height,
        buffer.aspect_ratio,
        screen.width,
        screen.height,
        screen_ar,
    );

    if !options.emulate_cga {
        x_scaling = x_scaling.max(3);
    }

    blt(buffer, screen, x_scaling, y_scaling, options);
}
