// the render pass library: format conversion, perceptual correction
// and the three quantizers. Pass chains are assembled by the callers
// (see the downsample binary) and executed by process::ParallelProcess.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::bayer;
use crate::color::{self, rgb_to_hsp, hsp_to_rgb, smootherstep, Rgb};
use crate::dither::{eval_nearest_color, DitherLut};
use crate::frame::{FrameData, FrameOwned, SharedFrame};
use crate::output::OutputMode;
use crate::pixel::{PixelFormat, FMT_A8R8G8B8, FMT_R5G6B5};
use crate::process::{PassImpl, PassState, RenderContext, RenderPass};

#[cfg(test)]
#[path = "./passes_test.rs"]
mod passes_test;

/// decode the pixel at (x, y) into float sRGB based on the frame's bpp
pub fn srgb_from_image(input: &FrameData, x: i32, y: i32) -> Rgb {
    match input.bpp {
        16 => FMT_R5G6B5.to_float_srgb(u32::from(input.read::<u16>(x, y))),
        32 => FMT_A8R8G8B8.to_float_srgb(input.read::<u32>(x, y)),
        _ => [0.0, 0.0, 0.0],
    }
}

struct Linearize;

impl PassImpl for Linearize {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state.frame.resize(input.width, input.height, 96);
        state.frame.aspect_ratio = input.aspect_ratio;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                out.write::<Rgb>(x, y, color::to_linear(srgb_from_image(input, x, y)));
            }
        }
    }
}

/// decodes the input format into 96 bpp linear float pixels
pub fn linearize() -> RenderPass {
    RenderPass::new(Box::new(Linearize))
}

struct Unlinearize {
    fmt: PixelFormat,
}

impl PassImpl for Unlinearize {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state.frame.resize(input.width, input.height, self.fmt.bits as i32);
        state.frame.aspect_ratio = input.aspect_ratio;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let raw = self.fmt.from_float_srgb(color::to_srgb(linear));

                match self.fmt.bits {
                    16 => out.write::<u16>(x, y, raw as u16),
                    _ => out.write::<u32>(x, y, raw),
                }
            }
        }
    }
}

/// encodes 96 bpp linear float pixels back into a packed format
pub fn unlinearize(fmt: PixelFormat) -> RenderPass {
    RenderPass::new(Box::new(Unlinearize { fmt }))
}

struct NearestScale {
    w: i32,
    h: i32,
}

impl PassImpl for NearestScale {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state.frame.resize(input.width * self.w, input.height * self.h, input.bpp);
        state.frame.aspect_ratio = input.aspect_ratio;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);

                for j in 0..self.h {
                    for i in 0..self.w {
                        out.write::<Rgb>(x * self.w + i, y * self.h + j, linear);
                    }
                }
            }
        }
    }
}

/// replicate every pixel into a w x h block; the aspect ratio is
/// untouched (used to double the dithering resolution)
pub fn nearest_scale(w: i32, h: i32) -> RenderPass {
    RenderPass::new(Box::new(NearestScale { w, h }))
}

fn gaussian_kernel(x: f32, stddev: f32) -> f32 {
    let s2 = 2.0 * stddev * stddev;
    (-(x * x) / s2).exp()
}

/// precomputed 1-D gaussian, sampled along one axis with the window
/// clamped to the frame
pub struct SampleKernel1d {
    kernel: Vec<f32>,
    stddev: f32,
    pub frame_width: i32,
    pub frame_height: i32,
}

impl SampleKernel1d {
    pub fn new() -> Self {
        SampleKernel1d {
            kernel: Vec::new(),
            stddev: 0.0,
            frame_width: 0,
            frame_height: 0,
        }
    }

    pub fn init_kernel(&mut self, stddev: f32) {
        if self.stddev == stddev {
            return;
        }

        let radius = stddev * 6.0;
        let kernel_size = (radius.ceil() as i32) * 2 + 1;

        self.kernel = (0..kernel_size)
            .map(|i| gaussian_kernel((i - kernel_size / 2) as f32, stddev))
            .collect();
        self.stddev = stddev;
    }

    /// weighted sample at (x, y); weights renormalize over the taps
    /// that fell inside the frame
    pub fn sample<F>(&self, x: i32, y: i32, horizontal: bool, func: F) -> [f32; 2]
    where
        F: Fn(i32, i32) -> [f32; 2],
    {
        let kernel_size = self.kernel.len() as i32;
        let half = kernel_size / 2;
        let ud = if horizontal { x } else { y };
        let max_d = if horizontal { self.frame_width } else { self.frame_height };

        let mni = 0.max(half - ud);
        let mxi = kernel_size.min(max_d + half - ud);

        let mut data = [0f32; 2];
        let mut weights = 0f32;

        for i in mni..mxi {
            let d = ud + i - half;
            let (sx, sy) = if horizontal { (d, y) } else { (x, d) };

            let weight = self.kernel[i as usize];
            let sample = func(sx, sy);

            data[0] += sample[0] * weight;
            data[1] += sample[1] * weight;
            weights += weight;
        }

        if weights == 0.0 {
            return [0.0, 0.0];
        }

        [data[0] / weights, data[1] / weights]
    }
}

/// first blur stage: per-pixel brightness moments (P, P squared) of
/// the linear input, written to a shared side frame
struct BlurMoments {
    dest: Arc<SharedFrame>,
}

impl PassImpl for BlurMoments {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state
            .frame
            .resize_with_pitch(input.width, input.height, input.pitch, input.bpp);
        state.no_output = true;
        self.dest.resize(input.width, input.height, 64);
    }

    fn render(&self, input: &FrameData, _out: &FrameData, ctx: &RenderContext) {
        let dest = self.dest.frame();
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let hsp = rgb_to_hsp(linear);

                dest.write::<[f32; 2]>(x, y, [hsp[2], hsp[2] * hsp[2]]);
            }
        }
    }
}

/// one separable blur axis over the moment frame.
///
/// The horizontal kernel is widened by the pixel aspect
/// (width / (height * AR)) so the blur is round on the monitor.
struct BlurAxis {
    horizontal: bool,
    stddev: f32,
    src: Arc<SharedFrame>,
    dest: Option<Arc<SharedFrame>>,
    ws: SampleKernel1d,
}

impl PassImpl for BlurAxis {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        self.ws.frame_width = input.width;
        self.ws.frame_height = input.height;

        if self.horizontal {
            state
                .frame
                .resize_with_pitch(input.width, input.height, input.pitch, input.bpp);
            state.no_output = true;
            self.ws
                .init_kernel(self.stddev * input.width as f32 / (input.height as f32 * input.aspect_ratio));
        } else {
            state
                .frame
                .resize_with_pitch(input.width, input.height, input.pitch, 64);
            self.ws.init_kernel(self.stddev);

            if self.dest.is_some() {
                state.no_output = true;
            }
        }

        state.frame.aspect_ratio = input.aspect_ratio;

        if let Some(dest) = &self.dest {
            dest.resize(input.width, input.height, 64);
        }
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let src = self.src.frame();
        let target = match &self.dest {
            Some(dest) => dest.frame(),
            None => out,
        };
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let blurred =
                    self.ws
                        .sample(x, y, self.horizontal, |sx, sy| src.read::<[f32; 2]>(sx, sy));

                target.write::<[f32; 2]>(x, y, blurred);
            }
        }
    }
}

/// append the three-stage separable moment blur; the result lands in
/// `dest` when given, otherwise in the final pass's own frame
fn lc_blur(render_passes: &mut Vec<RenderPass>, stddev: f32, dest: Option<Arc<SharedFrame>>) {
    let blur_pre = SharedFrame::new();
    let blur_x = SharedFrame::new();

    render_passes.push(RenderPass::new(Box::new(BlurMoments {
        dest: Arc::clone(&blur_pre),
    })));

    render_passes.push(RenderPass::new(Box::new(BlurAxis {
        horizontal: true,
        stddev,
        src: blur_pre,
        dest: Some(Arc::clone(&blur_x)),
        ws: SampleKernel1d::new(),
    })));

    render_passes.push(RenderPass::new(Box::new(BlurAxis {
        horizontal: false,
        stddev,
        src: blur_x,
        dest,
        ws: SampleKernel1d::new(),
    })));
}

struct BlackCrush {
    low: f32,
    high: f32,
}

impl PassImpl for BlackCrush {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state.frame.resize(input.width, input.height, 96);
        state.frame.aspect_ratio = input.aspect_ratio;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let mut hsp = rgb_to_hsp(linear);

                hsp[2] *= smootherstep(self.low, self.high, hsp[2]);

                out.write::<Rgb>(x, y, hsp_to_rgb(hsp));
            }
        }
    }
}

/// scale perceived brightness towards zero below `high`, with
/// everything under `low` considered pure black
pub fn black_crush(black_crush_low: f32, black_crush_high: f32) -> RenderPass {
    RenderPass::new(Box::new(BlackCrush {
        low: black_crush_low,
        high: black_crush_high,
    }))
}

fn calc_local_contrast(avg: f32, var: f32, linear_color: Rgb, gain: f32) -> Rgb {
    let stddev = var.sqrt();
    let stddev_multiplier = 1.0 / 3.0;

    let mut half_interval = stddev_multiplier * stddev;
    half_interval = half_interval.max(3e-3);

    let minimum = 0.0;
    let maximum = avg + half_interval;

    let mut hsp = rgb_to_hsp(linear_color);
    let newval = (hsp[2] - minimum) / (maximum - minimum);

    hsp[2] += (newval - hsp[2]) * gain;

    color::clamp(hsp_to_rgb(color::clamp(hsp)))
}

/// final contrast stage: reads the blurred moments, compresses
/// saturation and stretches brightness against the local window
struct ContrastApply {
    blur: Arc<SharedFrame>,
    gain: f32,
}

impl PassImpl for ContrastApply {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        state.frame.resize(input.width, input.height, 96);
        state.frame.aspect_ratio = input.aspect_ratio;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let blur = self.blur.frame();
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let avg_var: [f32; 2] = blur.read(x, y);
                let avg = avg_var[0];
                let var = (avg_var[1] - avg * avg).max(0.0);

                let linear: Rgb = input.read(x, y);
                let mut hsp = rgb_to_hsp(linear);

                hsp[1] = hsp[1].powf(0.75);

                let c = calc_local_contrast(avg, var, hsp_to_rgb(hsp), self.gain);

                out.write::<Rgb>(x, y, c);
            }
        }
    }
}

/// append the local contrast chain (moment blur + contrast apply).
///
/// The black crush bounds keep the reference arity but the contrast
/// math never reads them; crushing is its own pass.
pub fn add_local_contrast(
    render_passes: &mut Vec<RenderPass>,
    stddev: f32,
    gain: f32,
    _black_crush_high: f32,
    _black_crush_low: f32,
) {
    let blur = SharedFrame::new();

    lc_blur(render_passes, stddev, Some(Arc::clone(&blur)));

    render_passes.push(RenderPass::new(Box::new(ContrastApply { blur, gain })));
}

struct Nearest<O: OutputMode> {
    output_algorithm: O,
    linear_palette: Vec<Rgb>,
}

impl<O: OutputMode> PassImpl for Nearest<O> {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        self.output_algorithm.new_frame(input, &mut state.frame);
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let c = eval_nearest_color(&self.linear_palette, linear);

                self.output_algorithm.pp(out, x, y, c);
            }
        }
    }
}

/// quantize to the nearest palette color
pub fn nearest<O: OutputMode + 'static>(linear_palette: Vec<Rgb>, output_algorithm: O) -> RenderPass {
    RenderPass::new(Box::new(Nearest {
        output_algorithm,
        linear_palette,
    }))
}

struct BayerDither<O: OutputMode> {
    output_algorithm: O,
    bayer_map: bayer::Map,
    precomputed_dither: DitherLut,
}

impl<O: OutputMode> PassImpl for BayerDither<O> {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        self.output_algorithm.new_frame(input, &mut state.frame);
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let dc = self.precomputed_dither.get(linear);
                let c = dc.get_dithered(&self.bayer_map, x, y);

                self.output_algorithm.pp(out, x, y, c);
            }
        }
    }
}

/// ordered dithering through the precomputed pair table
pub fn bayer_dither<O: OutputMode + 'static>(
    bayer_map: bayer::Map,
    precomputed_dither: DitherLut,
    output_algorithm: O,
) -> RenderPass {
    RenderPass::new(Box::new(BayerDither {
        output_algorithm,
        bayer_map,
        precomputed_dither,
    }))
}

struct TemporalErrorDiffusion<O: OutputMode> {
    output_algorithm: O,
    linear_palette: Vec<Rgb>,
    error: FrameOwned,
    prev_pixel: FrameOwned,
    frame_idx: u64,
}

impl<O: OutputMode> PassImpl for TemporalErrorDiffusion<O> {
    fn init(&mut self, input: &FrameData, state: &mut PassState) {
        self.output_algorithm.new_frame(input, &mut state.frame);
        // both carry over between frames when the shape is stable
        self.error.resize(input.width, input.height, 96);
        self.prev_pixel.resize(input.width, input.height, 96);
        self.frame_idx += 1;
    }

    fn render(&self, input: &FrameData, out: &FrameData, ctx: &RenderContext) {
        let (line_start, line_end) = ctx.rows(input.height);

        for y in line_start..line_end {
            // per-row noise stream keyed on (frame, row) keeps the
            // diffusion deterministic under any worker count
            let mut rng = XorShiftRng::seed_from_u64((self.frame_idx << 32) ^ y as u64);

            for x in 0..input.width {
                let linear: Rgb = input.read(x, y);
                let linear_error: Rgb = self.error.read(x, y);
                let prev: Rgb = self.prev_pixel.read(x, y);

                let target = color::clamp(color::add(linear, linear_error));
                let cga_idx = eval_nearest_color(&self.linear_palette, target);

                self.output_algorithm.pp(out, x, y, cga_idx);

                let current_error = color::sub(linear, self.linear_palette[cga_idx as usize]);
                let mut next_error = color::add(linear_error, current_error);

                if prev != linear {
                    for i in 0..3 {
                        next_error[i] += rng.gen::<f32>() * current_error[i];
                    }

                    self.prev_pixel.write(x, y, linear);
                }

                self.error.write(x, y, color::clamp(next_error));
            }
        }
    }
}

/// carry quantization residue into the next frames, with noise on
/// changing pixels to break up static patterns
pub fn temporal_error_diffusion<O: OutputMode + 'static>(
    linear_palette: Vec<Rgb>,
    output_algorithm: O,
) -> RenderPass {
    RenderPass::new(Box::new(TemporalErrorDiffusion {
        output_algorithm,
        linear_palette,
        error: FrameOwned::new(),
        prev_pixel: FrameOwned::new(),
        frame_idx: 0,
    }))
}
