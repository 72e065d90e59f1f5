//! SDL display sink: receives packed CGA frames, blits them into a
//! streaming texture (banded across the worker pool) and answers
//! each presented frame with a vsync packet.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sdl2::event::Event;
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;

#[macro_use]
extern crate clap;
use clap::{App, Arg};

use cgacast::blit::{best_fit, blt, blt_fit, BltOptions};
use cgacast::cga::gen_cga_palette;
use cgacast::frame::{FrameData, FrameOwned};
use cgacast::net::{FrameReceiver, FrameSender};
use cgacast::pixel::FMT_A8R8G8B8;
use cgacast::process::{ParallelProcess, PassImpl, PassState, RenderContext, RenderPass};
use cgacast::tools::parse_pair;

/// the locked texture surface, swapped in around each blit dispatch.
/// Workers only read the descriptor; row bands keep their writes
/// disjoint.
struct ScreenTarget(UnsafeCell<FrameData>);

unsafe impl Send for ScreenTarget {}
unsafe impl Sync for ScreenTarget {}

impl ScreenTarget {
    fn new() -> Arc<Self> {
        Arc::new(ScreenTarget(UnsafeCell::new(FrameData::empty())))
    }

    fn set(&self, frame: FrameData) {
        unsafe { *self.0.get() = frame }
    }

    fn clear(&self) {
        unsafe { *self.0.get() = FrameData::empty() }
    }

    fn frame(&self) -> &FrameData {
        unsafe { &*self.0.get() }
    }
}

/// one-pass pipeline whose workers each blit a horizontal band
struct BlitPass {
    screen: Arc<ScreenTarget>,
    emulate_cga: bool,
    palette: Vec<u32>,
    flicker_select: Option<u32>,
    offset: [i32; 2],
    scale: Option<(i32, i32)>,
    frame_idx: u32,
}

impl PassImpl for BlitPass {
    fn init(&mut self, _input: &FrameData, _state: &mut PassState) {
        self.frame_idx = self.frame_idx.wrapping_add(1);
    }

    fn render(&self, input: &FrameData, _out: &FrameData, ctx: &RenderContext) {
        let screen = self.screen.frame();

        if !screen.has_data() || !input.has_data() {
            return;
        }

        let options = BltOptions {
            emulate_cga: self.emulate_cga,
            palette: self.palette.clone(),
            flicker_select: self.flicker_select,
            y_div: ctx.thread_idx,
            y_divs: ctx.num_threads,
            frame_count: self.frame_idx,
            offset: self.offset,
        };

        match self.scale {
            Some((x_scaling, y_scaling)) => blt(input, screen, x_scaling, y_scaling, &options),
            None => blt_fit(input, screen, &options),
        }
    }
}

fn main() {
    let matches = App::new("cgacast-frontend")
        .version("0.1")
        .arg(Arg::with_name("RECV")
            .help("Listen address for packed frames <ip:port>")
            .takes_value(true)
            .required(true)
            .long("recv"))
        .arg(Arg::with_name("EMULATE")
            .help("Emulate CGA output through the palette instead of raw RGBI bits")
            .long("emulate"))
        .arg(Arg::with_name("FLICKER")
            .help("Select flicker frame [0,1]")
            .takes_value(true)
            .long("flicker-select"))
        .arg(Arg::with_name("OFFSET")
            .help("Offset frame in pixels <x,y>")
            .takes_value(true)
            .long("offset"))
        .arg(Arg::with_name("SCALE")
            .help("Force pixel scaling <x,y>")
            .takes_value(true)
            .long("scale"))
        .get_matches();

    let emulate_cga = matches.is_present("EMULATE");
    let flicker_select = if matches.is_present("FLICKER") {
        Some(value_t!(matches, "FLICKER", u32).unwrap_or(0))
    } else {
        None
    };
    let offset = match matches.value_of("OFFSET") {
        Some(s) => {
            let (x, y) = parse_pair(s).expect("malformed --offset");
            [x, y]
        }
        None => [0, 0],
    };
    let scale = matches.value_of("SCALE").map(|s| parse_pair(s).expect("malformed --scale"));

    let palette: Vec<u32> = gen_cga_palette()
        .iter()
        .map(|&c| FMT_A8R8G8B8.from_float_srgb(c))
        .collect();

    let sdl_context = sdl2::init().unwrap();
    let video_subsys = sdl_context.video().unwrap();

    const SCREEN_WIDTH: u32 = 640;
    const SCREEN_HEIGHT: u32 = 200;

    let window = video_subsys
        .window("cgacast-frontend", SCREEN_WIDTH, SCREEN_HEIGHT)
        .position_centered()
        .resizable()
        .opengl()
        .build()
        .unwrap();

    let mut canvas = window.into_canvas().present_vsync().build().unwrap();
    let texture_creator = canvas.texture_creator();

    let mut texture = texture_creator
        .create_texture_streaming(PixelFormatEnum::ARGB8888, SCREEN_WIDTH, SCREEN_HEIGHT)
        .unwrap();
    let mut texture_size = (SCREEN_WIDTH, SCREEN_HEIGHT);

    let mut events = sdl_context.event_pump().unwrap();

    let mut receiver = FrameReceiver::bind(matches.value_of("RECV").unwrap()).unwrap();
    receiver.start(None);

    let sender = FrameSender::new(receiver.socket());

    let screen = ScreenTarget::new();
    let mut pp = ParallelProcess::new();
    pp.render_passes.push(RenderPass::new(Box::new(BlitPass {
        screen: Arc::clone(&screen),
        emulate_cga,
        palette,
        flicker_select,
        offset,
        scale,
        frame_idx: 0,
    })));

    let mut dummy = FrameOwned::new();
    let mut last_mode_count = 0u64;
    let mut last_frame_count = 0u64;
    let mut last_frame_at: Option<Instant> = None;

    'main: loop {
        for event in events.poll_iter() {
            if let Event::Quit { .. } = event {
                break 'main;
            }
        }

        {
            let state = receiver.lock_front();

            if state.frame_count != last_frame_count {
                last_frame_count = state.frame_count;
                last_frame_at = Some(Instant::now());
            }

            if state.mode_count != last_mode_count && state.frame.has_data() {
                last_mode_count = state.mode_count;
                println!(
                    "Mode changed to {}x{} {}bpp aspect={}, clearing screen...",
                    state.frame.width, state.frame.height, state.frame.bpp, state.frame.aspect_ratio
                );

                texture_size = (state.frame.width as u32, state.frame.height as u32);
                texture = texture_creator
                    .create_texture_streaming(PixelFormatEnum::ARGB8888, texture_size.0, texture_size.1)
                    .unwrap();

                texture
                    .with_lock(None, |buf: &mut [u8], _pitch: usize| {
                        for b in buf.iter_mut() {
                            *b = 0;
                        }
                    })
                    .unwrap();
            }
        }

        let frame_is_fresh = match last_frame_at {
            Some(at) => at.elapsed() < Duration::from_secs(1),
            None => false,
        };

        if frame_is_fresh {
            // ack towards whoever sent the frame
            if let Some(endpoint) = receiver.lock_front().last_sender {
                let _ = sender.send_vsync_to(endpoint);
            }

            texture
                .with_lock(None, |buf: &mut [u8], pitch: usize| {
                    let frame = unsafe {
                        FrameData::from_raw_parts(
                            buf.as_mut_ptr(),
                            texture_size.0 as i32,
                            texture_size.1 as i32,
                            pitch as i32,
                            32,
                            4.0 / 3.0,
                        )
                    };

                    screen.set(frame);

                    let state = receiver.lock_front();
                    pp.apply(&state.frame, &mut dummy);

                    screen.clear();
                })
                .unwrap();

            let (window_width, window_height) = canvas.window().size();
            let aspect = receiver.lock_front().frame.aspect_ratio;
            // assume square pixels on the desktop
            let (dest_width, dest_height) = best_fit(
                aspect,
                window_width as i32,
                window_height as i32,
                window_width as f32 / window_height as f32,
            );
            let dest = Rect::new(
                window_width as i32 / 2 - dest_width / 2,
                window_height as i32 / 2 - dest_height / 2,
                dest_width.max(1) as u32,
                dest_height.max(1) as u32,
            );

            canvas.clear();
            canvas.copy(&texture, None, Some(dest)).unwrap();
            canvas.present();
        } else {
            println!("Waiting for frame...");
            let _ = receiver.wait_for_frame_timeout(last_frame_count, Duration::from_secs(1));
        }
    }
}
