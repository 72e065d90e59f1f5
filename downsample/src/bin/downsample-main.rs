//! CGA downscaler: receives frames over UDP, quantizes them through
//! the pass pipeline and streams the packed result to a display sink.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[macro_use]
extern crate clap;
use clap::{App, Arg};

use cgacast::bayer;
use cgacast::cga::{cga_palette, combine_palette};
use cgacast::color::{rgb_to_hsp, Rgb};
use cgacast::dither::{allowed_dither, eval_nearest_dithered_color, DitherLut};
use cgacast::error::Error;
use cgacast::frame::FrameOwned;
use cgacast::net::{FrameReceiver, FrameSender};
use cgacast::output::{pack_nibble, AsyncTemporalDitherOutput, NormalOutput, OutputMode};
use cgacast::passes;
use cgacast::pixel::FMT_A8R8G8B8;
use cgacast::process::ParallelProcess;
use cgacast::timing;
use cgacast::tools::{frame_hash, parse_pair};

/// streaming threads run just under the scan generator's priority
const STREAM_PRIORITY: i32 = 90;

/// watchdog period when waiting for client vsync
const VSYNC_DEADLINE: Duration = Duration::from_millis(1000 / 3);

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn push_algorithm<O: OutputMode + 'static>(
    pp: &mut ParallelProcess,
    algorithm: &str,
    linear_palette: Vec<Rgb>,
    bayer_map: bayer::Map,
    dither_lut: DitherLut,
    output_algorithm: O,
) -> Result<(), Error> {
    match algorithm {
        "nearest" => pp
            .render_passes
            .push(passes::nearest(linear_palette, output_algorithm)),
        "bayer" => pp
            .render_passes
            .push(passes::bayer_dither(bayer_map, dither_lut, output_algorithm)),
        "temporal-error-diffusion" => pp
            .render_passes
            .push(passes::temporal_error_diffusion(linear_palette, output_algorithm)),
        "passthrough" => pp.render_passes.push(passes::unlinearize(FMT_A8R8G8B8)),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "invalid algorithm {:?}",
                algorithm
            )))
        }
    }

    Ok(())
}

fn run() -> Result<(), Error> {
    let matches = App::new("cgacast-downsample")
        .version("0.1")
        .arg(Arg::with_name("RECV")
            .help("Listen address for incoming frames <ip:port>")
            .takes_value(true)
            .required(true)
            .long("recv"))
        .arg(Arg::with_name("SEND")
            .help("Destination address for packed frames <ip:port>")
            .takes_value(true)
            .required(true)
            .long("send"))
        .arg(Arg::with_name("ALGORITHM")
            .help("Downsampling algorithm (nearest, bayer, temporal-error-diffusion, passthrough)")
            .takes_value(true)
            .default_value("nearest")
            .long("algorithm"))
        .arg(Arg::with_name("BAYERLEVEL")
            .help("Bayer map size, <n> or <rows,cols>")
            .takes_value(true)
            .default_value("8")
            .long("bayer-level"))
        .arg(Arg::with_name("TEMPORAL")
            .help("Uses flickering to produce more colors (client, server)")
            .takes_value(true)
            .long("temporal-dithering"))
        .arg(Arg::with_name("STAGGERED")
            .help("Stagger temporal dithering")
            .long("staggered-temporal-dithering"))
        .arg(Arg::with_name("LCGAIN")
            .help("Local contrast gain")
            .takes_value(true)
            .long("local-contrast-gain"))
        .arg(Arg::with_name("LCSTDDEV")
            .help("Local contrast standard deviance")
            .takes_value(true)
            .long("local-contrast-stddev"))
        .arg(Arg::with_name("BCHIGH")
            .help("Level at which to start crushing black")
            .takes_value(true)
            .long("black-crush-high"))
        .arg(Arg::with_name("BCLOW")
            .help("Level to consider pure black")
            .takes_value(true)
            .long("black-crush-low"))
        .arg(Arg::with_name("SCALE")
            .help("Nearest neighbor pixel scaling <x,y>; does not modify the aspect ratio")
            .takes_value(true)
            .default_value("1")
            .long("scale"))
        .arg(Arg::with_name("VSYNC")
            .help("Listen to client VSYNC signal")
            .long("vsync-signal"))
        .get_matches();

    let local_contrast_gain = value_t!(matches, "LCGAIN", f32).unwrap_or(0.0);
    let local_contrast_stddev = value_t!(matches, "LCSTDDEV", f32).unwrap_or(0.5);
    let black_crush_high = value_t!(matches, "BCHIGH", f32).unwrap_or(0.0);
    let black_crush_low = value_t!(matches, "BCLOW", f32).unwrap_or(0.0);
    let staggered = matches.is_present("STAGGERED");
    let vsync_signal = matches.is_present("VSYNC");
    let algorithm = matches.value_of("ALGORITHM").unwrap().to_string();

    let mut pp = ParallelProcess::new();

    pp.render_passes.push(passes::linearize());

    {
        let scale = parse_pair(matches.value_of("SCALE").unwrap())?;

        if scale != (1, 1) {
            pp.render_passes.push(passes::nearest_scale(scale.0, scale.1));
        }
    }

    let bayer_map = {
        let (rows, cols) = parse_pair(matches.value_of("BAYERLEVEL").unwrap())?;

        bayer::generate(rows, cols)?
    };

    let mut linear_palette = cga_palette().to_vec();
    let mut dither_lut = {
        let palette = linear_palette.clone();
        DitherLut::build(&linear_palette, move |target| {
            eval_nearest_dithered_color(&palette, allowed_dither, target)
        })
    };

    if black_crush_high > 0.0 {
        pp.render_passes
            .push(passes::black_crush(black_crush_low, black_crush_high));
    }

    if local_contrast_gain != 0.0 {
        passes::add_local_contrast(
            &mut pp.render_passes,
            local_contrast_stddev,
            local_contrast_gain,
            0.0,
            0.0,
        );
    }

    let temporal_dithering = matches.is_present("TEMPORAL");
    let temporal_dithering_client =
        !temporal_dithering || matches.value_of("TEMPORAL") == Some("client");

    if !temporal_dithering {
        push_algorithm(
            &mut pp,
            &algorithm,
            linear_palette,
            bayer_map,
            dither_lut,
            NormalOutput,
        )?;
    } else {
        let (combined, indices) = combine_palette(&linear_palette);

        linear_palette = combined;

        let tdo = AsyncTemporalDitherOutput {
            indices,
            frame_count: 0,
            staggered,
        };

        // pairs of combined colors only flicker well when their hues
        // are close (or either is achromatic) and their brightness is
        let combine_allowed_dither = {
            let palette = linear_palette.clone();
            move |left: usize, right: usize| {
                let left_hsp = rgb_to_hsp(palette[left]);
                let right_hsp = rgb_to_hsp(palette[right]);

                let hue_dist = (left_hsp[0] - right_hsp[0]).abs() % 1.0;
                let has_color = left_hsp[1] > 0.25 && right_hsp[1] > 0.25;
                let value_dist = (left_hsp[2] - right_hsp[2]).abs();

                (hue_dist < 0.25 || !has_color) && value_dist < 0.15
            }
        };

        dither_lut = {
            let palette = linear_palette.clone();
            let combine_allowed_dither = combine_allowed_dither.clone();
            DitherLut::build(&linear_palette, move |target| {
                eval_nearest_dithered_color(&palette, &combine_allowed_dither, target)
            })
        };

        push_algorithm(&mut pp, &algorithm, linear_palette, bayer_map, dither_lut, tdo)?;
    }

    let mut receiver = FrameReceiver::bind(matches.value_of("RECV").unwrap())?;
    receiver.start(Some(STREAM_PRIORITY));

    let send_socket = Arc::new(UdpSocket::bind("0.0.0.0:0")?);
    let mut sender = FrameSender::new(Arc::clone(&send_socket));
    sender.set_remote(matches.value_of("SEND").unwrap())?;
    // pace the row burst a little so busy receivers keep up
    sender.pacing = Some(Duration::from_micros(150));

    let processed_frame = Arc::new(Mutex::new(FrameOwned::new()));
    let vsync_seen = Arc::new(AtomicBool::new(false));
    // single-slot handoff: a send already in flight swallows requests
    let (send_tx, send_rx) = crossbeam_channel::bounded::<()>(1);

    {
        let processed_frame = Arc::clone(&processed_frame);

        thread::spawn(move || {
            if let Err(err) = timing::init_rt(Some(STREAM_PRIORITY)) {
                eprintln!("sender thread: {}", err);
            }

            let mut downscaled = FrameOwned::new();
            let mut frame_idx: i64 = -1;

            while send_rx.recv().is_ok() {
                {
                    let processed = processed_frame.lock().unwrap();

                    if !processed.has_data() {
                        continue;
                    }

                    if processed.bpp == 8 && !temporal_dithering_client {
                        // client can't flicker: fold the pair frame to
                        // 4 bpp here, alternating nibbles per frame
                        frame_idx += 1;

                        downscaled.resize(processed.width, processed.height, 4);
                        downscaled.aspect_ratio = processed.aspect_ratio;

                        for y in 0..downscaled.height {
                            for x in 0..downscaled.width {
                                let i: u8 = processed.read(x, y);

                                pack_nibble(
                                    &downscaled,
                                    x,
                                    y,
                                    if frame_idx % 2 == 0 { i >> 4 } else { i % 16 },
                                );
                            }
                        }
                    } else {
                        downscaled.copy_from(&processed);
                    }
                }

                if downscaled.has_data() {
                    if let Err(err) = sender.send_frame(&downscaled) {
                        eprintln!("send failed: {}", err);
                    }
                }
            }
        });
    }

    if vsync_signal {
        println!("Using remote VSYNC signal");

        {
            let send_socket = Arc::clone(&send_socket);
            let vsync_seen = Arc::clone(&vsync_seen);
            let send_tx = send_tx.clone();

            thread::spawn(move || {
                let mut buf = [0u8; 64 * 1024];

                // any datagram on the send socket counts as an ack
                while send_socket.recv_from(&mut buf).is_ok() {
                    vsync_seen.store(true, Ordering::Relaxed);
                    let _ = send_tx.try_send(());
                }
            });
        }

        {
            let vsync_seen = Arc::clone(&vsync_seen);
            let send_tx = send_tx.clone();

            thread::spawn(move || {
                let mut waiting_cycles = 0u32;

                loop {
                    thread::sleep(VSYNC_DEADLINE);

                    if vsync_seen.swap(false, Ordering::Relaxed) {
                        waiting_cycles = 0;
                        continue;
                    }

                    waiting_cycles += 1;
                    print!(
                        "Too long since last VSYNC, forcing new frame ({})\r",
                        waiting_cycles
                    );
                    use std::io::Write;
                    let _ = std::io::stdout().flush();

                    let _ = send_tx.try_send(());
                }
            });
        }
    }

    let mut internal_buffer = FrameOwned::new();
    let mut tmp_buffer = FrameOwned::new();
    let mut seen = 0u64;
    let mut last_hash: Option<u64> = None;

    loop {
        seen = receiver.wait_for_frame(seen);

        {
            let front = receiver.lock_front();
            let current_hash = frame_hash(&front.frame);

            if front.frame.has_data() && Some(current_hash) != last_hash {
                if front.frame.width == 640
                    && front.frame.height == 400
                    && (front.frame.aspect_ratio - 4.0 / 3.0).abs() < 1e-3
                {
                    // dosbox annoyingly likes to render 640x200 as 640x400
                    tmp_buffer.resize_with_pitch(640, 200, front.frame.pitch, front.frame.bpp);
                    tmp_buffer.aspect_ratio = front.frame.aspect_ratio;

                    let pitch = front.frame.pitch as usize;
                    let src = front.frame.as_slice();
                    let dst = tmp_buffer.as_mut_slice();

                    for y in 0..200usize {
                        dst[y * pitch..(y + 1) * pitch]
                            .copy_from_slice(&src[y * 2 * pitch..(y * 2 + 1) * pitch]);
                    }

                    pp.apply(&tmp_buffer, &mut internal_buffer);
                } else {
                    pp.apply(&front.frame, &mut internal_buffer);
                }

                last_hash = Some(current_hash);
            }
        }

        {
            let mut processed = processed_frame.lock().unwrap();
            processed.copy_from(&internal_buffer);
        }

        if !vsync_signal {
            let _ = send_tx.try_send(());
        }
    }
}
