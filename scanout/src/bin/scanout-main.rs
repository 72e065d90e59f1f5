//! Realtime framebuffer driver for a CGA monitor: bit-bangs RGBI and
//! sync lines from a packed 4 bpp framebuffer with scan-accurate
//! timing. Must run with a realtime-capable kernel configuration.

use cgacast::cga::framebuffer;
use cgacast::scan::{LineMap, ScanGenerator};
use cgacast::timing::{self, CombinedClock, RT_PRIORITY};

use scanout::gpio::Bcm2835Gpio;

#[macro_use]
extern crate clap;
use clap::{App, Arg};

fn main() {
    let matches = App::new("cgacast-scanout")
        .version("0.1")
        .arg(Arg::with_name("FRAMES")
            .help("Number of frames to emit")
            .takes_value(true)
            .default_value("2")
            .long("frames"))
        .arg(Arg::with_name("SYNCONLY")
            .help("Emit sync pulses only (timing probe, no picture)")
            .long("sync-only"))
        .get_matches();

    let frames = value_t!(matches, "FRAMES", u64).unwrap_or(2);
    let sync_only = matches.is_present("SYNCONLY");

    // the scan loop cannot tolerate preemption or page faults; all
    // preflight failures are fatal before any line toggles
    if let Err(err) = timing::init_rt(Some(RT_PRIORITY)) {
        eprintln!("Failed to set real-time schedule priority: {}", err);
        std::process::exit(1);
    }

    let mut gpio = match Bcm2835Gpio::open() {
        Ok(gpio) => gpio,
        Err(err) => {
            eprintln!(
                "Failed to map the physical GPIO registers into the virtual memory space: {}",
                err
            );
            std::process::exit(2);
        }
    };

    let mut pixels = vec![0u8; framebuffer::bytes()];

    // test data: a repeating ramp over the dark colors
    {
        let mut count: u32 = 0;

        for pix in pixels.iter_mut() {
            *pix = (count & 0x7) as u8;
            count += 1;
            *pix |= ((count & 0x7) as u8) << 4;
            count += 1;
        }
    }

    if let Err(err) = timing::lock_memory() {
        eprintln!("{}", err);
        std::process::exit(3);
    }

    timing::stack_prefault();

    let map = LineMap::bcm_defaults();

    for &line in &[map.vsync, map.hsync, map.red, map.green, map.blue, map.intensity] {
        gpio.set_output(line);
    }

    let mut generator = ScanGenerator::new(CombinedClock::new(), gpio, map);

    generator.start();

    if sync_only {
        for _ in 0..frames {
            generator.emit_sync_frame();
        }

        return;
    }

    for _ in 0..frames {
        if let Err(err) = generator.emit_frame(&pixels) {
            eprintln!("{}", err);
            std::process::exit(4);
        }
    }
}
