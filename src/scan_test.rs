use super::*;

/// clock stub counting accumulated time and wait flavors
struct CountingClock {
    accumulated_ns: i64,
    waits: usize,
    busy_waits: usize,
}

impl CountingClock {
    fn new() -> Self {
        CountingClock {
            accumulated_ns: 0,
            waits: 0,
            busy_waits: 0,
        }
    }
}

impl MonitorClock for CountingClock {
    fn start(&mut self) {}

    fn accumulate(&mut self, ns: i64) {
        self.accumulated_ns += ns;
    }

    fn wait(&mut self) {
        self.waits += 1;
    }

    fn busy_wait(&mut self) {
        self.busy_waits += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Set(u32),
    Clear(u32),
}

/// line driver stub recording every non-empty transition
struct RecordingLines {
    edges: Vec<Edge>,
}

impl RecordingLines {
    fn new() -> Self {
        RecordingLines { edges: Vec::new() }
    }
}

impl SignalLines for RecordingLines {
    fn set_mask(&mut self, mask: u32) {
        if mask != 0 {
            self.edges.push(Edge::Set(mask));
        }
    }

    fn clear_mask(&mut self, mask: u32) {
        if mask != 0 {
            self.edges.push(Edge::Clear(mask));
        }
    }
}

fn test_generator() -> ScanGenerator<CountingClock, RecordingLines> {
    ScanGenerator::new(CountingClock::new(), RecordingLines::new(), LineMap::bcm_defaults())
}

fn test_framebuffer(fill: u8) -> Vec<u8> {
    vec![(fill << 4) | fill; framebuffer::bytes()]
}

#[test]
fn rgbi_masks_split_the_nibble() {
    let map = LineMap::bcm_defaults();
    let gen = test_generator();

    // white: everything raised
    let (set, clear) = gen.rgbi_masks(0xF);
    assert_eq!(
        (1 << map.red) | (1 << map.green) | (1 << map.blue) | (1 << map.intensity),
        set
    );
    assert_eq!(0, clear);

    // black: everything dropped
    let (set, clear) = gen.rgbi_masks(0x0);
    assert_eq!(0, set);
    assert_eq!(
        (1 << map.red) | (1 << map.green) | (1 << map.blue) | (1 << map.intensity),
        clear
    );

    // IRGB nibble order: bit 0 is blue, bit 2 is red
    let (set, clear) = gen.rgbi_masks(0b0001);
    assert_eq!(1 << map.blue, set);
    assert_eq!((1 << map.red) | (1 << map.green) | (1 << map.intensity), clear);

    let (set, _) = gen.rgbi_masks(0b1100);
    assert_eq!((1 << map.red) | (1 << map.intensity), set);
}

#[test]
fn wait_rows_hsync_pulses_once_per_row() {
    let mut gen = test_generator();
    gen.start();
    gen.wait_rows_hsync(3);

    let (clock, lines) = gen.into_parts();

    // per row: blank/overscan/visible sleep + sync spin
    assert_eq!(3, clock.waits);
    assert_eq!(3, clock.busy_waits);
    let per_row = monitor_timing::pixel_interval_ns(
        monitor_timing::hscan_total() - monitor_timing::HSCAN_SYNC,
        1,
    ) + monitor_timing::pixel_interval_ns(monitor_timing::HSCAN_SYNC, 1);
    assert_eq!(3 * per_row, clock.accumulated_ns);

    let map = LineMap::bcm_defaults();
    let hsync_up = Edge::Set(1 << map.hsync);
    let hsync_down = Edge::Clear(1 << map.hsync);
    assert_eq!(
        vec![hsync_up, hsync_down, hsync_up, hsync_down, hsync_up, hsync_down],
        lines.edges
    );
}

#[test]
fn wait_rows_no_hsync_is_silent() {
    let mut gen = test_generator();
    gen.start();
    gen.wait_rows_no_hsync(5);

    let (clock, lines) = gen.into_parts();
    assert_eq!(1, clock.waits);
    assert!(lines.edges.is_empty());
    assert_eq!(
        monitor_timing::pixel_interval_ns(monitor_timing::hscan_total() * 5, 1),
        clock.accumulated_ns
    );
}

#[test]
fn emit_sync_frame_pulses_vsync_once() {
    let mut gen = test_generator();
    gen.start();
    gen.emit_sync_frame();

    let (clock, lines) = gen.into_parts();
    let map = LineMap::bcm_defaults();

    let total_rows = (monitor_timing::VSCAN_TOP_BLANKING
        + monitor_timing::VSCAN_TOP_OVERSCAN
        + monitor_timing::VSCAN_VISIBLE
        + monitor_timing::VSCAN_BOTTOM_OVERSCAN
        + monitor_timing::VSCAN_BOTTOM_BLANKING
        + monitor_timing::VSCAN_SYNC) as usize;

    assert_eq!(total_rows, clock.busy_waits);
    assert_eq!(
        total_rows,
        lines
            .edges
            .iter()
            .filter(|&&e| e == Edge::Set(1 << map.hsync))
            .count()
    );
    assert_eq!(
        1,
        lines
            .edges
            .iter()
            .filter(|&&e| e == Edge::Set(1 << map.vsync))
            .count()
    );
}

#[test]
fn emit_frame_rejects_misshapen_framebuffers() {
    let mut gen = test_generator();
    assert!(gen.emit_frame(&[0u8; 100]).is_err());
    assert!(gen.emit_frame(&test_framebuffer(0)).is_ok());
}

#[test]
fn emit_frame_scan_structure() {
    let mut gen = test_generator();
    gen.start();
    gen.emit_frame(&test_framebuffer(0xF)).unwrap();

    let (clock, lines) = gen.into_parts();
    let map = LineMap::bcm_defaults();

    // every visible pixel busy-waits, plus one sync spin per row of
    // the whole frame
    let total_rows = (monitor_timing::VSCAN_TOP_BLANKING
        + monitor_timing::VSCAN_TOP_OVERSCAN
        + monitor_timing::VSCAN_VISIBLE
        + monitor_timing::VSCAN_BOTTOM_OVERSCAN
        + monitor_timing::VSCAN_BOTTOM_BLANKING
        + monitor_timing::VSCAN_SYNC) as usize;
    assert_eq!(
        framebuffer::WIDTH as usize * framebuffer::HEIGHT as usize + total_rows,
        clock.busy_waits
    );

    // vsync raised exactly once, after the bottom blanking
    let vsync_up = Edge::Set(1 << map.vsync);
    let vsync_down = Edge::Clear(1 << map.vsync);
    assert_eq!(1, lines.edges.iter().filter(|&&e| e == vsync_up).count());
    assert_eq!(1, lines.edges.iter().filter(|&&e| e == vsync_down).count());

    let up_at = lines.edges.iter().position(|&e| e == vsync_up).unwrap();
    let down_at = lines.edges.iter().position(|&e| e == vsync_down).unwrap();
    assert!(up_at < down_at);
    // the sync interval carries vscan_sync hsync pulses
    let pulses_between = lines.edges[up_at..down_at]
        .iter()
        .filter(|&&e| e == Edge::Set(1 << map.hsync))
        .count();
    assert_eq!(monitor_timing::VSCAN_SYNC as usize, pulses_between);

    // white frame: RGBI lines go up, and with a constant color they
    // are never cleared mid-frame
    let all_rgbi = (1 << map.red) | (1 << map.green) | (1 << map.blue) | (1 << map.intensity);
    assert!(lines.edges.contains(&Edge::Set(all_rgbi)));
    assert!(!lines.edges.contains(&Edge::Clear(all_rgbi)));
}

#[test]
fn emit_frame_total_time_is_one_monitor_frame() {
    let mut gen = test_generator();
    gen.start();
    gen.emit_frame(&test_framebuffer(0x5)).unwrap();

    let (clock, _) = gen.into_parts();

    // accumulated intervals sum to the full scan: rounding of each
    // interval loses under 1 ns per accumulate call
    let total_rows = monitor_timing::VSCAN_TOP_BLANKING
        + monitor_timing::VSCAN_TOP_OVERSCAN
        + monitor_timing::VSCAN_VISIBLE
        + monitor_timing::VSCAN_BOTTOM_OVERSCAN
        + monitor_timing::VSCAN_BOTTOM_BLANKING
        + monitor_timing::VSCAN_SYNC;
    let exact = monitor_timing::pixel_interval_ns(monitor_timing::hscan_total() * total_rows, 1);

    let calls = total_rows * 3 + (framebuffer::WIDTH * framebuffer::HEIGHT) as i64;
    assert!(clock.accumulated_ns <= exact);
    assert!(clock.accumulated_ns > exact - calls, "{} vs {}", clock.accumulated_ns, exact);
}
