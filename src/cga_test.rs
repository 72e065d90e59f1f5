use super::*;
use crate::color::to_linear;
use crate::pixel::FMT_A8R8G8B8;

/// the canonical RGBI monitor colors
pub fn reference_srgb_palette() -> Vec<Rgb> {
    [
        0x000000, 0x0000aa, 0x00aa00, 0x00aaaa, 0xaa0000, 0xaa00aa, 0xaa5500, 0xaaaaaa,
        0x555555, 0x5555ff, 0x55ff55, 0x55ffff, 0xff5555, 0xff55ff, 0xffff55, 0xffffff,
    ]
    .iter()
    .map(|&c| FMT_A8R8G8B8.to_float_srgb(c))
    .collect()
}

#[test]
fn palette_matches_reference_colors() {
    let palette = gen_cga_palette();
    let reference = reference_srgb_palette();
    assert_eq!(16, palette.len());

    for (i, (got, want)) in palette.iter().zip(reference.iter()).enumerate() {
        for ch in 0..3 {
            assert!(
                (got[ch] - want[ch]).abs() < 0.5 / 255.0 + 1e-6,
                "color {} channel {}: {} vs {}",
                i,
                ch,
                got[ch],
                want[ch]
            );
        }
    }
}

#[test]
fn brown_fix_halves_green() {
    let palette = gen_cga_palette();
    // dark yellow (6) renders as brown: green halved relative to red
    assert!((palette[6][0] - 2.0 / 3.0).abs() < 1e-6);
    assert!((palette[6][1] - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(0.0, palette[6][2]);
}

#[test]
fn linear_palette_is_memoized_form() {
    let linear = cga_palette();
    let expected = palette_to_linear(&gen_cga_palette());
    assert_eq!(16, linear.len());
    for (a, b) in linear.iter().zip(expected.iter()) {
        assert_eq!(a, b);
    }
}

#[test]
fn combine_palette_yields_all_pairs() {
    let (combined, indices) = combine_palette(cga_palette());
    assert_eq!(136, combined.len());
    assert_eq!(136, indices.len());

    // solid entries come from (i, i) pairs
    assert_eq!((0, 0), indices[0]);
    assert_eq!((15, 15), *indices.last().unwrap());

    // each entry is the midpoint of its pair
    let palette = cga_palette();
    for (c, &(i, j)) in combined.iter().zip(indices.iter()) {
        let mid = color::lerp(palette[i as usize], palette[j as usize], 0.5);
        assert_eq!(&mid, c);
    }

    // every unordered pair appears exactly once
    let mut seen = std::collections::HashSet::new();
    for &(i, j) in &indices {
        assert!(i <= j);
        assert!(seen.insert((i, j)));
    }
}

#[test]
fn pixel_interval_follows_the_pixel_clock() {
    use monitor_timing::*;
    assert_eq!(69, pixel_interval_ns(1, 1));
    assert_eq!(139, pixel_interval_ns(1, 2));
    assert_eq!(pixel_interval_ns(10, 1), pixel_interval_ns(5, 2));
    // one full row is ~63.7 us
    let row_ns = pixel_interval_ns(hscan_total(), 1);
    assert!(row_ns > 63_000 && row_ns < 64_000);
}

#[test]
fn framebuffer_constants() {
    assert_eq!(160, framebuffer::PITCH);
    assert_eq!(32_000, framebuffer::bytes());
    assert_eq!(2, monitor_timing::FRAMEBUFFER_PIXEL_WIDTH);
    assert_eq!(912, monitor_timing::hscan_total());
}

#[test]
fn solid_grey_quantizes_to_light_grey() {
    let srgb = [173.0 / 255.0, 170.0 / 255.0, 173.0 / 255.0];
    let cga = crate::dither::eval_nearest_color(cga_palette(), to_linear(srgb));
    assert_eq!(7, cga);
}
