use super::*;

#[test]
fn srgb_round_trips_in_8bit_domain() {
    for v in 0..=255u32 {
        let c = v as f32 / 255.0;
        let back = linear_to_srgb(srgb_to_linear(c));
        assert!((back - c).abs() < 1e-6, "{} -> {}", c, back);
    }
}

#[test]
fn linear_endpoints() {
    assert_eq!(0.0, srgb_to_linear(0.0));
    assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
    assert_eq!(0.0, linear_to_srgb(0.0));
    assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-6);
}

#[test]
fn hsp_grey_has_no_hue() {
    let hsp = rgb_to_hsp([0.5, 0.5, 0.5]);
    assert_eq!(0.0, hsp[0]);
    assert_eq!(0.0, hsp[1]);
    assert!((hsp[2] - 0.5).abs() < 1e-6);
}

#[test]
fn hsp_brightness_is_weighted() {
    // pure channels weigh in as sqrt(Pr), sqrt(Pg), sqrt(Pb)
    assert!((rgb_to_hsp([1.0, 0.0, 0.0])[2] - 0.299f32.sqrt()).abs() < 1e-6);
    assert!((rgb_to_hsp([0.0, 1.0, 0.0])[2] - 0.587f32.sqrt()).abs() < 1e-6);
    assert!((rgb_to_hsp([0.0, 0.0, 1.0])[2] - 0.114f32.sqrt()).abs() < 1e-6);
}

#[test]
fn hsp_round_trips_across_sectors() {
    // one representative from each of the six hue sectors, plus a
    // desaturated and a dark sample
    let samples: [Rgb; 8] = [
        [0.9, 0.5, 0.2],
        [0.5, 0.9, 0.2],
        [0.2, 0.9, 0.5],
        [0.2, 0.5, 0.9],
        [0.5, 0.2, 0.9],
        [0.9, 0.2, 0.5],
        [0.4, 0.35, 0.38],
        [0.05, 0.02, 0.01],
    ];
    for &c in &samples {
        let back = hsp_to_rgb(rgb_to_hsp(c));
        for i in 0..3 {
            assert!(
                (back[i] - c[i]).abs() < 1e-4,
                "{:?} -> {:?}",
                c,
                back
            );
        }
    }
}

#[test]
fn hsp_saturated_limit_can_exceed_one() {
    // documented behavior of the inverse: hsp (0,1,1) lands outside
    // rgb, at r = 1/sqrt(Pr)
    let rgb = hsp_to_rgb([0.0, 1.0, 1.0]);
    assert!((rgb[0] - 1.0 / 0.299f32.sqrt()).abs() < 1e-5, "{}", rgb[0]);
    assert!(rgb[0] > 1.0);
    assert_eq!(0.0, rgb[1]);
    assert_eq!(0.0, rgb[2]);
}

#[test]
fn distance_is_euclidean() {
    assert_eq!(0.0, distance([0.3, 0.4, 0.5], [0.3, 0.4, 0.5]));
    assert!((distance([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!((distance([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]) - 3f32.sqrt()).abs() < 1e-6);
}

#[test]
fn lerp_midpoint() {
    assert_eq!([0.5, 0.25, 0.0], lerp([0.0, 0.0, 0.0], [1.0, 0.5, 0.0], 0.5));
}

#[test]
fn clamp_limits_channels() {
    assert_eq!([0.0, 1.0, 0.5], clamp([-0.5, 1.5, 0.5]));
}

#[test]
fn smootherstep_endpoints_and_midpoint() {
    assert_eq!(0.0, smootherstep(0.0, 1.0, -1.0));
    assert_eq!(0.0, smootherstep(0.0, 1.0, 0.0));
    assert_eq!(1.0, smootherstep(0.0, 1.0, 1.0));
    assert_eq!(1.0, smootherstep(0.0, 1.0, 2.0));
    assert!((smootherstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
}
