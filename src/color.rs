// sRGB transfer curve, HSP color space and the small vector helpers
// used throughout the downsampling passes. Everything operates on
// float triples in [0, 1] (HSP inverses may exceed 1, see hsp_to_rgb).

#[cfg(test)]
#[path = "./color_test.rs"]
mod color_test;

/// red/green/blue (or hue/saturation/brightness) triple
pub type Rgb = [f32; 3];

/// IEC 61966-2-1 sRGB to linear light, single channel
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// linear light to IEC 61966-2-1 sRGB, single channel
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

pub fn to_linear(c: Rgb) -> Rgb {
    [srgb_to_linear(c[0]), srgb_to_linear(c[1]), srgb_to_linear(c[2])]
}

pub fn to_srgb(c: Rgb) -> Rgb {
    [linear_to_srgb(c[0]), linear_to_srgb(c[1]), linear_to_srgb(c[2])]
}

/// euclidean distance in linear rgb
pub fn distance(a: Rgb, b: Rgb) -> f32 {
    let d = sub(a, b);
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

pub fn add(a: Rgb, b: Rgb) -> Rgb {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Rgb, b: Rgb) -> Rgb {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn mul(a: Rgb, s: f32) -> Rgb {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: Rgb, b: Rgb) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn clamp_scalar(x: f32, lower: f32, upper: f32) -> f32 {
    if x < lower {
        lower
    } else if x > upper {
        upper
    } else {
        x
    }
}

/// per-channel clamp to [0, 1]
pub fn clamp(c: Rgb) -> Rgb {
    [
        clamp_scalar(c[0], 0.0, 1.0),
        clamp_scalar(c[1], 0.0, 1.0),
        clamp_scalar(c[2], 0.0, 1.0),
    ]
}

// perceived-brightness weights, Finley's HSP
const PR: f32 = 0.299;
const PG: f32 = 0.587;
const PB: f32 = 0.114;

/// rgb to hue/saturation/perceived-brightness.
///
/// Hue is normalized to [0, 1). Grey inputs (r == g == b) report
/// hue and saturation zero.
pub fn rgb_to_hsp(rgb: Rgb) -> Rgb {
    let (r, g, b) = (rgb[0], rgb[1], rgb[2]);
    let p = (r * r * PR + g * g * PG + b * b * PB).sqrt();

    if r == g && r == b {
        return [0.0, 0.0, p];
    }

    let (h, s);
    if r >= g && r >= b {
        // r is largest
        if b >= g {
            h = 6.0 / 6.0 - 1.0 / 6.0 * (b - g) / (r - g);
            s = 1.0 - g / r;
        } else {
            h = 0.0 / 6.0 + 1.0 / 6.0 * (g - b) / (r - b);
            s = 1.0 - b / r;
        }
    } else if g >= r && g >= b {
        // g is largest
        if r >= b {
            h = 2.0 / 6.0 - 1.0 / 6.0 * (r - b) / (g - b);
            s = 1.0 - b / g;
        } else {
            h = 2.0 / 6.0 + 1.0 / 6.0 * (b - r) / (g - r);
            s = 1.0 - r / g;
        }
    } else {
        // b is largest
        if g >= r {
            h = 4.0 / 6.0 - 1.0 / 6.0 * (g - r) / (b - r);
            s = 1.0 - r / b;
        } else {
            h = 4.0 / 6.0 + 1.0 / 6.0 * (r - g) / (b - g);
            s = 1.0 - g / b;
        }
    }

    [h, s, p]
}

/// hue/saturation/perceived-brightness to rgb.
///
/// Some HSP combinations map outside [0, 1] (e.g. 0,1,1 gives
/// r ≈ 2.037); callers clamp where that matters.
pub fn hsp_to_rgb(hsp: Rgb) -> Rgb {
    let (mut h, s, p) = (hsp[0], hsp[1], hsp[2]);
    let min_over_max = 1.0 - s;
    let (r, g, b);

    if min_over_max > 0.0 {
        if h < 1.0 / 6.0 {
            // r > g > b
            h = 6.0 * h;
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            b = p / (PR / (min_over_max * min_over_max) + PG * part * part + PB).sqrt();
            r = b / min_over_max;
            g = b + h * (r - b);
        } else if h < 2.0 / 6.0 {
            // g > r > b
            h = 6.0 * (-h + 2.0 / 6.0);
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            b = p / (PG / (min_over_max * min_over_max) + PR * part * part + PB).sqrt();
            g = b / min_over_max;
            r = b + h * (g - b);
        } else if h < 3.0 / 6.0 {
            // g > b > r
            h = 6.0 * (h - 2.0 / 6.0);
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            r = p / (PG / (min_over_max * min_over_max) + PB * part * part + PR).sqrt();
            g = r / min_over_max;
            b = r + h * (g - r);
        } else if h < 4.0 / 6.0 {
            // b > g > r
            h = 6.0 * (-h + 4.0 / 6.0);
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            r = p / (PB / (min_over_max * min_over_max) + PG * part * part + PR).sqrt();
            b = r / min_over_max;
            g = r + h * (b - r);
        } else if h < 5.0 / 6.0 {
            // b > r > g
            h = 6.0 * (h - 4.0 / 6.0);
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            g = p / (PB / (min_over_max * min_over_max) + PR * part * part + PG).sqrt();
            b = g / min_over_max;
            r = g + h * (b - g);
        } else {
            // r > b > g
            h = 6.0 * (-h + 6.0 / 6.0);
            let part = 1.0 + h * (1.0 / min_over_max - 1.0);
            g = p / (PR / (min_over_max * min_over_max) + PB * part * part + PG).sqrt();
            r = g / min_over_max;
            b = g + h * (r - g);
        }
    } else {
        // fully saturated limit
        if h < 1.0 / 6.0 {
            h = 6.0 * h;
            r = (p * p / (PR + PG * h * h)).sqrt();
            g = r * h;
            b = 0.0;
        } else if h < 2.0 / 6.0 {
            h = 6.0 * (-h + 2.0 / 6.0);
            g = (p * p / (PG + PR * h * h)).sqrt();
            r = g * h;
            b = 0.0;
        } else if h < 3.0 / 6.0 {
            h = 6.0 * (h - 2.0 / 6.0);
            g = (p * p / (PG + PB * h * h)).sqrt();
            b = g * h;
            r = 0.0;
        } else if h < 4.0 / 6.0 {
            h = 6.0 * (-h + 4.0 / 6.0);
            b = (p * p / (PB + PG * h * h)).sqrt();
            g = b * h;
            r = 0.0;
        } else if h < 5.0 / 6.0 {
            h = 6.0 * (h - 4.0 / 6.0);
            b = (p * p / (PB + PR * h * h)).sqrt();
            r = b * h;
            g = 0.0;
        } else {
            h = 6.0 * (-h + 6.0 / 6.0);
            r = (p * p / (PR + PB * h * h)).sqrt();
            b = r * h;
            g = 0.0;
        }
    }

    [r, g, b]
}

/// quintic smoothing on the clamped interval [edge0, edge1]
pub fn smootherstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let x = clamp_scalar((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}
