//! Gradient noise: Perlin 1D/2D/3D, fractal Brownian motion, turbulence and
//! ridged noise
//!
//! All functions are pure. Perlin outputs are signed and clamped to `[-1, 1]`.

use lazy_static::lazy_static;

/// Classic permutation from Ken Perlin's reference implementation
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

lazy_static! {
    /// Permutation repeated twice so `P[P[x] + y]` never needs wrapping
    static ref P: [usize; 512] = {
        let mut p = [0usize; 512];
        for (i, slot) in p.iter_mut().enumerate() {
            *slot = PERM[i & 255] as usize;
        }
        p
    };
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn lattice(x: f64) -> (usize, f64) {
    let floor = x.floor();
    ((floor as i64 & 255) as usize, x - floor)
}

#[inline]
fn grad1(hash: usize, x: f64) -> f64 {
    if hash & 1 != 0 {
        -x
    } else {
        x
    }
}

#[inline]
fn grad2(hash: usize, x: f64, y: f64) -> f64 {
    match hash & 3 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        _ => -x - y,
    }
}

#[inline]
fn grad3(hash: usize, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 != 0 { -u } else { u }) + (if h & 2 != 0 { -v } else { v })
}

/// 1D Perlin noise in `[-1, 1]`
pub fn perlin1d(x: f64) -> f64 {
    let (xi, xf) = lattice(x);
    let u = fade(xf);
    let n = lerp(grad1(P[xi], xf), grad1(P[xi + 1], xf - 1.0), u);
    (n * 2.0).clamp(-1.0, 1.0)
}

/// 2D Perlin noise in `[-1, 1]`
pub fn perlin2d(x: f64, y: f64) -> f64 {
    let (xi, xf) = lattice(x);
    let (yi, yf) = lattice(y);
    let u = fade(xf);
    let v = fade(yf);

    let aa = P[P[xi] + yi];
    let ab = P[P[xi] + yi + 1];
    let ba = P[P[xi + 1] + yi];
    let bb = P[P[xi + 1] + yi + 1];

    let x1 = lerp(grad2(aa, xf, yf), grad2(ba, xf - 1.0, yf), u);
    let x2 = lerp(grad2(ab, xf, yf - 1.0), grad2(bb, xf - 1.0, yf - 1.0), u);
    (lerp(x1, x2, v) * std::f64::consts::FRAC_1_SQRT_2 * 2.0).clamp(-1.0, 1.0)
}

/// 3D Perlin noise in `[-1, 1]`
pub fn perlin3d(x: f64, y: f64, z: f64) -> f64 {
    let (xi, xf) = lattice(x);
    let (yi, yf) = lattice(y);
    let (zi, zf) = lattice(z);
    let u = fade(xf);
    let v = fade(yf);
    let w = fade(zf);

    let a = P[xi] + yi;
    let aa = P[a] + zi;
    let ab = P[a + 1] + zi;
    let b = P[xi + 1] + yi;
    let ba = P[b] + zi;
    let bb = P[b + 1] + zi;

    let y1 = lerp(
        lerp(grad3(P[aa], xf, yf, zf), grad3(P[ba], xf - 1.0, yf, zf), u),
        lerp(
            grad3(P[ab], xf, yf - 1.0, zf),
            grad3(P[bb], xf - 1.0, yf - 1.0, zf),
            u,
        ),
        v,
    );
    let y2 = lerp(
        lerp(
            grad3(P[aa + 1], xf, yf, zf - 1.0),
            grad3(P[ba + 1], xf - 1.0, yf, zf - 1.0),
            u,
        ),
        lerp(
            grad3(P[ab + 1], xf, yf - 1.0, zf - 1.0),
            grad3(P[bb + 1], xf - 1.0, yf - 1.0, zf - 1.0),
            u,
        ),
        v,
    );
    lerp(y1, y2, w).clamp(-1.0, 1.0)
}

/// Fractal Brownian motion: octaves of `perlin1d`, normalized by the total
/// amplitude so the result stays in `[-1, 1]`. Zero octaves gives 0.
pub fn fbm(x: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut total = 0.0;
    for _ in 0..octaves {
        sum += perlin1d(x * frequency) * amplitude;
        total += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }
    if total == 0.0 {
        return 0.0;
    }
    (sum / total).clamp(-1.0, 1.0)
}

/// Sum of `|perlin1d|` over octaves.
///
/// Not normalized: the range is `[0, sum of amplitudes]` and grows with the
/// octave count.
pub fn turbulence(x: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    for _ in 0..octaves {
        sum += perlin1d(x * frequency).abs() * amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }
    sum
}

/// Ridged noise `offset - |perlin2d(x, y)|`; non-negative for `offset >= 1`
pub fn ridge(x: f64, y: f64, offset: f64) -> f64 {
    offset - perlin2d(x, y).abs()
}
