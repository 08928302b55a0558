//! Seeded 2D gradient noise for heightmap shaping.
//!
//! Each integer lattice corner gets one of eight unit gradients, picked
//! through a seeded permutation. A sample blends the four corner
//! contributions with a quintic fade, so the field is C2-continuous and zero
//! on the lattice itself.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::f32::consts::{FRAC_1_SQRT_2, SQRT_2};

const D: f32 = FRAC_1_SQRT_2;

/// Eight compass directions
const GRADIENTS: [[f32; 2]; 8] = [
    [1.0, 0.0],
    [D, D],
    [0.0, 1.0],
    [-D, D],
    [-1.0, 0.0],
    [-D, -D],
    [0.0, -1.0],
    [D, -D],
];

/// Gradient noise over a 256-periodic lattice
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    seed: u64,
    /// Two copies of a shuffled `0..=255` so `perm[perm[x] + y]` never wraps
    perm: Box<[u8; 512]>,
}

impl NoiseGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=u8::MAX).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut perm = Box::new([0_u8; 512]);
        let (lo, hi) = perm.split_at_mut(256);
        lo.copy_from_slice(&table);
        hi.copy_from_slice(&table);
        Self { seed, perm }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn gradient(&self, x: i32, y: i32) -> [f32; 2] {
        let px = usize::from((x & 0xFF) as u8);
        let py = usize::from((y & 0xFF) as u8);
        let h = self.perm[usize::from(self.perm[px]) + py];
        GRADIENTS[usize::from(h & 7)]
    }

    /// Noise at `(x, y)` in lattice units, in `[-1, 1]`
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let (cx, cy) = (x.floor(), y.floor());
        let (fx, fy) = (x - cx, y - cy);
        let (ix, iy) = (cx as i32, cy as i32);

        let corner = |ox: i32, oy: i32| {
            let [gx, gy] = self.gradient(ix.wrapping_add(ox), iy.wrapping_add(oy));
            gx * (fx - ox as f32) + gy * (fy - oy as f32)
        };

        let (u, v) = (fade(fx), fade(fy));
        let bottom = lerp(corner(0, 0), corner(1, 0), u);
        let top = lerp(corner(0, 1), corner(1, 1), u);

        // Unit gradients peak at sqrt(2)/2; rescale to the full range
        (lerp(bottom, top, v) * SQRT_2).clamp(-1.0, 1.0)
    }
}

/// Quintic `6t^5 - 15t^4 + 10t^3`
#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}
