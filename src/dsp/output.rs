//! Output Clipper
//!
//! Last stage of the chain. Ride and Punch get a tanh soft clip for some analog
//! color; everything else, and anything coming out of Shred, is hard clamped so
//! the output stays numerically bounded.

use crate::modes::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clipper {
    Soft,
    Hard,
}

impl Clipper {
    pub fn select(mode: Mode, shred_active: bool) -> Self {
        if !shred_active && mode.soft_clips() {
            Clipper::Soft
        } else {
            Clipper::Hard
        }
    }

    #[inline]
    pub fn process(&self, x: f32) -> f32 {
        if !x.is_finite() {
            return 0.0;
        }
        match self {
            Clipper::Soft => x.tanh(),
            Clipper::Hard => x.clamp(-1.0, 1.0),
        }
    }
}
