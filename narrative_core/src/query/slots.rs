//! Slot layout - relative positions of children inside their parent.

use rand::Rng;

/// Radius of the ring pattern, in parent-local units.
const RING_RADIUS: f64 = 0.3;
/// Maximum random offset applied to a slot on each axis.
const JITTER: f64 = 0.02;
/// Share of the parent's extent that local coordinates map onto.
const ABSOLUTE_SPREAD: f64 = 0.8;

/// How slots are arranged inside a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPattern {
    /// Evenly spaced around a circle. Used inside locations.
    Ring,
    /// Rows and columns. Used inside biomes.
    Grid,
}

/// Local `(x, y)` positions in `[0, 1]` for `capacity` slots.
pub fn slot_positions<R: Rng>(capacity: u32, pattern: SlotPattern, rng: &mut R) -> Vec<(f64, f64)> {
    match capacity {
        0 => Vec::new(),
        1 => vec![(0.5, 0.5)],
        n => {
            let mut jitter = || rng.gen_range(-JITTER..=JITTER);
            match pattern {
                SlotPattern::Ring => (0..n)
                    .map(|i| {
                        let angle = std::f64::consts::TAU * f64::from(i) / f64::from(n);
                        (
                            0.5 + RING_RADIUS * angle.cos() + jitter(),
                            0.5 + RING_RADIUS * angle.sin() + jitter(),
                        )
                    })
                    .collect(),
                SlotPattern::Grid => {
                    let side = (f64::from(n)).sqrt().ceil() as u32;
                    let step = 1.0 / f64::from(side + 1);
                    (0..n)
                        .map(|i| {
                            let (row, col) = (i / side, i % side);
                            (
                                f64::from(col + 1) * step + jitter(),
                                f64::from(row + 1) * step + jitter(),
                            )
                        })
                        .collect()
                }
            }
        }
    }
}

/// First slot index not taken by a sibling, or a random one when all are taken.
pub fn free_slot_index<R: Rng>(capacity: u32, occupied: &[u32], rng: &mut R) -> Option<u32> {
    if capacity == 0 {
        return None;
    }
    (0..capacity)
        .find(|i| !occupied.contains(i))
        .or_else(|| Some(rng.gen_range(0..capacity)))
}

/// Map a local slot position onto absolute world coordinates around the parent.
pub fn absolute_coord(parent: (f64, f64), local: (f64, f64)) -> (f64, f64) {
    (
        parent.0 + (local.0 - 0.5) * ABSOLUTE_SPREAD,
        parent.1 + (local.1 - 0.5) * ABSOLUTE_SPREAD,
    )
}
