//! Candidate seats for simulated buyers and the seedable random source that
//! drives every simulation decision.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::SeatRequest;

pub type SimRng = ChaCha8Rng;

/// Hands out independent generators. With a seed every generator is a
/// distinct, reproducible ChaCha stream; without one they come from entropy.
#[derive(Debug)]
pub struct RngSource {
    seed: Option<u64>,
    next_stream: AtomicU64,
}

impl RngSource {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            next_stream: AtomicU64::new(0),
        }
    }

    pub fn next_rng(&self) -> SimRng {
        match self.seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(self.next_stream.fetch_add(1, Ordering::Relaxed));
                rng
            }
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueLayout {
    pub name: &'static str,
    pub sections: &'static [&'static str],
    pub rows: i32,
    pub seats_per_row: i32,
}

const LAYOUTS: [VenueLayout; 3] = [
    VenueLayout {
        name: "arena",
        sections: &["floor", "lower", "upper"],
        rows: 25,
        seats_per_row: 30,
    },
    VenueLayout {
        name: "theatre",
        sections: &["stalls", "circle", "balcony"],
        rows: 20,
        seats_per_row: 24,
    },
    VenueLayout {
        name: "club",
        sections: &["standing", "mezzanine"],
        rows: 10,
        seats_per_row: 40,
    },
];

impl VenueLayout {
    pub fn capacity(&self) -> i64 {
        self.sections.len() as i64 * self.rows as i64 * self.seats_per_row as i64
    }
}

/// Produces random seats inside one venue layout.
#[derive(Debug, Clone, Copy)]
pub struct SeatGenerator {
    layout: VenueLayout,
}

impl SeatGenerator {
    pub fn new(layout: VenueLayout) -> Self {
        Self { layout }
    }

    /// Events are mapped onto layouts deterministically so a seat id always
    /// means the same physical seat for a given event.
    pub fn for_event(event_id: i64) -> Self {
        let index = event_id.rem_euclid(LAYOUTS.len() as i64) as usize;
        Self::new(LAYOUTS[index])
    }

    pub fn layout(&self) -> &VenueLayout {
        &self.layout
    }

    pub fn candidate<R: Rng + ?Sized>(&self, rng: &mut R) -> SeatRequest {
        let section = self.layout.sections.choose(rng).copied().unwrap_or("general");
        let row = rng.gen_range(1..=self.layout.rows);
        let number = rng.gen_range(1..=self.layout.seats_per_row);
        let ticket_type_id = if section == self.layout.sections[0] {
            "premium"
        } else {
            "standard"
        };

        SeatRequest {
            seat_id: format!("{section}-{row}-{number}"),
            venue_layout: self.layout.name.to_string(),
            section: section.to_string(),
            row,
            number,
            ticket_type_id: ticket_type_id.to_string(),
        }
    }

    /// Between `min` and `max` candidates, inclusive.
    pub fn candidates<R: Rng + ?Sized>(&self, rng: &mut R, min: u32, max: u32) -> Vec<SeatRequest> {
        let count = if max > min { rng.gen_range(min..=max) } else { min };
        (0..count).map(|_| self.candidate(rng)).collect()
    }
}
