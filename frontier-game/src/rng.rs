//! Deterministic random streams.
//!
//! Every draw that can influence saved state goes through a [`Mulberry32`]
//! cursor whose 32-bit state is persisted with the save. Resuming from a
//! stored cursor reproduces the remainder of the stream bit-exactly, which
//! is what makes offline catch-up indistinguishable from live ticking.

use hmac::{Hmac, Mac};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::numbers::{floor_f64_to_i64, floor_f64_to_index, i64_to_f64};

const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Mulberry32 generator with a serialisable 32-bit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current cursor position; feeding it back into [`Mulberry32::new`] resumes the stream.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Next raw 32-bit output.
    pub fn next_word(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let t = self.state;
        let mut x = (t ^ (t >> 15)).wrapping_mul(t | 1);
        x ^= x.wrapping_add((x ^ (x >> 7)).wrapping_mul(x | 61));
        x ^ (x >> 14)
    }

    /// Next float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_word()) / TWO_POW_32
    }

    /// Returns `true` with probability `probability`.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Uniformly pick one element, consuming a single draw.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let roll = self.next_f64() * crate::numbers::usize_to_f64(items.len());
        items.get(floor_f64_to_index(roll, items.len()))
    }
}

/// Integer in `[lo, hi)` computed as `floor(r * (hi - lo)) + lo`.
pub fn random_int(rng: &mut Mulberry32, lo: i64, hi: i64) -> i64 {
    let span = i64_to_f64(hi.saturating_sub(lo));
    floor_f64_to_i64(rng.next_f64() * span).saturating_add(lo)
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.next_word()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_word());
        let lo = u64::from(self.next_word());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_word().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Mulberry32 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

/// Independent draw domains carried by a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngDomain {
    Gather,
    Craft,
    Loot,
    Injury,
    Expedition,
    Dungeon,
    Farming,
}

impl RngDomain {
    #[must_use]
    pub const fn tag(self) -> &'static [u8] {
        match self {
            Self::Gather => b"gather",
            Self::Craft => b"craft",
            Self::Loot => b"loot",
            Self::Injury => b"injury",
            Self::Expedition => b"expedition",
            Self::Dungeon => b"dungeon",
            Self::Farming => b"farming",
        }
    }
}

/// Per-domain cursors derived from the save's master seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngStreams {
    gather: Mulberry32,
    craft: Mulberry32,
    loot: Mulberry32,
    injury: Mulberry32,
    expedition: Mulberry32,
    dungeon: Mulberry32,
    farming: Mulberry32,
}

impl RngStreams {
    /// Construct every stream from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        let stream = |domain: RngDomain| Mulberry32::new(derive_stream_seed(seed, domain.tag()));
        Self {
            gather: stream(RngDomain::Gather),
            craft: stream(RngDomain::Craft),
            loot: stream(RngDomain::Loot),
            injury: stream(RngDomain::Injury),
            expedition: stream(RngDomain::Expedition),
            dungeon: stream(RngDomain::Dungeon),
            farming: stream(RngDomain::Farming),
        }
    }

    /// Mutable access to one domain's cursor.
    pub fn stream(&mut self, domain: RngDomain) -> &mut Mulberry32 {
        match domain {
            RngDomain::Gather => &mut self.gather,
            RngDomain::Craft => &mut self.craft,
            RngDomain::Loot => &mut self.loot,
            RngDomain::Injury => &mut self.injury,
            RngDomain::Expedition => &mut self.expedition,
            RngDomain::Dungeon => &mut self.dungeon,
            RngDomain::Farming => &mut self.farming,
        }
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u32 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 4];
    seed_bytes.copy_from_slice(&digest[..4]);
    u32::from_le_bytes(seed_bytes)
}
