//! # Time-Ordered Row Identifiers
//!
//! Every row written with `auto_add_id` gets a 128-bit [`Identifier`] that
//! sorts by creation time. Identifiers are produced without coordination by an
//! explicit [`IdGenerator`] instance; there is no process-global state.
//!
//! ## Bit Layout
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          timestamp_ms                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          timestamp_ms         |  ver  |      counter_hi       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |var|                    counter_lo                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          random_tail                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! - `timestamp_ms`: 48 bits, Unix milliseconds
//! - `ver`: 4 bits, always `0b0111`
//! - `counter_hi` / `counter_lo`: 12 + 30 bits of one 42-bit counter
//! - `var`: 2 bits, always `0b10`
//! - `random_tail`: 32 bits, fresh for every identifier
//!
//! This is the RFC 9562 version 7 layout with a monotonic counter in the
//! `rand_a`/`rand_b` space (section 6.2, method 1). Only this layout is
//! produced; identifiers using the plain-random `rand_a`/`rand_b` variant are
//! parsed but never generated.
//!
//! ## Ordering Invariant
//!
//! For two identifiers A and B produced by the same generator, A produced
//! before B implies `A < B`, both as `u128` and as rendered strings. Within a
//! millisecond the counter increments; a clock that moves backward is clamped
//! to one millisecond past the last issued timestamp; a counter that overflows
//! pushes the timestamp forward one millisecond and is redrawn.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rusqlite::types::{ToSql, ToSqlOutput};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// Layout Constants
// =============================================================================

/// Version nibble stored in bits 48..52.
pub const VERSION: u8 = 0b0111;

/// Variant bits stored in bits 64..66.
pub const VARIANT: u8 = 0b10;

/// Largest value of the 42-bit counter.
pub const COUNTER_MAX: u64 = 0x3FF_FFFF_FFFF;

/// Mask for freshly drawn counters: 41 bits, so the counter's top bit starts
/// at zero and a millisecond has at least 2^41 increments of headroom.
const COUNTER_SEED_MASK: u64 = 0x1FF_FFFF_FFFF;

const TIMESTAMP_MASK: u64 = 0xFFFF_FFFF_FFFF;
const COUNTER_LO_BITS: u32 = 30;
const COUNTER_LO_MASK: u64 = 0x3FFF_FFFF;
const COUNTER_HI_MASK: u64 = 0xFFF;
const HYPHENATED_LEN: usize = 36;

// =============================================================================
// Identifier
// =============================================================================

/// A 128-bit time-ordered identifier.
///
/// Backed by a [`Uuid`]. Renders as 32 lowercase hex digits in 8-4-4-4-12
/// groups, e.g. `017f22e2-79b0-7cc3-98c4-dc0c0c07398f`. Ordering follows the
/// big-endian byte order, which is the `u128` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Uuid);

impl Identifier {
    /// Packs the variable fields into an identifier.
    ///
    /// `timestamp_ms` is truncated to 48 bits and `counter` to 42 bits.
    pub fn from_parts(timestamp_ms: u64, counter: u64, random_tail: u32) -> Self {
        let timestamp = u128::from(timestamp_ms & TIMESTAMP_MASK);
        let counter_hi = u128::from((counter >> COUNTER_LO_BITS) & COUNTER_HI_MASK);
        let counter_lo = u128::from(counter & COUNTER_LO_MASK);

        let value = (timestamp << 80)
            | (u128::from(VERSION) << 76)
            | (counter_hi << 64)
            | (u128::from(VARIANT) << 62)
            | (counter_lo << 32)
            | u128::from(random_tail);

        Self(Uuid::from_u128(value))
    }

    /// Wraps a raw 128-bit value without checking version or variant.
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Returns the raw 128-bit value.
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        (self.as_u128() >> 80) as u64
    }

    /// The 42-bit monotonic counter.
    pub fn counter(&self) -> u64 {
        let bits = self.as_u128();
        let hi = ((bits >> 64) as u64) & COUNTER_HI_MASK;
        let lo = ((bits >> 32) as u64) & COUNTER_LO_MASK;
        (hi << COUNTER_LO_BITS) | lo
    }

    /// The 32-bit random tail.
    pub fn random_tail(&self) -> u32 {
        self.as_u128() as u32
    }

    pub fn version(&self) -> u8 {
        ((self.as_u128() >> 76) & 0xF) as u8
    }

    pub fn variant(&self) -> u8 {
        ((self.as_u128() >> 62) & 0x3) as u8
    }
}

impl From<Identifier> for Uuid {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    /// Parses the hyphenated form only. Upper-case hex digits are accepted.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::InvalidArgument(format!("malformed identifier '{s}'"));

        // try_parse also takes the simple, braced and urn forms.
        if s.len() != HYPHENATED_LEN {
            return Err(malformed());
        }
        Uuid::try_parse(s).map(Self).map_err(|_| malformed())
    }
}

impl ToSql for Identifier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

// =============================================================================
// Clocks
// =============================================================================

/// Source of wall-clock milliseconds for an [`IdGenerator`].
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock set before 1970 reads as zero; the generator's clamping
        // keeps identifiers increasing regardless.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Used to pin the generator to one millisecond, or to simulate a clock that
/// jumps backward.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Mutable state shared by every call to [`IdGenerator::next_id`].
struct GeneratorState {
    /// Timestamp of the last identifier issued, `None` before the first call.
    last_timestamp_ms: Option<u64>,
    /// Counter of the last identifier issued.
    last_counter: u64,
    /// Cryptographically strong RNG seeded from the OS.
    rng: StdRng,
}

impl GeneratorState {
    fn new(rng: StdRng) -> Self {
        Self {
            last_timestamp_ms: None,
            last_counter: 0,
            rng,
        }
    }

    /// Draws a counter with its top bit cleared, and a tail.
    fn draw_counter_and_tail(&mut self) -> (u64, u32) {
        let counter = self.rng.next_u64() & COUNTER_SEED_MASK;
        let tail = self.rng.next_u32();
        (counter, tail)
    }

    /// Computes the fields of the next identifier and records them.
    fn advance(&mut self, now_ms: u64) -> (u64, u64, u32) {
        let (timestamp_ms, counter, tail) = match self.last_timestamp_ms {
            Some(last) if now_ms <= last => {
                // Clock regression is clamped, never reported.
                let timestamp_ms = if now_ms < last { last + 1 } else { now_ms };
                let counter = self.last_counter + 1;

                if counter > COUNTER_MAX {
                    let (counter, tail) = self.draw_counter_and_tail();
                    (timestamp_ms + 1, counter, tail)
                } else {
                    (timestamp_ms, counter, self.rng.next_u32())
                }
            }
            _ => {
                let (counter, tail) = self.draw_counter_and_tail();
                (now_ms, counter, tail)
            }
        };

        self.last_timestamp_ms = Some(timestamp_ms);
        self.last_counter = counter;

        (timestamp_ms, counter, tail)
    }
}

/// Produces strictly increasing [`Identifier`]s.
///
/// # Thread Safety
///
/// `IdGenerator` is `Send + Sync`. Callers on different threads serialize on
/// an internal mutex, so the ordering invariant holds for the generator as a
/// whole, not just per thread. Share one instance with `Arc`.
///
/// # Example
///
/// ```rust
/// use findb::IdGenerator;
///
/// let generator = IdGenerator::new();
/// let a = generator.next_id();
/// let b = generator.next_id();
/// assert!(a < b);
/// assert!(a.to_string() < b.to_string());
/// ```
pub struct IdGenerator {
    clock: Box<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// A generator on the system clock with an OS-seeded RNG.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// A generator on a caller-supplied clock with an OS-seeded RNG.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self::with_clock_and_rng(clock, StdRng::from_entropy())
    }

    /// A fully deterministic generator, for tests and reproducible fixtures.
    pub fn with_clock_and_rng(clock: impl Clock + 'static, rng: StdRng) -> Self {
        Self {
            clock: Box::new(clock),
            state: Mutex::new(GeneratorState::new(rng)),
        }
    }

    /// Returns the next identifier. Never fails.
    pub fn next_id(&self) -> Identifier {
        // The state is consistent between calls, so a panic elsewhere while
        // holding the lock leaves nothing to repair.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // Read under the lock: callers must see clock readings in lock order.
        let now_ms = self.clock.now_ms();
        let (timestamp_ms, counter, tail) = state.advance(now_ms);

        Identifier::from_parts(timestamp_ms, counter, tail)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("IdGenerator")
            .field("last_timestamp_ms", &state.last_timestamp_ms)
            .field("last_counter", &state.last_counter)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
