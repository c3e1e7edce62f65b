//! Session id generation.
//!
//! A session id is `sha1(random || timestamp || pid)`, rendered as 40 hex
//! characters.
//!
//! # Issued random numbers
//!
//! Threads or processes started on a host with little boot entropy may
//! seed their generators identically. The random component is therefore
//! unique within each one-second bucket: the generator remembers what it
//! issued in the current bucket and redraws on a repeat. The bucket is
//! coarser than the timestamp's resolution, so two calls that share a
//! timestamp never share a random component.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha1::{Digest, Sha1};

/// Largest random component (inclusive).
pub const MAX_RANDOM: u32 = 99_999_999;

/// Width of a time bucket, in seconds.
const BUCKET_SECS: u64 = 1;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// An opaque, 40-character lowercase hex session identifier.
///
/// Construct one with [`IdGenerator::new_session_id`] or validate an
/// untrusted string with [`SessionId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Length of every session id.
    pub const LEN: usize = 40;

    /// Accepts exactly 40 ASCII hex digits, normalised to lowercase.
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == Self::LEN
            && value.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then(|| Self(value.to_ascii_lowercase()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// IdGenerator
// ---------------------------------------------------------------------------

type Clock = Box<dyn Fn() -> Duration + Send + Sync>;

/// Mutable state behind the generator's lock.
struct BucketState {
    /// Start of the current bucket, in seconds since the epoch. `None`
    /// until the first draw, and again after [`IdGenerator::reset`].
    bucket: Option<u64>,

    /// Random components handed out during `bucket`.
    ///
    /// Grows by one entry per id and is emptied whenever the bucket moves
    /// on, so its size is bounded by the ids issued in one second.
    issued: HashSet<u32>,

    /// Lives behind the same lock as `issued`, so a draw and its
    /// uniqueness check can never interleave with another thread's.
    rng: StdRng,
}

/// Produces unique session ids.
///
/// Most code uses the process-wide instance through [`IdGenerator::global`]
/// or [`new_session_id`]. Tests build their own, usually with a fixed
/// clock, so bucket behavior is deterministic.
///
/// The lock is held only while drawing the random component; hashing
/// happens after it is released.
pub struct IdGenerator {
    state: Mutex<BucketState>,
    clock: Clock,
    pid: u32,
    max_random: u32,
}

static GLOBAL: LazyLock<Arc<IdGenerator>> =
    LazyLock::new(|| Arc::new(IdGenerator::new()));

impl IdGenerator {
    /// Creates a generator seeded from the OS and reading the system clock.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Creates a generator with a fixed seed.
    ///
    /// Two generators with the same seed draw the same numbers, which is
    /// exactly the cold-start situation the issued set protects against.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(BucketState {
                bucket: None,
                issued: HashSet::new(),
                rng,
            }),
            clock: Box::new(system_clock),
            pid: std::process::id(),
            max_random: MAX_RANDOM,
        }
    }

    /// Replaces the clock. `clock` returns the time since the Unix epoch.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The shared, process-wide generator.
    pub fn global() -> Arc<IdGenerator> {
        Arc::clone(&GLOBAL)
    }

    /// Generates a new session id.
    pub fn new_session_id(&self) -> SessionId {
        let now = (self.clock)();
        let random = self.draw(now.as_secs());

        let source = format!(
            "{random}{}.{:06}{}",
            now.as_secs(),
            now.subsec_micros(),
            self.pid
        );
        let digest = Sha1::digest(source.as_bytes());
        SessionId(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Forgets the current bucket and everything issued in it.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.bucket = None;
        state.issued.clear();
    }

    /// How many random components were issued in the current bucket.
    pub fn issued_in_bucket(&self) -> usize {
        self.state.lock().issued.len()
    }

    /// Draws a random component not yet issued in `now_secs`'s bucket.
    ///
    /// Loops until it finds one. With a range of 10^8 and far fewer ids per
    /// second than that, the loop practically never repeats.
    ///
    /// This is the only place the generator's lock is taken. Everything
    /// the uniqueness guarantee depends on (bucket check, draw, insert)
    /// happens inside it; formatting and hashing happen in the caller,
    /// after the guard is gone.
    fn draw(&self, now_secs: u64) -> u32 {
        let bucket = now_secs - now_secs % BUCKET_SECS;

        let mut state = self.state.lock();
        // A new second starts a fresh set. Values from the previous bucket
        // can no longer collide: their timestamps differ.
        if state.bucket != Some(bucket) {
            state.bucket = Some(bucket);
            state.issued.clear();
        }

        loop {
            let random = state.rng.random_range(0..=self.max_random);
            if state.issued.insert(random) {
                tracing::trace!(bucket, random, "session id random component drawn");
                return random;
            }
        }
    }

    #[cfg(test)]
    fn with_max_random(mut self, max_random: u32) -> Self {
        self.max_random = max_random;
        self
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("pid", &self.pid)
            .field("max_random", &self.max_random)
            .finish_non_exhaustive()
    }
}

/// Generates a session id with the process-wide generator.
pub fn new_session_id() -> SessionId {
    GLOBAL.new_session_id()
}

fn system_clock() -> Duration {
    // Clocks before 1970 collapse into bucket zero.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}
