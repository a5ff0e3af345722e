//! Proof-of-work nonce search
//!
//! An authorization server hands out a hex `challenge` and a `complexity`.
//! A nonce is accepted when
//!
//! ```text
//! hex(sha256(hex_decode(challenge || nonce))).starts_with("0" * complexity)
//! ```
//!
//! Nonces are 256 random bytes, hex encoded. There is nothing to be gained
//! from ordering the search, so every attempt is an independent draw and
//! workers need no coordination beyond a stop flag.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::params::{MAX_COMPLEXITY, NONCE_BYTES};

/// Attempts between two checks of the stop flag
const STOP_CHECK_INTERVAL: u64 = 256;

/// How often the parallel solver looks at its workers
const MONITOR_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    #[error("Challenge must be hex encoded: {0:?}")]
    InvalidChallenge(String),

    #[error("Complexity {complexity} exceeds the maximum of {max}")]
    ComplexityTooHigh { complexity: usize, max: usize },
}

/// Challenge as sent by the authorization server, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub complexity: usize,
}

/// A validated proof-of-work challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChallengeResponse", into = "ChallengeResponse")]
pub struct PowChallenge {
    challenge: String,
    complexity: usize,
}

impl PowChallenge {
    pub fn new(challenge: impl Into<String>, complexity: usize) -> Result<Self, PowError> {
        let challenge = challenge.into();
        if !challenge.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PowError::InvalidChallenge(challenge));
        }
        if complexity > MAX_COMPLEXITY {
            return Err(PowError::ComplexityTooHigh {
                complexity,
                max: MAX_COMPLEXITY,
            });
        }
        Ok(Self {
            challenge,
            complexity,
        })
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn complexity(&self) -> usize {
        self.complexity
    }

    /// Mean number of attempts needed: 16^complexity
    pub fn expected_attempts(&self) -> f64 {
        16f64.powi(self.complexity as i32)
    }
}

impl TryFrom<ChallengeResponse> for PowChallenge {
    type Error = PowError;

    fn try_from(raw: ChallengeResponse) -> Result<Self, Self::Error> {
        Self::new(raw.challenge, raw.complexity)
    }
}

impl From<PowChallenge> for ChallengeResponse {
    fn from(challenge: PowChallenge) -> Self {
        Self {
            challenge: challenge.challenge,
            complexity: challenge.complexity,
        }
    }
}

/// A nonce satisfying some challenge, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check whether a digest starts with `complexity` zero hex digits
///
/// # Example
///
/// ```rust
/// use deploy_core::pow::meets_complexity;
///
/// let digest = [0x00, 0x0F, 0xFF];
/// assert!(meets_complexity(&digest, 3));
/// assert!(!meets_complexity(&digest, 4));
/// ```
#[inline(always)]
pub fn meets_complexity(digest: &[u8], complexity: usize) -> bool {
    if complexity > digest.len() * 2 {
        return false;
    }

    let full_bytes = complexity / 2;
    if digest[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }

    // An odd complexity also needs the high nibble of the next byte
    complexity % 2 == 0 || digest[full_bytes] >> 4 == 0
}

/// Hex digest of the preimage for `challenge || nonce`
///
/// Returns `None` when the nonce is not hex text.
pub fn digest_hex(challenge: &str, nonce: &str) -> Option<String> {
    preimage(challenge, nonce).map(|bytes| hex::encode(Sha256::digest(bytes)))
}

/// Server-side check of a submitted nonce
pub fn verify(challenge: &PowChallenge, nonce: &str) -> bool {
    preimage(challenge.challenge(), nonce)
        .map(|bytes| meets_complexity(&Sha256::digest(bytes), challenge.complexity()))
        .unwrap_or(false)
}

/// Hex-decode `challenge || nonce` as one string
///
/// A trailing odd nibble is dropped, which is what the authorization server's
/// decoder does with odd-length challenges.
fn preimage(challenge: &str, nonce: &str) -> Option<Vec<u8>> {
    let mut text = String::with_capacity(challenge.len() + nonce.len());
    text.push_str(challenge);
    text.push_str(nonce);
    if text.len() % 2 == 1 {
        text.pop();
    }
    hex::decode(text).ok()
}

/// Per-worker search state for one challenge
///
/// With an even-length challenge the decoded prefix is absorbed once and
/// each attempt only hashes the fresh random bytes.
struct Attempter<'a> {
    challenge: &'a PowChallenge,
    prefix: Option<Sha256>,
    raw: [u8; NONCE_BYTES],
}

impl<'a> Attempter<'a> {
    fn new(challenge: &'a PowChallenge) -> Self {
        let prefix = if challenge.challenge().len() % 2 == 0 {
            hex::decode(challenge.challenge())
                .ok()
                .map(|bytes| Sha256::new().chain_update(bytes))
        } else {
            None
        };

        Self {
            challenge,
            prefix,
            raw: [0u8; NONCE_BYTES],
        }
    }

    /// Draw one nonce and test it
    #[inline]
    fn attempt(&mut self, rng: &mut impl RngCore) -> Option<Nonce> {
        rng.fill_bytes(&mut self.raw);

        let valid = match &self.prefix {
            Some(prefix) => {
                let digest = prefix.clone().chain_update(self.raw).finalize();
                meets_complexity(&digest, self.challenge.complexity())
            }
            None => verify(self.challenge, &hex::encode(self.raw)),
        };

        valid.then(|| Nonce(hex::encode(self.raw)))
    }
}

/// Search until a valid nonce turns up
///
/// There is no bound on the number of attempts; use [`solve_until`] or
/// [`ParallelSolver`] with a deadline when the complexity is not trusted.
pub fn solve(challenge: &PowChallenge) -> Nonce {
    let never = AtomicBool::new(false);
    loop {
        if let Some(nonce) = solve_until(challenge, &never) {
            return nonce;
        }
    }
}

/// Search on the current thread until a nonce is found or `stop` is raised
pub fn solve_until(challenge: &PowChallenge, stop: &AtomicBool) -> Option<Nonce> {
    search(challenge, stop, None)
}

fn search(challenge: &PowChallenge, stop: &AtomicBool, counter: Option<&AtomicU64>) -> Option<Nonce> {
    let mut attempter = Attempter::new(challenge);
    let mut rng = rand::thread_rng();
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        if let Some(nonce) = attempter.attempt(&mut rng) {
            if let Some(counter) = counter {
                counter.fetch_add(attempts % STOP_CHECK_INTERVAL, Ordering::Relaxed);
            }
            return Some(nonce);
        }

        if attempts % STOP_CHECK_INTERVAL == 0 {
            if let Some(counter) = counter {
                counter.fetch_add(STOP_CHECK_INTERVAL, Ordering::Relaxed);
            }
            if stop.load(Ordering::Relaxed) {
                return None;
            }
        }
    }
}

/// Result of a parallel search
#[derive(Debug, Clone)]
pub struct Solution {
    pub nonce: Nonce,
    /// Attempts made across all workers (approximate, counted in batches)
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Multi-threaded solver
///
/// Workers draw nonces independently; the first valid one wins and raises
/// the shared stop flag.
#[derive(Debug, Clone)]
pub struct ParallelSolver {
    threads: usize,
    deadline: Option<Duration>,
}

impl ParallelSolver {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            deadline: None,
        }
    }

    /// Give up after `timeout`
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(timeout);
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Search until a nonce is found or the deadline passes
    pub fn solve(&self, challenge: &PowChallenge) -> Option<Solution> {
        self.solve_until(challenge, &AtomicBool::new(false))
    }

    /// Search until a nonce is found, the deadline passes or `cancel` is raised
    pub fn solve_until(&self, challenge: &PowChallenge, cancel: &AtomicBool) -> Option<Solution> {
        let stop = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let found = OnceLock::new();
        let start = Instant::now();

        info!(
            threads = self.threads,
            complexity = challenge.complexity(),
            expected_attempts = challenge.expected_attempts(),
            "starting proof-of-work search"
        );

        std::thread::scope(|scope| {
            for _ in 0..self.threads {
                scope.spawn(|| {
                    if let Some(nonce) = search(challenge, &stop, Some(&attempts)) {
                        let _ = found.set(nonce);
                        stop.store(true, Ordering::SeqCst);
                    }
                });
            }

            // Monitor workers until one succeeds, time runs out or the caller cancels
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(MONITOR_INTERVAL);

                let timed_out = self.deadline.is_some_and(|d| start.elapsed() >= d);
                if timed_out || cancel.load(Ordering::Relaxed) {
                    debug!(timed_out, "stopping proof-of-work search");
                    stop.store(true, Ordering::SeqCst);
                }
            }
        });

        let elapsed = start.elapsed();
        let attempts = attempts.load(Ordering::Relaxed);

        match found.into_inner() {
            Some(nonce) => {
                info!(attempts, elapsed_ms = elapsed.as_millis() as u64, "found nonce");
                Some(Solution {
                    nonce,
                    attempts,
                    elapsed,
                })
            }
            None => {
                info!(attempts, elapsed_ms = elapsed.as_millis() as u64, "search abandoned");
                None
            }
        }
    }
}

impl Default for ParallelSolver {
    fn default() -> Self {
        Self::new(1)
    }
}
