//! Generation tokens
//!
//! Tokens are RFC 4122 version-1 UUIDs. The 60-bit timestamp they embed
//! (100ns ticks since 1582-10-15) defines their order, so a token minted later
//! always sorts after one minted earlier.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{IdentityError, IdentityResult};

/// 100ns ticks between the Gregorian epoch and the Unix epoch.
const GREGORIAN_OFFSET: u64 = 0x01B2_1DD2_1381_4000;

/// Largest timestamp the 60-bit version-1 layout can carry.
const MAX_TICKS: u64 = 0x0fff_ffff_ffff_ffff;

/// Identifier of one concrete snapshot; doubles as the wire etag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationToken(Uuid);

impl GenerationToken {
    /// Wrap an existing UUID (client-pinned tokens).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Embedded timestamp in 100ns ticks since the Gregorian epoch.
    ///
    /// Read from the version-1 field layout regardless of the actual version,
    /// so foreign UUIDs still get a stable (if meaningless) position.
    pub fn ticks(&self) -> u64 {
        let b = self.0.as_bytes();
        let time_low = u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64;
        let time_mid = u16::from_be_bytes([b[4], b[5]]) as u64;
        let time_hi = (u16::from_be_bytes([b[6], b[7]]) & 0x0fff) as u64;
        (time_hi << 48) | (time_mid << 32) | time_low
    }

    /// Whether this is a time-based (version-1) UUID.
    pub fn is_time_based(&self) -> bool {
        self.0.get_version_num() == 1
    }

    /// Creation time, for version-1 tokens only.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_time_based() {
            return None;
        }
        let unix_ticks = self.ticks().checked_sub(GREGORIAN_OFFSET)?;
        let secs = (unix_ticks / 10_000_000) as i64;
        let nanos = ((unix_ticks % 10_000_000) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Whether a path segment has the hyphenated 8-4-4-4-12 UUID shape.
    pub fn is_token_shaped(segment: &str) -> bool {
        let bytes = segment.as_bytes();
        bytes.len() == 36
            && bytes.iter().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => *b == b'-',
                _ => b.is_ascii_hexdigit(),
            })
    }

    /// Parse a hyphenated token.
    pub fn parse(segment: &str) -> IdentityResult<Self> {
        if !Self::is_token_shaped(segment) {
            return Err(IdentityError::InvalidToken(segment.to_string()));
        }
        Uuid::parse_str(segment)
            .map(Self)
            .map_err(|_| IdentityError::InvalidToken(segment.to_string()))
    }
}

impl Ord for GenerationToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks()
            .cmp(&other.ticks())
            .then_with(|| self.0.as_bytes().cmp(other.0.as_bytes()))
    }
}

impl PartialOrd for GenerationToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for GenerationToken {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Mints strictly increasing version-1 tokens.
///
/// If the clock has not advanced since the previous token (or went
/// backwards), the tick is bumped past the last one issued.
#[derive(Debug)]
pub struct TokenMinter {
    last_ticks: AtomicU64,
    /// Clock sequence (2 bytes) followed by node id (6 bytes).
    node: [u8; 8],
}

impl TokenMinter {
    /// Create a minter with a random clock sequence and node id.
    pub fn new() -> Self {
        let mut node = [0u8; 8];
        rand::thread_rng().fill(&mut node);
        // RFC 4122 variant
        node[0] = (node[0] & 0x3f) | 0x80;
        // Random node ids must have the multicast bit set
        node[2] |= 0x01;
        Self {
            last_ticks: AtomicU64::new(0),
            node,
        }
    }

    /// Mint a token that sorts after every token minted or observed so far.
    ///
    /// Fails once the last representable timestamp has been issued or
    /// observed; the timestamp field never wraps.
    pub fn mint(&self) -> IdentityResult<GenerationToken> {
        let now = now_ticks().min(MAX_TICKS);
        let mut last = self.last_ticks.load(AtomicOrdering::SeqCst);
        loop {
            let next = if now > last {
                now
            } else if last < MAX_TICKS {
                last + 1
            } else {
                return Err(IdentityError::TokensExhausted);
            };
            match self.last_ticks.compare_exchange(
                last,
                next,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => return Ok(self.encode(next)),
                Err(actual) => last = actual,
            }
        }
    }

    /// Record an existing token so later mints sort after it.
    ///
    /// Called while reloading persisted state and for client-pinned tokens;
    /// protects against clocks that moved backwards across a restart. Only
    /// version-1 tokens carry a real timestamp, so other versions are ignored.
    pub fn observe(&self, token: &GenerationToken) {
        if !token.is_time_based() {
            return;
        }
        self.last_ticks
            .fetch_max(token.ticks(), AtomicOrdering::SeqCst);
    }

    fn encode(&self, ticks: u64) -> GenerationToken {
        let time_low = (ticks & 0xffff_ffff) as u32;
        let time_mid = ((ticks >> 32) & 0xffff) as u16;
        let time_hi_and_version = (((ticks >> 48) & 0x0fff) as u16) | 0x1000;
        GenerationToken(Uuid::from_fields(
            time_low,
            time_mid,
            time_hi_and_version,
            &self.node,
        ))
    }
}

impl Default for TokenMinter {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ticks() -> u64 {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
    nanos / 100 + GREGORIAN_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_tokens_are_version_one() {
        let minter = TokenMinter::new();
        let token = minter.mint().unwrap();
        assert_eq!(token.as_uuid().get_version_num(), 1);
        assert!(token.created_at().is_some());
    }

    #[test]
    fn test_minted_tokens_strictly_increase() {
        let minter = TokenMinter::new();
        let mut previous = minter.mint().unwrap();
        for _ in 0..1000 {
            let next = minter.mint().unwrap();
            assert!(next > previous);
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_observe_moves_minter_forward() {
        let minter = TokenMinter::new();
        // Far in the future
        let future = GenerationToken::parse("00000000-0000-1f00-9234-0123456789ab").unwrap();
        minter.observe(&future);
        assert!(minter.mint().unwrap() > future);
    }

    #[test]
    fn test_observe_ignores_random_tokens() {
        let minter = TokenMinter::new();
        // Version 4 with a huge value where a v1 timestamp would sit
        let random = GenerationToken::parse("ffffffff-ffff-4fff-9234-0123456789ab").unwrap();
        minter.observe(&random);
        let minted = minter.mint().unwrap();
        assert!(minted.ticks() < random.ticks());
        assert!(minted.created_at().is_some());
    }

    #[test]
    fn test_mint_never_wraps_past_last_timestamp() {
        let minter = TokenMinter::new();
        let last = GenerationToken::parse("ffffffff-ffff-1fff-9234-0123456789ab").unwrap();
        assert_eq!(last.ticks(), MAX_TICKS);
        minter.observe(&last);
        assert_eq!(minter.mint(), Err(IdentityError::TokensExhausted));
    }

    #[test]
    fn test_mint_reaches_last_timestamp() {
        let minter = TokenMinter::new();
        let almost = GenerationToken::parse("fffffffe-ffff-1fff-9234-0123456789ab").unwrap();
        minter.observe(&almost);
        let last = minter.mint().unwrap();
        assert_eq!(last.ticks(), MAX_TICKS);
        assert!(last > almost);
        assert!(minter.mint().is_err());
    }

    #[test]
    fn test_ticks_roundtrip_through_layout() {
        let token = GenerationToken::parse("76f22880-362c-11e4-9234-0123456789ab").unwrap();
        let created = token.created_at().unwrap();
        // 2014-09-07 01:15:33 UTC
        assert_eq!(created.format("%Y-%m-%d").to_string(), "2014-09-07");
    }

    #[test]
    fn test_ordering_by_time_not_bytes() {
        // Byte order would put these the other way round
        let earlier = GenerationToken::parse("ffffffff-0000-11e4-9234-0123456789ab").unwrap();
        let later = GenerationToken::parse("00000000-0001-11e4-9234-0123456789ab").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_token_shape() {
        assert!(GenerationToken::is_token_shaped(
            "8b0a6880-0311-11e4-9234-0123456789ab"
        ));
        assert!(!GenerationToken::is_token_shaped("8b0a688003111e49234012345678ab"));
        assert!(!GenerationToken::is_token_shaped("624484477"));
        assert!(GenerationToken::parse("{8b0a6880-0311-11e4-9234-0123456789ab}").is_err());
    }

    #[test]
    fn test_display_is_hyphenated_lowercase() {
        let text = "8b0a6880-0311-11e4-9234-0123456789ab";
        assert_eq!(GenerationToken::parse(text).unwrap().to_string(), text);
    }
}
