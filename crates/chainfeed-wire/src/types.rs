//! Scalar wire types shared across the protocol: 64-bit base-32 names,
//! fixed-size digests, keys, signatures and the chain time types.
//!
//! All types serialize to their canonical text form (names as strings,
//! digests as lowercase hex, timestamps as ISO-8601) so decoded events can
//! be exported as JSON without further conversion.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WireError;

// ─── Name ─────────────────────────────────────────────────────────────────────

const NAME_CHARS: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// A 64-bit account/table/action name in base-32 encoding
/// (up to 12 chars from `.12345a-z`, plus a 13th 4-bit char).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub u64);

impl Name {
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Parse a name from its textual form.
    ///
    /// Returns an error for characters outside `.12345a-z` or names longer
    /// than 13 characters.
    pub fn new(s: &str) -> Result<Self, WireError> {
        s.parse()
    }

    fn char_value(name: &str, c: u8) -> Result<u64, WireError> {
        match c {
            b'a'..=b'z' => Ok((c - b'a') as u64 + 6),
            b'1'..=b'5' => Ok((c - b'1') as u64 + 1),
            b'.' => Ok(0),
            _ => Err(WireError::InvalidNameChar {
                name: name.to_string(),
                ch: c as char,
            }),
        }
    }
}

impl FromStr for Name {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, WireError> {
        if s.len() > 13 {
            return Err(WireError::NameTooLong(s.to_string()));
        }
        let bytes = s.as_bytes();
        let mut value: u64 = 0;
        for (i, &c) in bytes.iter().enumerate() {
            let v = Self::char_value(s, c)?;
            if i < 12 {
                value |= (v & 0x1f) << (64 - 5 * (i + 1));
            } else {
                // 13th character only has 4 bits available
                if v > 0x0f {
                    return Err(WireError::InvalidNameChar {
                        name: s.to_string(),
                        ch: c as char,
                    });
                }
                value |= v;
            }
        }
        Ok(Name(value))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = [b'.'; 13];
        let mut v = self.0;
        for i in (0..13).rev() {
            if i == 12 {
                chars[i] = NAME_CHARS[(v & 0x0f) as usize];
                v >>= 4;
            } else {
                chars[i] = NAME_CHARS[(v & 0x1f) as usize];
                v >>= 5;
            }
        }
        let s = std::str::from_utf8(&chars).expect("name charset is ASCII");
        write!(f, "{}", s.trim_end_matches('.'))
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ─── Digests ──────────────────────────────────────────────────────────────────

macro_rules! digest_type {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = WireError;

            fn from_str(s: &str) -> Result<Self, WireError> {
                let raw = hex::decode(s).map_err(|_| WireError::InvalidDigest(s.to_string()))?;
                let arr: [u8; $len] = raw
                    .try_into()
                    .map_err(|_| WireError::InvalidDigest(s.to_string()))?;
                Ok(Self(arr))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

digest_type!(
    /// 20-byte digest (ripemd160 checksums).
    Checksum160,
    20
);
digest_type!(
    /// 32-byte digest: block ids, transaction ids, code hashes.
    Checksum256,
    32
);
digest_type!(
    /// 64-byte digest (sha512 checksums).
    Checksum512,
    64
);

// ─── Keys and signatures ──────────────────────────────────────────────────────

/// A public key as carried on the wire: a one-byte curve discriminant
/// followed by 33 bytes of key data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: u8,
    pub data: [u8; 33],
}

impl Default for PublicKey {
    fn default() -> Self {
        Self {
            key_type: 0,
            data: [0; 33],
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PUB_K{}_{}", self.key_type + 1, hex::encode(self.data))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A signature as carried on the wire: a one-byte curve discriminant
/// followed by 65 bytes of signature data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub sig_type: u8,
    pub data: [u8; 65],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            sig_type: 0,
            data: [0; 65],
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG_K{}_{}", self.sig_type + 1, hex::encode(self.data))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ─── Time types ───────────────────────────────────────────────────────────────

/// Microseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimePoint(pub u64);

impl TimePoint {
    pub fn micros(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_iso8601_millis(self.0 / 1000, f)
    }
}

impl Serialize for TimePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimePointSec(pub u32);

impl fmt::Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_iso8601_millis(self.0 as u64 * 1000, f)
    }
}

impl Serialize for TimePointSec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Half-second block slots since 2000-01-01T00:00:00.000 UTC.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockTimestamp(pub u32);

/// Milliseconds between the Unix epoch and the block timestamp epoch.
const BLOCK_TIMESTAMP_EPOCH_MS: u64 = 946_684_800_000;

impl BlockTimestamp {
    /// Slot length in milliseconds.
    pub const INTERVAL_MS: u64 = 500;

    pub fn to_unix_millis(self) -> u64 {
        self.0 as u64 * Self::INTERVAL_MS + BLOCK_TIMESTAMP_EPOCH_MS
    }
}

impl fmt::Display for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_iso8601_millis(self.to_unix_millis(), f)
    }
}

impl Serialize for BlockTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render Unix milliseconds as `YYYY-MM-DDTHH:MM:SS.mmm`.
///
/// Uses the days-to-civil-date algorithm so the codec stays free of a
/// calendar dependency for what is purely an export format.
fn format_iso8601_millis(unix_ms: u64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let millis = unix_ms % 1000;
    let secs = unix_ms / 1000;
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (hour, minute, second) = (rem / 3600, (rem / 60) % 60, rem % 60);

    // Howard Hinnant's civil_from_days
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    write!(
        f,
        "{y:04}-{m:02}-{d:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}"
    )
}

// ─── Tests ────────────────────────────────────────────────────────────────────
