//! Static chunk registries for the RANK script grammar
//!
//! Three code tables (lokad, sentiment, platform) plus the per-platform
//! parameters. Both lookup directions are derived from the same table so the
//! code→label and label→code views cannot drift apart.
//!
//! Adding a platform means adding a `Platform` variant and one row to
//! `PLATFORMS`; the chunk codecs and the script processor read everything else
//! from the table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lokad tag for RANK scripts: ASCII "RANK" as a big-endian u32
pub const LOKAD_PREFIX_RANK: u32 = 0x52414E4B;

/// Script opcodes used by the grammar
pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_1: u8 = 0x51;
pub const OP_RETURN: u8 = 0x6a;

/// Largest push that fits in a direct push opcode
pub const MAX_DIRECT_PUSH: usize = 0x4b;

/// Lokad code → protocol label
pub static LOKAD_CODES: &[(u32, &str)] = &[(LOKAD_PREFIX_RANK, "RANK")];

/// Sentiment code → sentiment
pub static SENTIMENT_CODES: &[(u8, Sentiment)] = &[
    (OP_1, Sentiment::Positive),
    (OP_0, Sentiment::Negative),
];

/// Vote polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
        }
    }

    /// Script opcode carrying this sentiment; `SENTIMENT_CODES` mirrors this
    pub fn code(&self) -> u8 {
        match self {
            Sentiment::Positive => OP_1,
            Sentiment::Negative => OP_0,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        SENTIMENT_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, sentiment)| *sentiment)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SENTIMENT_CODES
            .iter()
            .map(|(_, sentiment)| *sentiment)
            .find(|sentiment| sentiment.as_str() == s)
            .ok_or_else(|| format!("unknown sentiment: {}", s))
    }
}

/// Social platform a vote targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
}

impl Platform {
    /// Registry row for this platform
    pub fn params(&self) -> &'static PlatformParameters {
        // row order in PLATFORMS follows variant order
        match self {
            Platform::Twitter => &PLATFORMS[0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.params().name
    }

    pub fn code(&self) -> u8 {
        self.params().code
    }

    pub fn from_code(code: u8) -> Option<Self> {
        PLATFORMS
            .iter()
            .find(|params| params.code == code)
            .map(|params| params.platform)
    }

    pub fn all() -> impl Iterator<Item = Platform> {
        PLATFORMS.iter().map(|params| params.platform)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PLATFORMS
            .iter()
            .find(|params| params.name == s)
            .map(|params| params.platform)
            .ok_or_else(|| format!("unknown platform: {}", s))
    }
}

/// Byte representation selected for a platform's post IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostIdKind {
    /// Decimal string stored as a minimal big-endian unsigned integer
    BigInt,
    /// Like `BigInt`, restricted to integers up to 2^53 - 1
    Number,
    /// Raw UTF-8 bytes of the literal ID
    String,
}

/// Post ID field definition for one platform
#[derive(Debug, Clone)]
pub struct PostIdSpec {
    /// Maximum byte width of the post ID chunk
    pub chunk_len: usize,
    /// Whole-string validation pattern over the textual post ID
    pub pattern: Regex,
    pub kind: PostIdKind,
}

/// Profile ID field definition for one platform
#[derive(Debug, Clone, Copy)]
pub struct ProfileIdSpec {
    /// Fixed byte width of the zero-padded profile ID chunk
    pub len: usize,
}

/// Per-platform registry row
#[derive(Debug, Clone)]
pub struct PlatformParameters {
    pub platform: Platform,
    pub code: u8,
    pub name: &'static str,
    pub profile_id: ProfileIdSpec,
    pub post_id: PostIdSpec,
}

/// Platform registry, built once on first use
pub static PLATFORMS: Lazy<Vec<PlatformParameters>> = Lazy::new(|| {
    vec![PlatformParameters {
        platform: Platform::Twitter,
        code: 0x01,
        name: "twitter",
        profile_id: ProfileIdSpec { len: 16 },
        post_id: PostIdSpec {
            chunk_len: 8,
            pattern: Regex::new(r"^[0-9]+$").expect("static post ID pattern"),
            kind: PostIdKind::BigInt,
        },
    }]
});

/// Look up the protocol label for a 4-byte lokad code
pub fn lokad_label(code: u32) -> Option<&'static str> {
    LOKAD_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// Look up the 4-byte lokad code for a protocol label
pub fn lokad_code(label: &str) -> Option<u32> {
    LOKAD_CODES
        .iter()
        .find(|(_, l)| *l == label)
        .map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_codes_unique_both_ways() {
        let codes: HashSet<u8> = SENTIMENT_CODES.iter().map(|(c, _)| *c).collect();
        let labels: HashSet<&str> = SENTIMENT_CODES.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(codes.len(), SENTIMENT_CODES.len());
        assert_eq!(labels.len(), SENTIMENT_CODES.len());

        let codes: HashSet<u8> = PLATFORMS.iter().map(|p| p.code).collect();
        let names: HashSet<&str> = PLATFORMS.iter().map(|p| p.name).collect();
        let variants: HashSet<Platform> = PLATFORMS.iter().map(|p| p.platform).collect();
        assert_eq!(codes.len(), PLATFORMS.len());
        assert_eq!(names.len(), PLATFORMS.len());
        assert_eq!(variants.len(), PLATFORMS.len());

        let lokad: HashSet<u32> = LOKAD_CODES.iter().map(|(c, _)| *c).collect();
        assert_eq!(lokad.len(), LOKAD_CODES.len());
    }

    #[test]
    fn test_lokad_is_ascii_rank() {
        assert_eq!(&LOKAD_PREFIX_RANK.to_be_bytes(), b"RANK");
        assert_eq!(lokad_label(LOKAD_PREFIX_RANK), Some("RANK"));
        assert_eq!(lokad_code("RANK"), Some(LOKAD_PREFIX_RANK));
        assert_eq!(lokad_label(0xdeadbeef), None);
    }

    #[test]
    fn test_sentiment_lookup() {
        assert_eq!(Sentiment::from_code(0x51), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_code(0x00), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_code(0x52), None);
        assert_eq!(Sentiment::Positive.code(), 0x51);
        assert_eq!("negative".parse::<Sentiment>(), Ok(Sentiment::Negative));
        assert!("neutral".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_twitter_parameters() {
        let params = Platform::Twitter.params();
        assert_eq!(params.code, 0x01);
        assert_eq!(params.name, "twitter");
        assert_eq!(params.profile_id.len, 16);
        assert_eq!(params.post_id.chunk_len, 8);
        assert_eq!(params.post_id.kind, PostIdKind::BigInt);
        assert_eq!(Platform::from_code(0x01), Some(Platform::Twitter));
        assert_eq!(Platform::from_code(0x7f), None);
        assert_eq!("twitter".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!(Platform::all().count(), PLATFORMS.len());
    }

    #[test]
    fn test_enum_codes_agree_with_tables() {
        for (code, sentiment) in SENTIMENT_CODES {
            assert_eq!(sentiment.code(), *code);
        }
        for params in PLATFORMS.iter() {
            assert_eq!(params.platform.params().code, params.code);
            assert_eq!(params.platform.as_str(), params.name);
        }
    }
}
