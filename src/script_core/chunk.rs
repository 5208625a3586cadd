//! Chunk-level codecs for the RANK script grammar
//!
//! Byte layout (offsets from the start of the output script):
//!
//! ```text
//! 0      OP_RETURN
//! 1      push(4)
//! 2..6   lokad tag "RANK"
//! 6      sentiment opcode (OP_1 positive, OP_0 negative)
//! 7      push(1)
//! 8      platform code
//! 9      push(profile width)
//! 10..   profile ID, right-aligned and left-padded with 0x00
//! ..     optional push(post ID)
//! ..     optional push(comment)
//! ```
//!
//! Every function here is pure. Encoders return `CodecError` on constraint
//! violations; decoders return `None` for bytes they cannot map.

use super::error::CodecError;
use super::registry::{
    lokad_label, Platform, PostIdKind, PostIdSpec, Sentiment, MAX_DIRECT_PUSH, OP_0,
    OP_PUSHDATA1, OP_PUSHDATA2,
};

/// Largest integer a `PostIdKind::Number` post ID may carry (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Grammar positions of a RANK script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptChunkField {
    Lokad,
    Sentiment,
    Platform,
    ProfileId,
    PostId,
    Comment,
}

impl ScriptChunkField {
    /// Fixed byte offset of the chunk data, `None` when it follows a
    /// variable-width chunk
    pub fn offset(&self) -> Option<usize> {
        match self {
            ScriptChunkField::Lokad => Some(2),
            ScriptChunkField::Sentiment => Some(6),
            ScriptChunkField::Platform => Some(8),
            ScriptChunkField::ProfileId => Some(10),
            ScriptChunkField::PostId | ScriptChunkField::Comment => None,
        }
    }

    /// Fixed byte length, `None` when the platform or the data decides
    pub fn len(&self) -> Option<usize> {
        match self {
            ScriptChunkField::Lokad => Some(4),
            ScriptChunkField::Sentiment | ScriptChunkField::Platform => Some(1),
            ScriptChunkField::ProfileId
            | ScriptChunkField::PostId
            | ScriptChunkField::Comment => None,
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, ScriptChunkField::PostId | ScriptChunkField::Comment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptChunkField::Lokad => "lokad",
            ScriptChunkField::Sentiment => "sentiment",
            ScriptChunkField::Platform => "platform",
            ScriptChunkField::ProfileId => "profileId",
            ScriptChunkField::PostId => "postId",
            ScriptChunkField::Comment => "comment",
        }
    }
}

/// Decode a 4-byte lokad chunk to its protocol label
pub fn bytes_to_lokad(buf: &[u8]) -> Option<&'static str> {
    let code: [u8; 4] = buf.try_into().ok()?;
    lokad_label(u32::from_be_bytes(code))
}

pub fn sentiment_to_opcode(sentiment: Sentiment) -> u8 {
    sentiment.code()
}

/// Decode a 1-byte sentiment chunk; unknown codes yield `None`
pub fn bytes_to_sentiment(buf: &[u8]) -> Option<Sentiment> {
    match buf {
        [code] => Sentiment::from_code(*code),
        _ => None,
    }
}

pub fn platform_to_bytes(platform: Platform) -> [u8; 1] {
    [platform.code()]
}

/// Decode a 1-byte platform chunk; unregistered codes yield `None`
pub fn bytes_to_platform(buf: &[u8]) -> Option<Platform> {
    match buf {
        [code] => Platform::from_code(*code),
        _ => None,
    }
}

/// Encode a profile ID into the platform's fixed-width field
///
/// The UTF-8 bytes are written right-aligned and the field is left-padded
/// with 0x00. IDs wider than the field are rejected, never truncated.
pub fn profile_id_to_bytes(platform: Platform, profile_id: &str) -> Result<Vec<u8>, CodecError> {
    let params = platform.params();
    let width = params.profile_id.len;
    let id_bytes = profile_id.as_bytes();

    if id_bytes.is_empty() {
        return Err(CodecError::EmptyProfileId);
    }
    if id_bytes.contains(&0) {
        return Err(CodecError::ProfileIdContainsNul(profile_id.to_string()));
    }
    if id_bytes.len() > width {
        return Err(CodecError::ProfileIdTooLong {
            platform: params.name,
            profile_id: profile_id.to_string(),
            len: id_bytes.len(),
            max: width,
        });
    }

    let mut buf = vec![0u8; width];
    buf[width - id_bytes.len()..].copy_from_slice(id_bytes);
    Ok(buf)
}

/// Decode a padded profile ID field
///
/// Every 0x00 byte is stripped before UTF-8 decoding. This is lossy: a field
/// that needed no padding and one padded with zeros decode alike, which is
/// why encoding refuses IDs containing NUL.
pub fn bytes_to_profile_id(buf: &[u8]) -> Option<String> {
    let stripped: Vec<u8> = buf.iter().copied().filter(|b| *b != 0).collect();
    String::from_utf8(stripped).ok()
}

/// Encode a post ID using the platform's post ID kind
pub fn post_id_to_bytes(platform: Platform, post_id: &str) -> Result<Vec<u8>, CodecError> {
    let params = platform.params();
    if !params.post_id.pattern.is_match(post_id) {
        return Err(CodecError::InvalidPostId {
            platform: params.name,
            post_id: post_id.to_string(),
        });
    }
    params.post_id.encode(post_id)
}

/// Decode a post ID chunk using the platform's post ID kind
pub fn bytes_to_post_id(platform: Platform, buf: &[u8]) -> Option<String> {
    platform.params().post_id.decode(buf)
}

/// Raw UTF-8 decode of the comment chunk
pub fn bytes_to_comment(buf: &[u8]) -> Option<String> {
    String::from_utf8(buf.to_vec()).ok()
}

impl PostIdKind {
    /// Encode a textual post ID; the caller has already matched the pattern
    pub fn encode(&self, post_id: &str) -> Result<Vec<u8>, CodecError> {
        match self {
            PostIdKind::BigInt => {
                let value: u128 = post_id
                    .parse()
                    .map_err(|_| CodecError::PostIdOutOfRange(post_id.to_string()))?;
                Ok(to_minimal_be(value))
            }
            PostIdKind::Number => {
                let value: u64 = post_id
                    .parse()
                    .map_err(|_| CodecError::PostIdUnsafeInteger(post_id.to_string()))?;
                if value > MAX_SAFE_INTEGER {
                    return Err(CodecError::PostIdUnsafeInteger(post_id.to_string()));
                }
                Ok(to_minimal_be(value as u128))
            }
            PostIdKind::String => Ok(post_id.as_bytes().to_vec()),
        }
    }

    pub fn decode(&self, buf: &[u8]) -> Option<String> {
        match self {
            PostIdKind::BigInt => from_be(buf).map(|value| value.to_string()),
            PostIdKind::Number => from_be(buf)
                .filter(|value| *value <= MAX_SAFE_INTEGER as u128)
                .map(|value| value.to_string()),
            PostIdKind::String => String::from_utf8(buf.to_vec()).ok(),
        }
    }
}

impl PostIdSpec {
    /// Encode and enforce the chunk width
    pub fn encode(&self, post_id: &str) -> Result<Vec<u8>, CodecError> {
        let bytes = self.kind.encode(post_id)?;
        if bytes.len() > self.chunk_len {
            return Err(CodecError::PostIdTooLong {
                post_id: post_id.to_string(),
                len: bytes.len(),
                max: self.chunk_len,
            });
        }
        Ok(bytes)
    }

    /// Decode a chunk of 1..=chunk_len bytes and re-check the pattern
    pub fn decode(&self, buf: &[u8]) -> Option<String> {
        if buf.is_empty() || buf.len() > self.chunk_len {
            return None;
        }
        self.kind
            .decode(buf)
            .filter(|post_id| self.pattern.is_match(post_id))
    }
}

/// Natural big-endian bytes of an unsigned integer; zero is a single 0x00
fn to_minimal_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let leading = bytes.iter().take_while(|b| **b == 0).count().min(bytes.len() - 1);
    bytes[leading..].to_vec()
}

/// Inverse of `to_minimal_be`; padded forms such as `[0x00, 0x2a]` are rejected
fn from_be(buf: &[u8]) -> Option<u128> {
    if buf.is_empty() || buf.len() > 16 {
        return None;
    }
    if buf.len() > 1 && buf[0] == 0 {
        return None;
    }
    Some(buf.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128))
}

/// Append a minimal data push (direct, OP_PUSHDATA1 or OP_PUSHDATA2)
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), CodecError> {
    match data.len() {
        0 => script.push(OP_0),
        len if len <= MAX_DIRECT_PUSH => script.push(len as u8),
        len if len <= u8::MAX as usize => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len if len <= u16::MAX as usize => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => return Err(CodecError::PushTooLarge(len)),
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Read the data push starting at `offset`
///
/// Returns the pushed bytes and the offset following them, or `None` when the
/// opcode is not a data push or the script ends early.
pub fn read_push(script: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let opcode = *script.get(offset)?;
    let (len, data_start) = match opcode {
        OP_0 => (0, offset + 1),
        1..=0x4b => (opcode as usize, offset + 1),
        OP_PUSHDATA1 => (*script.get(offset + 1)? as usize, offset + 2),
        OP_PUSHDATA2 => {
            let raw = script.get(offset + 1..offset + 3)?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, offset + 3)
        }
        _ => return None,
    };
    let data = script.get(data_start..data_start + len)?;
    Some((data, data_start + len))
}
