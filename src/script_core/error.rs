use thiserror::Error;

/// Constraint violations when building chunks or scripts from domain values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("profile ID is empty")]
    EmptyProfileId,

    #[error("profile ID contains a NUL byte: {0:?}")]
    ProfileIdContainsNul(String),

    #[error("profile ID {profile_id:?} is {len} bytes, {platform} allows {max}")]
    ProfileIdTooLong {
        platform: &'static str,
        profile_id: String,
        len: usize,
        max: usize,
    },

    #[error("post ID {post_id:?} does not match the {platform} pattern")]
    InvalidPostId {
        platform: &'static str,
        post_id: String,
    },

    #[error("post ID {post_id:?} encodes to {len} bytes, chunk allows {max}")]
    PostIdTooLong {
        post_id: String,
        len: usize,
        max: usize,
    },

    #[error("post ID {0:?} exceeds the safe integer range")]
    PostIdUnsafeInteger(String),

    #[error("post ID {0:?} does not fit in 128 bits")]
    PostIdOutOfRange(String),

    #[error("comment requires a post ID")]
    CommentWithoutPost,

    #[error("push of {0} bytes exceeds OP_PUSHDATA2")]
    PushTooLarge(usize),
}

/// Reasons a script is not a well-formed RANK script
///
/// Most scripts on chain are not RANK scripts, so these are expected values,
/// not failures. The script processor short-circuits on the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("script does not start with OP_RETURN")]
    NotOpReturn,

    #[error("script truncated reading {field} at offset {offset}")]
    Truncated { field: &'static str, offset: usize },

    #[error("unexpected push for {field} at offset {offset}")]
    BadPush { field: &'static str, offset: usize },

    #[error("lokad tag mismatch")]
    LokadMismatch,

    #[error("unknown sentiment byte 0x{0:02x}")]
    UnknownSentiment(u8),

    #[error("unknown platform byte 0x{0:02x}")]
    UnknownPlatform(u8),

    #[error("profile ID chunk is not valid UTF-8 or is empty")]
    InvalidProfileId,

    #[error("post ID chunk could not be decoded")]
    InvalidPostId,

    #[error("comment chunk is not valid UTF-8")]
    InvalidComment,

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}
