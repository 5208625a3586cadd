//! Script Core - RANK output script codec
//!
//! Pure, stateless translation between vote payloads and the lokad-tagged
//! OP_RETURN grammar. Registries are process-wide read-only tables; every
//! codec function can run concurrently without coordination.
//!
//! ```text
//! output script bytes
//!     ↓
//! ScriptProcessor::decode()   (fixed-offset required chunks, optional pushes)
//!     ↓
//! RankOutput                  (sentiment, platform, profileId, postId?, comment?)
//!     ↓
//! to_rank_script()            (inverse direction)
//! ```

pub mod chunk;
pub mod error;
pub mod processor;
pub mod registry;

pub use chunk::ScriptChunkField;
pub use error::{CodecError, DecodeError};
pub use processor::{to_rank_script, RankOutput, ScriptProcessor};
pub use registry::{Platform, PlatformParameters, PostIdKind, Sentiment, PLATFORMS};
