//! Whole-script encode/decode for RANK outputs

use super::chunk::{
    bytes_to_comment, bytes_to_lokad, bytes_to_platform, bytes_to_post_id, bytes_to_profile_id,
    bytes_to_sentiment, platform_to_bytes, post_id_to_bytes, profile_id_to_bytes, push_data,
    read_push, sentiment_to_opcode, ScriptChunkField,
};
use super::error::{CodecError, DecodeError};
use super::registry::{Platform, Sentiment, LOKAD_PREFIX_RANK, MAX_DIRECT_PUSH, OP_RETURN};
use serde::{Deserialize, Serialize};

/// Decoded logical payload of a RANK script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankOutput {
    pub sentiment: Sentiment,
    pub platform: Platform,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Set by the caller (e.g. the casting client instance); not part of the script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl RankOutput {
    pub fn new(sentiment: Sentiment, platform: Platform, profile_id: impl Into<String>) -> Self {
        Self {
            sentiment,
            platform,
            profile_id: profile_id.into(),
            post_id: None,
            comment: None,
            instance_id: None,
        }
    }

    pub fn with_post(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Build the full output script for a RANK payload
///
/// Fails with the first encoding constraint violated; nothing is truncated.
pub fn to_rank_script(output: &RankOutput) -> Result<Vec<u8>, CodecError> {
    let profile_id = profile_id_to_bytes(output.platform, &output.profile_id)?;
    let post_id = output
        .post_id
        .as_deref()
        .map(|post_id| post_id_to_bytes(output.platform, post_id))
        .transpose()?;
    let comment = output.comment.as_deref().filter(|c| !c.is_empty());
    if comment.is_some() && post_id.is_none() {
        return Err(CodecError::CommentWithoutPost);
    }

    let mut script = Vec::with_capacity(16 + profile_id.len());
    script.push(OP_RETURN);
    push_data(&mut script, &LOKAD_PREFIX_RANK.to_be_bytes())?;
    script.push(sentiment_to_opcode(output.sentiment));
    push_data(&mut script, &platform_to_bytes(output.platform))?;
    push_data(&mut script, &profile_id)?;
    if let Some(post_id) = post_id {
        push_data(&mut script, &post_id)?;
    }
    if let Some(comment) = comment {
        push_data(&mut script, comment.as_bytes())?;
    }

    Ok(script)
}

/// Decoder for a single output script
pub struct ScriptProcessor<'a> {
    script: &'a [u8],
}

impl<'a> ScriptProcessor<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script }
    }

    /// Decode as a RANK script, discarding the rejection reason
    pub fn process_rank(&self) -> Option<RankOutput> {
        self.decode().ok()
    }

    /// Decode as a RANK script
    ///
    /// The required chunks sit at fixed offsets; each is checked for its push
    /// opcode and registry membership before the next is read. Optional
    /// chunks must be well-formed pushes when present.
    pub fn decode(&self) -> Result<RankOutput, DecodeError> {
        let script = self.script;
        if script.first() != Some(&OP_RETURN) {
            return Err(DecodeError::NotOpReturn);
        }

        let lokad = self.fixed_push(ScriptChunkField::Lokad, 4)?;
        if bytes_to_lokad(lokad) != Some("RANK") {
            return Err(DecodeError::LokadMismatch);
        }

        // Sentiment is a bare opcode, not a push
        let sentiment_offset = field_offset(ScriptChunkField::Sentiment);
        let sentiment_byte = script
            .get(sentiment_offset..sentiment_offset + 1)
            .ok_or(DecodeError::Truncated {
                field: ScriptChunkField::Sentiment.as_str(),
                offset: sentiment_offset,
            })?;
        let sentiment = bytes_to_sentiment(sentiment_byte)
            .ok_or(DecodeError::UnknownSentiment(sentiment_byte[0]))?;

        let platform_byte = self.fixed_push(ScriptChunkField::Platform, 1)?;
        let platform = bytes_to_platform(platform_byte)
            .ok_or(DecodeError::UnknownPlatform(platform_byte[0]))?;

        let profile_width = platform.params().profile_id.len;
        let profile_bytes = self.fixed_push(ScriptChunkField::ProfileId, profile_width)?;
        let mut cursor = field_offset(ScriptChunkField::ProfileId) + profile_width;
        let profile_id = bytes_to_profile_id(profile_bytes)
            .filter(|id| !id.is_empty())
            .ok_or(DecodeError::InvalidProfileId)?;

        let mut output = RankOutput::new(sentiment, platform, profile_id);

        if cursor < script.len() {
            let (post_bytes, next) = self.push_at(ScriptChunkField::PostId, cursor)?;
            let post_id =
                bytes_to_post_id(platform, post_bytes).ok_or(DecodeError::InvalidPostId)?;
            output.post_id = Some(post_id);
            cursor = next;
        }

        if cursor < script.len() {
            let (comment_bytes, next) = self.push_at(ScriptChunkField::Comment, cursor)?;
            let comment = bytes_to_comment(comment_bytes).ok_or(DecodeError::InvalidComment)?;
            output.comment = Some(comment).filter(|c| !c.is_empty());
            cursor = next;
        }

        if cursor < script.len() {
            return Err(DecodeError::TrailingBytes(script.len() - cursor));
        }

        Ok(output)
    }

    /// Read a fixed-width chunk at its fixed offset
    ///
    /// The byte before the offset must be the direct push opcode for exactly
    /// `width` bytes; PUSHDATA forms would shift the data off the grammar.
    fn fixed_push(&self, field: ScriptChunkField, width: usize) -> Result<&'a [u8], DecodeError> {
        let offset = field_offset(field);
        let opcode = *self.script.get(offset - 1).ok_or(DecodeError::Truncated {
            field: field.as_str(),
            offset: offset - 1,
        })?;
        if width == 0 || width > MAX_DIRECT_PUSH || opcode as usize != width {
            return Err(DecodeError::BadPush {
                field: field.as_str(),
                offset: offset - 1,
            });
        }
        self.script
            .get(offset..offset + width)
            .ok_or(DecodeError::Truncated {
                field: field.as_str(),
                offset,
            })
    }

    fn push_at(&self, field: ScriptChunkField, offset: usize) -> Result<(&'a [u8], usize), DecodeError> {
        if offset >= self.script.len() {
            return Err(DecodeError::Truncated {
                field: field.as_str(),
                offset,
            });
        }
        read_push(self.script, offset).ok_or(DecodeError::BadPush {
            field: field.as_str(),
            offset,
        })
    }
}

fn field_offset(field: ScriptChunkField) -> usize {
    // only called for required fields, which all have fixed offsets
    field.offset().unwrap_or_default()
}
