//! rankflow - RANK vote indexing
//!
//! - `script_core`: codec for lokad-tagged OP_RETURN vote scripts
//! - `ranking`: aggregation of decoded votes into profile and post rankings

pub mod ranking;
pub mod script_core;
