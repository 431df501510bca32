//! Threshold policy extraction from model header extensions.
//!
//! Three extension names are recognised:
//!
//! | name          | meaning                                   |
//! |---------------|-------------------------------------------|
//! | `trueIfAbove` | lower bound, parsed as `f32`              |
//! | `trueIfBelow` | upper bound, parsed as `f32`              |
//! | `useAsScore`  | output field mirrored into `score`        |
//!
//! A bound that does not parse disables the whole policy for that model
//! version. Deploys never fail because of threshold metadata.

use crate::types::{Extension, ThresholdPolicy};

pub const TRUE_IF_ABOVE: &str = "trueIfAbove";
pub const TRUE_IF_BELOW: &str = "trueIfBelow";
pub const USE_AS_SCORE: &str = "useAsScore";

/// Derive the threshold policy from an ordered extension list.
///
/// Later occurrences of a key override earlier ones. Returns `None` when no
/// recognised key is present or any bound fails to parse.
pub fn extract(extensions: &[Extension]) -> Option<ThresholdPolicy> {
    let mut policy = ThresholdPolicy::default();
    let mut recognised = false;

    for ext in extensions {
        match ext.name.as_str() {
            TRUE_IF_ABOVE => {
                policy.lower_bound = Some(parse_bound(&ext.value)?);
                recognised = true;
            }
            TRUE_IF_BELOW => {
                policy.upper_bound = Some(parse_bound(&ext.value)?);
                recognised = true;
            }
            USE_AS_SCORE => {
                policy.score_field = Some(ext.value.clone());
                recognised = true;
            }
            _ => {}
        }
    }

    recognised.then_some(policy)
}

fn parse_bound(raw: &str) -> Option<f32> {
    match raw.trim().parse::<f32>() {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Ignoring threshold policy: bound {:?} is not a number ({})", raw, e);
            None
        }
    }
}
