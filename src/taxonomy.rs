//! The seven-way detection error taxonomy and its priority ranks.
//!
//! Every ground truth and every detection ends a matching pass with exactly one
//! [`ErrorType`]. Lower ranks are closer to a correct detection, and a record's
//! type is only ever replaced by one with a strictly lower rank.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank of a record that has not been classified yet.
pub const UNSET_RANK: u8 = 5;

/// Error type assigned to a ground truth or a detection.
///
/// Variants are declared in reporting order, which is also the key order of
/// every per-type map produced by the metrics modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    /// Correct detection, one-to-one with a ground truth.
    Match,
    /// Ground truth whose qualifying detection was claimed by another ground truth.
    #[serde(rename = "LC")]
    LessCount,
    /// Extra detection on a ground truth that is already matched.
    #[serde(rename = "DC")]
    DoubleCount,
    /// Localization correct, category wrong.
    #[serde(rename = "Cls")]
    Class,
    /// Category correct, localization too loose.
    #[serde(rename = "Loc")]
    Localization,
    /// Detection that never qualifies for any ground truth.
    #[serde(rename = "Bkg")]
    Background,
    /// Ground truth that never qualifies for any detection.
    Miss,
}

impl ErrorType {
    /// All error types in reporting order.
    pub const ALL: [ErrorType; 7] = [
        ErrorType::Match,
        ErrorType::LessCount,
        ErrorType::DoubleCount,
        ErrorType::Class,
        ErrorType::Localization,
        ErrorType::Background,
        ErrorType::Miss,
    ];

    /// Priority rank used for upgrade comparisons.
    pub const fn rank(self) -> u8 {
        match self {
            ErrorType::Match => 0,
            ErrorType::LessCount | ErrorType::DoubleCount => 1,
            ErrorType::Class => 2,
            ErrorType::Localization => 3,
            ErrorType::Background | ErrorType::Miss => 4,
        }
    }

    /// Short label used in reports.
    pub const fn label(self) -> &'static str {
        match self {
            ErrorType::Match => "Match",
            ErrorType::LessCount => "LC",
            ErrorType::DoubleCount => "DC",
            ErrorType::Class => "Cls",
            ErrorType::Localization => "Loc",
            ErrorType::Background => "Bkg",
            ErrorType::Miss => "Miss",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rank of an optional error type, [`UNSET_RANK`] when unset.
pub fn rank_of(error_type: Option<ErrorType>) -> u8 {
    error_type.map_or(UNSET_RANK, ErrorType::rank)
}

/// Whether a record currently holding `current` may be relabeled as `candidate`.
///
/// Only an unset or strictly worse classification yields, so `Match` is never
/// demoted once assigned.
pub fn is_upgrade(current: Option<ErrorType>, candidate: ErrorType) -> bool {
    rank_of(current) > candidate.rank()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_table() {
        let ranks: Vec<u8> = ErrorType::ALL.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 1, 2, 3, 4, 4]);
        assert_eq!(rank_of(None), UNSET_RANK);
    }

    #[test]
    fn test_upgrade_rule() {
        assert!(is_upgrade(None, ErrorType::Miss));
        assert!(is_upgrade(Some(ErrorType::Localization), ErrorType::Class));
        assert!(!is_upgrade(Some(ErrorType::Class), ErrorType::Class));
        assert!(!is_upgrade(Some(ErrorType::Match), ErrorType::DoubleCount));
        assert!(!is_upgrade(Some(ErrorType::DoubleCount), ErrorType::LessCount));
    }

    #[test]
    fn test_serialized_labels() {
        let json = serde_json::to_string(&ErrorType::ALL).unwrap();
        assert_eq!(json, r#"["Match","LC","DC","Cls","Loc","Bkg","Miss"]"#);
        for t in ErrorType::ALL {
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t));
        }
    }
}
