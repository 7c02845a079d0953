//! Version code lifecycle ordering.
//!
//! This table is the only place that knows how published bill drafts rank against each other.
//! Ingestion decisions, the persistence guard, and the derived bill status all resolve through
//! [`priority`], so there is exactly one ordering in the system.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Priority assigned to codes missing from the table. Lower than [`VersionStage::Introduced`].
pub const UNKNOWN_PRIORITY: i32 = -1;

/// Lifecycle stage a published draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStage {
    /// Code not present in the table.
    Unknown,
    /// Freshly introduced in either chamber.
    Introduced,
    /// Referred, reported, or placed on a calendar.
    Committee,
    /// Passed (engrossed in) one chamber or received by the other.
    PassedChamber,
    /// Enrolled or printed as the final text.
    Final,
    /// Signed into law.
    Law,
}

impl VersionStage {
    /// Integer rank of this stage.
    pub const fn priority(self) -> i32 {
        match self {
            VersionStage::Unknown => UNKNOWN_PRIORITY,
            VersionStage::Introduced => 0,
            VersionStage::Committee => 1,
            VersionStage::PassedChamber => 2,
            VersionStage::Final => 3,
            VersionStage::Law => 4,
        }
    }

    /// Bill status label derived from this stage.
    pub const fn status(self) -> &'static str {
        match self {
            VersionStage::Unknown => "unknown",
            VersionStage::Introduced => "introduced",
            VersionStage::Committee => "in_committee",
            VersionStage::PassedChamber => "passed_chamber",
            VersionStage::Final => "enrolled",
            VersionStage::Law => "became_law",
        }
    }
}

// Codes follow the GPO bill version list.
const VERSION_TABLE: &[(&str, VersionStage)] = &[
    ("ih", VersionStage::Introduced),
    ("is", VersionStage::Introduced),
    ("rh", VersionStage::Committee),
    ("rs", VersionStage::Committee),
    ("rch", VersionStage::Committee),
    ("rcs", VersionStage::Committee),
    ("rth", VersionStage::Committee),
    ("rts", VersionStage::Committee),
    ("rah", VersionStage::Committee),
    ("ras", VersionStage::Committee),
    ("rih", VersionStage::Committee),
    ("ris", VersionStage::Committee),
    ("cdh", VersionStage::Committee),
    ("cds", VersionStage::Committee),
    ("pch", VersionStage::Committee),
    ("pcs", VersionStage::Committee),
    ("sc", VersionStage::Committee),
    ("eh", VersionStage::PassedChamber),
    ("es", VersionStage::PassedChamber),
    ("eah", VersionStage::PassedChamber),
    ("eas", VersionStage::PassedChamber),
    ("eph", VersionStage::PassedChamber),
    ("ath", VersionStage::PassedChamber),
    ("ats", VersionStage::PassedChamber),
    ("cph", VersionStage::PassedChamber),
    ("cps", VersionStage::PassedChamber),
    ("rfh", VersionStage::PassedChamber),
    ("rfs", VersionStage::PassedChamber),
    ("rdh", VersionStage::PassedChamber),
    ("rds", VersionStage::PassedChamber),
    ("hdh", VersionStage::PassedChamber),
    ("hds", VersionStage::PassedChamber),
    ("enr", VersionStage::Final),
    ("pp", VersionStage::Final),
    ("pap", VersionStage::Final),
    ("law", VersionStage::Law),
    ("pl", VersionStage::Law),
];

/// Outcome of comparing a candidate version code against a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    /// Candidate ranks strictly higher.
    Upgrade,
    /// Both codes rank the same.
    Same,
    /// Candidate ranks strictly lower.
    Downgrade,
}

impl VersionChange {
    /// Short label used in decision reasons and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            VersionChange::Upgrade => "upgrade",
            VersionChange::Same => "same",
            VersionChange::Downgrade => "downgrade",
        }
    }
}

/// Resolve the lifecycle stage for a version code (case-insensitive).
pub fn stage(code: &str) -> VersionStage {
    let normalized = code.trim().to_ascii_lowercase();
    VERSION_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == normalized)
        .map(|(_, stage)| *stage)
        .unwrap_or(VersionStage::Unknown)
}

/// Integer priority of a version code; unknown codes map to [`UNKNOWN_PRIORITY`].
pub fn priority(code: &str) -> i32 {
    stage(code).priority()
}

/// Compare candidate `a` against existing `b`.
pub fn compare(a: &str, b: &str) -> VersionChange {
    match priority(a).cmp(&priority(b)) {
        Ordering::Greater => VersionChange::Upgrade,
        Ordering::Equal => VersionChange::Same,
        Ordering::Less => VersionChange::Downgrade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_ranks_are_ordered() {
        assert_eq!(priority("ih"), 0);
        assert_eq!(priority("rh"), 1);
        assert_eq!(priority("pcs"), 1);
        assert_eq!(priority("eh"), 2);
        assert_eq!(priority("enr"), 3);
        assert_eq!(priority("law"), 4);
    }

    #[test]
    fn unknown_codes_rank_below_introduced() {
        assert_eq!(priority("zz"), UNKNOWN_PRIORITY);
        assert!(priority("zz") < priority("ih"));
        assert_eq!(compare("zz", "ih"), VersionChange::Downgrade);
    }

    #[test]
    fn compare_reports_direction() {
        assert_eq!(compare("rh", "ih"), VersionChange::Upgrade);
        assert_eq!(compare("ih", "is"), VersionChange::Same);
        assert_eq!(compare("ih", "rh"), VersionChange::Downgrade);
        assert_eq!(compare("ENR", "eh"), VersionChange::Upgrade);
    }

    #[test]
    fn stage_maps_to_status_label() {
        assert_eq!(stage("rs").status(), "in_committee");
        assert_eq!(stage("enr").status(), "enrolled");
        assert_eq!(stage("???").status(), "unknown");
    }
}
