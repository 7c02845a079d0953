//! Quality gate applied to summarization output before anything is written.

use std::fmt;

use crate::summarization::BillSummary;

/// Shortest narrative summary, in characters after trimming, that is accepted.
pub const MIN_SUMMARY_CHARS: usize = 40;

/// Why a summary was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Narrative summary is blank.
    EmptySummary,
    /// Narrative summary is shorter than [`MIN_SUMMARY_CHARS`].
    SummaryTooShort {
        /// Trimmed character count.
        length: usize,
    },
    /// Section-by-section breakdown is empty.
    MissingSections,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::EmptySummary => f.write_str("summary is empty"),
            RejectionReason::SummaryTooShort { length } => write!(
                f,
                "summary too short ({length} chars, minimum {MIN_SUMMARY_CHARS})"
            ),
            RejectionReason::MissingSections => f.write_str("structured summary is empty"),
        }
    }
}

/// Accept `summary`, or say why it must be diverted to the audit trail.
pub fn evaluate(summary: &BillSummary) -> Result<(), RejectionReason> {
    let length = summary.summary.trim().chars().count();
    if length == 0 {
        return Err(RejectionReason::EmptySummary);
    }
    if length < MIN_SUMMARY_CHARS {
        return Err(RejectionReason::SummaryTooShort { length });
    }
    if summary.structured_summary.is_empty() {
        return Err(RejectionReason::MissingSections);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarization::SummarySection;

    fn summary_of(length: usize, sections: usize) -> BillSummary {
        BillSummary {
            summary: "s".repeat(length),
            structured_summary: (0..sections)
                .map(|index| SummarySection {
                    title: format!("Sec. {}", index + 1),
                    text: "Explains the section.".into(),
                    citations: Vec::new(),
                })
                .collect(),
            ..BillSummary::default()
        }
    }

    #[test]
    fn thirty_nine_characters_is_rejected() {
        assert_eq!(
            evaluate(&summary_of(39, 1)),
            Err(RejectionReason::SummaryTooShort { length: 39 })
        );
    }

    #[test]
    fn forty_characters_is_accepted() {
        assert_eq!(evaluate(&summary_of(40, 1)), Ok(()));
    }

    #[test]
    fn empty_sections_are_always_rejected() {
        assert_eq!(
            evaluate(&summary_of(5000, 0)),
            Err(RejectionReason::MissingSections)
        );
    }

    #[test]
    fn blank_summary_is_rejected() {
        let mut summary = summary_of(0, 2);
        summary.summary = "   \n".into();
        assert_eq!(evaluate(&summary), Err(RejectionReason::EmptySummary));
    }

    #[test]
    fn surrounding_whitespace_does_not_count() {
        let mut summary = summary_of(39, 1);
        summary.summary = format!("  {}  ", summary.summary);
        assert!(evaluate(&summary).is_err());
    }
}
