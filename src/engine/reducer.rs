//! Pure reducer: (SessionSummary, RawRecord) -> SessionSummary
//!
//! All summary mutation happens here. The taxonomy in [`EventKind`] is
//! assumed exhaustive, so a tag that matches no kind is a data-integrity
//! failure and is returned as [`UnknownTag`] for the caller to abort on.

use std::fmt;

use super::state::SessionSummary;
use crate::events::{CloseReason, EventKind, RawRecord, RejectReason, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag {
    pub id: String,
    pub tag: String,
}

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item: session {} has unrecognized tag {:?}", self.id, self.tag)
    }
}

impl std::error::Error for UnknownTag {}

/// Fold one record into its session summary.
///
/// Returns the matched kind. Touches nothing but `summary`.
pub fn apply(summary: &mut SessionSummary, record: &RawRecord) -> Result<EventKind, UnknownTag> {
    let kind = EventKind::classify(&record.metadata).ok_or_else(|| UnknownTag {
        id: record.id.clone(),
        tag: record.metadata.clone(),
    })?;

    let ts = || Some(record.created_at.clone());

    match kind {
        EventKind::Snapshot => {
            summary.market = Some(record.market.clone());
        }

        EventKind::CreatedByUser => {
            summary.created_at = ts();
            summary.created_by_role = Some(Role::User);
        }
        EventKind::CreatedByTutor => {
            summary.created_at = ts();
            summary.created_by_role = Some(Role::Tutor);
        }

        EventKind::ConfirmedByTutor => {
            summary.confirmed_at = ts();
        }

        EventKind::RejectedByUser => reject(summary, ts(), RejectReason::User),
        EventKind::RejectedOnMatchingTimeout => reject(summary, ts(), RejectReason::MatchingTimeout),
        EventKind::RejectedOnNoTutors => reject(summary, ts(), RejectReason::NoTutors),

        EventKind::ClosedByTutor => close(summary, ts(), CloseReason::Tutor),
        EventKind::ClosedByUser => close(summary, ts(), CloseReason::User),
        EventKind::ClosedOnTutorDisconnected => close(summary, ts(), CloseReason::TutorDisconnected),

        EventKind::TutorAssigned => {
            summary.no_of_assign_attempts += 1;
        }

        // Recognized, carry nothing into the summary.
        EventKind::RatedByUser
        | EventKind::ReportedByTutor
        | EventKind::QuestionUpdated
        | EventKind::TutorUnassignedOnConfirmationTimeout
        | EventKind::TutorUnassignedOnTutorDisconnected => {}
    }

    Ok(kind)
}

fn reject(summary: &mut SessionSummary, at: Option<String>, reason: RejectReason) {
    summary.rejected_at = at;
    summary.rejected_reason = Some(reason);
}

fn close(summary: &mut SessionSummary, at: Option<String>, reason: CloseReason) {
    summary.closed_at = at;
    summary.closed_reason = Some(reason);
}
