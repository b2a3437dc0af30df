//! Record shape and the closed taxonomy of session event kinds.
//!
//! Every stored item carries a `metadata` tag. The tag is classified by
//! prefix against [`EventKind::ORDERED`]; the first kind whose prefix matches
//! wins. Tags may carry trailing detail (e.g. an event id) after the prefix.

use serde::{Deserialize, Serialize};

/// Exact tag of the session snapshot item.
pub const SNAPSHOT_TAG: &str = "SESSION";

/// Namespace shared by every domain event tag.
pub const DOMAIN_EVENT_PREFIX: &str = "DOMAINEVENT#";

/// One item of the key-value table, projected to the four scanned columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub metadata: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(default)]
    pub market: String,
}

impl RawRecord {
    pub fn new(id: &str, metadata: &str, created_at: &str, market: &str) -> Self {
        Self {
            id: id.to_string(),
            metadata: metadata.to_string(),
            created_at: created_at.to_string(),
            market: market.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Snapshot,
    CreatedByUser,
    CreatedByTutor,
    ConfirmedByTutor,
    RejectedByUser,
    RejectedOnMatchingTimeout,
    RejectedOnNoTutors,
    ClosedByTutor,
    ClosedByUser,
    ClosedOnTutorDisconnected,
    TutorAssigned,
    RatedByUser,
    ReportedByTutor,
    QuestionUpdated,
    TutorUnassignedOnConfirmationTimeout,
    TutorUnassignedOnTutorDisconnected,
}

impl EventKind {
    /// Evaluation order for classification. First match wins.
    pub const ORDERED: [EventKind; 16] = [
        EventKind::Snapshot,
        EventKind::CreatedByUser,
        EventKind::CreatedByTutor,
        EventKind::ConfirmedByTutor,
        EventKind::RejectedByUser,
        EventKind::RejectedOnMatchingTimeout,
        EventKind::RejectedOnNoTutors,
        EventKind::ClosedByTutor,
        EventKind::ClosedByUser,
        EventKind::ClosedOnTutorDisconnected,
        EventKind::TutorAssigned,
        EventKind::RatedByUser,
        EventKind::ReportedByTutor,
        EventKind::QuestionUpdated,
        EventKind::TutorUnassignedOnConfirmationTimeout,
        EventKind::TutorUnassignedOnTutorDisconnected,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            EventKind::Snapshot => SNAPSHOT_TAG,
            EventKind::CreatedByUser => "DOMAINEVENT#SessionCreatedByUser",
            EventKind::CreatedByTutor => "DOMAINEVENT#SessionCreatedByTutor",
            EventKind::ConfirmedByTutor => "DOMAINEVENT#SessionConfirmedByTutor",
            EventKind::RejectedByUser => "DOMAINEVENT#SessionRejectedByUser",
            EventKind::RejectedOnMatchingTimeout => "DOMAINEVENT#SessionRejectedOnMatchingTimeout",
            EventKind::RejectedOnNoTutors => "DOMAINEVENT#SessionRejectedOnNoTutors",
            EventKind::ClosedByTutor => "DOMAINEVENT#SessionClosedByTutor",
            EventKind::ClosedByUser => "DOMAINEVENT#SessionClosedByUser",
            EventKind::ClosedOnTutorDisconnected => "DOMAINEVENT#SessionClosedOnTutorDisconnected",
            EventKind::TutorAssigned => "DOMAINEVENT#TutorAssignedToSession",
            EventKind::RatedByUser => "DOMAINEVENT#SessionRatedByUser",
            EventKind::ReportedByTutor => "DOMAINEVENT#SessionReportedByTutor",
            EventKind::QuestionUpdated => "DOMAINEVENT#QuestionUpdated",
            EventKind::TutorUnassignedOnConfirmationTimeout => {
                "DOMAINEVENT#TutorUnassignedFromSessionOnConfirmationTimeout"
            }
            EventKind::TutorUnassignedOnTutorDisconnected => {
                "DOMAINEVENT#TutorUnassignedFromSessionOnTutorDisconnected"
            }
        }
    }

    /// Short stable name, used as a key in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Snapshot => "snapshot",
            EventKind::CreatedByUser => "created_by_user",
            EventKind::CreatedByTutor => "created_by_tutor",
            EventKind::ConfirmedByTutor => "confirmed_by_tutor",
            EventKind::RejectedByUser => "rejected_by_user",
            EventKind::RejectedOnMatchingTimeout => "rejected_on_matching_timeout",
            EventKind::RejectedOnNoTutors => "rejected_on_no_tutors",
            EventKind::ClosedByTutor => "closed_by_tutor",
            EventKind::ClosedByUser => "closed_by_user",
            EventKind::ClosedOnTutorDisconnected => "closed_on_tutor_disconnected",
            EventKind::TutorAssigned => "tutor_assigned",
            EventKind::RatedByUser => "rated_by_user",
            EventKind::ReportedByTutor => "reported_by_tutor",
            EventKind::QuestionUpdated => "question_updated",
            EventKind::TutorUnassignedOnConfirmationTimeout => {
                "tutor_unassigned_on_confirmation_timeout"
            }
            EventKind::TutorUnassignedOnTutorDisconnected => {
                "tutor_unassigned_on_tutor_disconnected"
            }
        }
    }

    pub fn classify(tag: &str) -> Option<EventKind> {
        Self::ORDERED
            .iter()
            .copied()
            .find(|kind| tag.starts_with(kind.prefix()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Tutor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Tutor => "TUTOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    User,
    MatchingTimeout,
    NoTutors,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::User => "user",
            RejectReason::MatchingTimeout => "matching_timeout",
            RejectReason::NoTutors => "no_tutors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Tutor,
    User,
    TutorDisconnected,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Tutor => "tutor",
            CloseReason::User => "user",
            CloseReason::TutorDisconnected => "tutor_disconnected",
        }
    }
}
