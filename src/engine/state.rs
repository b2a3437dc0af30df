//! Per-session summary accumulated by the reducer.

use serde::Serialize;

use crate::events::{CloseReason, RejectReason, Role};

/// Lifecycle summary of one session.
///
/// Created on first sight of its id and final only once the scan is
/// exhausted. Milestones are overwritten if their event repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub market: Option<String>,
    pub no_of_assign_attempts: u64,
    pub created_at: Option<String>,
    pub created_by_role: Option<Role>,
    pub rejected_at: Option<String>,
    pub rejected_reason: Option<RejectReason>,
    pub closed_at: Option<String>,
    pub closed_reason: Option<CloseReason>,
    pub confirmed_at: Option<String>,
}

impl SessionSummary {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// Column values in export order. Unset fields render empty.
    pub fn columns(&self) -> [String; 10] {
        fn opt(v: &Option<String>) -> String {
            v.clone().unwrap_or_default()
        }
        [
            self.id.clone(),
            opt(&self.market),
            self.no_of_assign_attempts.to_string(),
            opt(&self.created_at),
            self.created_by_role.map(|r| r.as_str().to_string()).unwrap_or_default(),
            opt(&self.rejected_at),
            self.rejected_reason.map(|r| r.as_str().to_string()).unwrap_or_default(),
            opt(&self.closed_at),
            self.closed_reason.map(|r| r.as_str().to_string()).unwrap_or_default(),
            opt(&self.confirmed_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_summary_is_blank() {
        let s = SessionSummary::new("s1");
        assert_eq!(s.no_of_assign_attempts, 0);
        assert!(s.rejected_at.is_none());
        assert!(s.closed_at.is_none());
        let cols = s.columns();
        assert_eq!(cols[0], "s1");
        assert_eq!(cols[2], "0");
        assert!(cols.iter().enumerate().all(|(i, c)| i == 0 || i == 2 || c.is_empty()));
    }

    #[test]
    fn columns_render_codes() {
        let mut s = SessionSummary::new("s2");
        s.created_by_role = Some(Role::Tutor);
        s.rejected_reason = Some(RejectReason::MatchingTimeout);
        s.closed_reason = Some(CloseReason::TutorDisconnected);
        let cols = s.columns();
        assert_eq!(cols[4], "TUTOR");
        assert_eq!(cols[6], "matching_timeout");
        assert_eq!(cols[8], "tutor_disconnected");
    }
}
