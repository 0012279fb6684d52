/// URL state definitions for the crawl frontier
///
/// Every record in the frontier is in exactly one of these states. New records
/// always start as `Pending`.
use std::fmt;

/// Represents the current state of a URL in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active States =====
    /// Discovered and waiting to be claimed by a worker
    Pending,

    /// Claimed by a worker; the claim time is the record's `updated_at`
    Crawling,

    // ===== Terminal States =====
    /// Fetched and processed successfully
    Success,

    /// Fetch or extraction failed permanently
    Failed,
}

impl UrlState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Returns true if this is an active state (the URL may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Crawling)
    }

    /// Returns true if the frontier state machine allows moving from `self` to `next`
    ///
    /// `Crawling -> Pending` is only taken by the lease reclaimer, and
    /// `Failed -> Pending` only by an explicit operator reset.
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Crawling)
                | (Self::Crawling, Self::Success)
                | (Self::Crawling, Self::Failed)
                | (Self::Crawling, Self::Pending)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible URL states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Crawling, Self::Success, Self::Failed]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Crawling => "Crawling",
            Self::Success => "Success",
            Self::Failed => "Failed",
        };
        f.pad(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(UrlState::Success.is_terminal());
        assert!(UrlState::Failed.is_terminal());
        assert!(!UrlState::Pending.is_terminal());
        assert!(!UrlState::Crawling.is_terminal());
    }

    #[test]
    fn test_active_is_inverse_of_terminal() {
        for state in UrlState::all_states() {
            assert_eq!(state.is_active(), !state.is_terminal(), "{}", state);
        }
    }

    #[test]
    fn test_db_string_roundtrip() {
        for state in UrlState::all_states() {
            let db_str = state.to_db_string();
            assert_eq!(UrlState::from_db_string(db_str), Some(state));
        }
    }

    #[test]
    fn test_invalid_db_string() {
        assert_eq!(UrlState::from_db_string("fetching"), None);
        assert_eq!(UrlState::from_db_string(""), None);
        assert_eq!(UrlState::from_db_string("PENDING"), None);
    }

    #[test]
    fn test_claim_and_resolve_transitions() {
        assert!(UrlState::Pending.can_transition_to(UrlState::Crawling));
        assert!(UrlState::Crawling.can_transition_to(UrlState::Success));
        assert!(UrlState::Crawling.can_transition_to(UrlState::Failed));
        assert!(UrlState::Crawling.can_transition_to(UrlState::Pending));
    }

    #[test]
    fn test_success_is_final() {
        for next in UrlState::all_states() {
            assert!(!UrlState::Success.can_transition_to(next));
        }
    }

    #[test]
    fn test_pending_cannot_skip_crawling() {
        assert!(!UrlState::Pending.can_transition_to(UrlState::Success));
        assert!(!UrlState::Pending.can_transition_to(UrlState::Failed));
    }

    #[test]
    fn test_display() {
        assert_eq!(UrlState::Crawling.to_string(), "Crawling");
        assert_eq!(UrlState::Failed.to_string(), "Failed");
    }
}
