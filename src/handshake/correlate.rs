//! Picks the inviter record that belongs to this run.
//!
//! An inviter may hold many records in the target state at once (other
//! exchanges, leftovers from earlier runs that reused the alias). Only the
//! record whose id create-invitation returned is certain to be ours, so
//! [`CorrelationPolicy::Strict`] accepts nothing else.
//!
//! [`CorrelationPolicy::LastMatch`] loosens this for agents that open a new
//! record per request instead of reusing the invitation record. While our own
//! record is listed it is still the only acceptable answer. Once it is gone,
//! the last record in the target state carrying this run's alias wins, then
//! the last record in the target state of any kind.

use std::str::FromStr;

use crate::agent::{ConnectionId, ConnectionRecord, InviterSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationPolicy {
    /// Only accept the record created by this run's create-invitation.
    #[default]
    Strict,
    /// Fall back to alias, then to the last record in the target state, when
    /// our own record is absent from the listing. Correct only when the
    /// inviter is handling a single exchange.
    LastMatch,
}

impl FromStr for CorrelationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(CorrelationPolicy::Strict),
            "last-match" | "last_match" => Ok(CorrelationPolicy::LastMatch),
            other => Err(format!("expected 'strict' or 'last-match', got '{}'", other)),
        }
    }
}

/// What ties an inviter record to this run.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub connection_id: ConnectionId<InviterSide>,
    pub alias: Option<String>,
}

pub fn select_request<'a>(
    records: &'a [ConnectionRecord],
    target_state: &str,
    correlation: &Correlation,
    policy: CorrelationPolicy,
) -> Option<&'a ConnectionRecord> {
    let own = records
        .iter()
        .find(|r| correlation.connection_id == r.connection_id.as_str());

    if let Some(own) = own {
        // Our record is listed: it alone decides, even under LastMatch.
        return own.is_in_state(target_state).then_some(own);
    }

    match policy {
        CorrelationPolicy::Strict => None,
        CorrelationPolicy::LastMatch => {
            let mut candidates = records.iter().filter(|r| r.is_in_state(target_state));
            let by_alias = correlation.alias.as_deref().and_then(|alias| {
                candidates
                    .clone()
                    .filter(|r| r.alias.as_deref() == Some(alias))
                    .last()
            });
            by_alias.or_else(|| candidates.next_back())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation(id: &str, alias: Option<&str>) -> Correlation {
        Correlation {
            connection_id: ConnectionId::new(id),
            alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn own_connection_id_wins() {
        let records = vec![
            ConnectionRecord::new("other-1", "request"),
            ConnectionRecord::new("inv-1", "request"),
            ConnectionRecord::new("other-2", "request"),
        ];
        let picked = select_request(
            &records,
            "request",
            &correlation("inv-1", None),
            CorrelationPolicy::LastMatch,
        )
        .expect("match");
        assert_eq!(picked.connection_id, "inv-1");
    }

    #[test]
    fn own_id_in_other_state_is_not_a_match() {
        let records = vec![ConnectionRecord::new("inv-1", "invitation")];
        assert!(select_request(
            &records,
            "request",
            &correlation("inv-1", None),
            CorrelationPolicy::Strict
        )
        .is_none());
    }

    #[test]
    fn last_match_prefers_alias_when_own_record_is_gone() {
        let records = vec![
            ConnectionRecord::new("a", "request").with_alias("run-7"),
            ConnectionRecord::new("b", "request").with_alias("someone-else"),
            ConnectionRecord::new("c", "request").with_alias("run-7"),
            ConnectionRecord::new("d", "request"),
        ];
        let picked = select_request(
            &records,
            "request",
            &correlation("inv-1", Some("run-7")),
            CorrelationPolicy::LastMatch,
        )
        .expect("match");
        assert_eq!(picked.connection_id, "c");
    }

    #[test]
    fn strict_never_accepts_by_alias() {
        let stale = ConnectionRecord::new("stale-from-last-run", "request").with_alias("alice-bob");
        let alias_only = vec![stale.clone()];
        assert!(select_request(
            &alias_only,
            "request",
            &correlation("inv-1", Some("alice-bob")),
            CorrelationPolicy::Strict
        )
        .is_none());

        let both = vec![
            stale,
            ConnectionRecord::new("inv-1", "request").with_alias("alice-bob"),
        ];
        let picked = select_request(
            &both,
            "request",
            &correlation("inv-1", Some("alice-bob")),
            CorrelationPolicy::Strict,
        )
        .expect("match");
        assert_eq!(picked.connection_id, "inv-1");
    }

    #[test]
    fn listed_own_record_outranks_alias_under_last_match() {
        let records = vec![
            ConnectionRecord::new("inv-1", "invitation").with_alias("alice-bob"),
            ConnectionRecord::new("stale-from-last-run", "request").with_alias("alice-bob"),
        ];
        assert!(select_request(
            &records,
            "request",
            &correlation("inv-1", Some("alice-bob")),
            CorrelationPolicy::LastMatch
        )
        .is_none());
    }

    #[test]
    fn strict_ignores_unrelated_requests() {
        let records = vec![ConnectionRecord::new("stranger", "request")];
        assert!(select_request(
            &records,
            "request",
            &correlation("inv-1", Some("run-7")),
            CorrelationPolicy::Strict
        )
        .is_none());
    }

    #[test]
    fn last_match_takes_the_last_candidate() {
        let records = vec![
            ConnectionRecord::new("x", "request"),
            ConnectionRecord::new("y", "active"),
            ConnectionRecord::new("z", "request"),
        ];
        let picked = select_request(
            &records,
            "request",
            &correlation("inv-1", None),
            CorrelationPolicy::LastMatch,
        )
        .expect("match");
        assert_eq!(picked.connection_id, "z");
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("strict".parse::<CorrelationPolicy>(), Ok(CorrelationPolicy::Strict));
        assert_eq!("Last-Match".parse::<CorrelationPolicy>(), Ok(CorrelationPolicy::LastMatch));
        assert!("newest".parse::<CorrelationPolicy>().is_err());
    }
}
