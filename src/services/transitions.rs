//! The presence transition table.
//!
//! Every permitted move is one [`TransitionRule`] row keyed by
//! `(from, event, role)`; adding a role or a status means adding rows, not
//! branches. [`decide`] looks a request up and applies the row's guards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PresencePolicy;
use crate::error::AppError;
use crate::models::{Actor, PresenceRecord, PresenceSource, PresenceState, PresenceStatus, Role};

use PresenceState::{Absent, Late, Pending, Present, Unset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Declare,
    MobileDeclare,
    Confirm,
    Reject,
    Override,
    Edit,
    Delete,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Declare => "declare",
            EventKind::MobileDeclare => "mobile_declare",
            EventKind::Confirm => "confirm",
            EventKind::Reject => "reject",
            EventKind::Override => "override",
            EventKind::Edit => "edit",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested change, with the status it asks for where relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Declare(Pending)` is the student mobile channel.
    Declare(PresenceStatus),
    Confirm,
    Reject,
    Override(PresenceStatus),
    Edit(PresenceStatus),
    Delete,
}

impl Transition {
    pub fn kind(self) -> EventKind {
        match self {
            Transition::Declare(PresenceStatus::Pending) => EventKind::MobileDeclare,
            Transition::Declare(_) => EventKind::Declare,
            Transition::Confirm => EventKind::Confirm,
            Transition::Reject => EventKind::Reject,
            Transition::Override(_) => EventKind::Override,
            Transition::Edit(_) => EventKind::Edit,
            Transition::Delete => EventKind::Delete,
        }
    }

    fn requested(self) -> Option<PresenceStatus> {
        match self {
            Transition::Declare(s) | Transition::Override(s) | Transition::Edit(s) => Some(s),
            Transition::Confirm | Transition::Reject | Transition::Delete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The status carried by the request, if it is one of these.
    Requested(&'static [PresenceStatus]),
    Fixed(PresenceStatus),
    /// The record is removed and the session goes back to unset.
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Unbounded,
    Edit,
    Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEffect {
    Set(PresenceSource),
    Keep,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: &'static [PresenceState],
    pub event: EventKind,
    pub role: Role,
    pub to: Target,
    pub window: Window,
    pub source: SourceEffect,
    /// Actor must belong to the session's program group.
    pub same_class: bool,
    /// Actor must be the one who declared the record.
    pub owner_only: bool,
    /// An administrative override locks the record for this rule.
    pub admin_locks: bool,
}

const DECLARED: &[PresenceStatus] = &[
    PresenceStatus::Present,
    PresenceStatus::Absent,
    PresenceStatus::Late,
];

const SETTLED: &[PresenceState] = &[Present, Absent, Late];
const STORED: &[PresenceState] = &[Pending, Present, Absent, Late];

pub static RULES: &[TransitionRule] = &[
    TransitionRule {
        from: &[Unset],
        event: EventKind::Declare,
        role: Role::Representative,
        to: Target::Requested(DECLARED),
        window: Window::Unbounded,
        source: SourceEffect::Set(PresenceSource::Representative),
        same_class: true,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: &[Unset],
        event: EventKind::Declare,
        role: Role::Admin,
        to: Target::Requested(DECLARED),
        window: Window::Unbounded,
        source: SourceEffect::Set(PresenceSource::AdminOverride),
        same_class: false,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: &[Unset],
        event: EventKind::MobileDeclare,
        role: Role::Student,
        to: Target::Fixed(PresenceStatus::Pending),
        window: Window::Unbounded,
        source: SourceEffect::Set(PresenceSource::StudentMobile),
        same_class: true,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: &[Pending],
        event: EventKind::Confirm,
        role: Role::Representative,
        to: Target::Fixed(PresenceStatus::Present),
        window: Window::Confirmation,
        source: SourceEffect::Keep,
        same_class: true,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: &[Pending],
        event: EventKind::Reject,
        role: Role::Representative,
        to: Target::Fixed(PresenceStatus::Absent),
        window: Window::Confirmation,
        source: SourceEffect::Keep,
        same_class: true,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: SETTLED,
        event: EventKind::Override,
        role: Role::Admin,
        to: Target::Requested(DECLARED),
        window: Window::Unbounded,
        source: SourceEffect::Set(PresenceSource::AdminOverride),
        same_class: false,
        owner_only: false,
        admin_locks: false,
    },
    TransitionRule {
        from: SETTLED,
        event: EventKind::Edit,
        role: Role::Representative,
        to: Target::Requested(DECLARED),
        window: Window::Edit,
        source: SourceEffect::Keep,
        same_class: false,
        owner_only: true,
        admin_locks: true,
    },
    TransitionRule {
        from: STORED,
        event: EventKind::Delete,
        role: Role::Representative,
        to: Target::Removed,
        window: Window::Edit,
        source: SourceEffect::Keep,
        same_class: false,
        owner_only: true,
        admin_locks: true,
    },
    TransitionRule {
        from: STORED,
        event: EventKind::Delete,
        role: Role::Admin,
        to: Target::Removed,
        window: Window::Unbounded,
        source: SourceEffect::Keep,
        same_class: false,
        owner_only: false,
        admin_locks: false,
    },
];

pub fn find_rule(from: PresenceState, event: EventKind, role: Role) -> Option<&'static TransitionRule> {
    RULES
        .iter()
        .find(|r| r.event == event && r.role == role && r.from.contains(&from))
}

/// Outcome of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub from: PresenceState,
    pub event: EventKind,
    /// `None` when the record is removed.
    pub to: Option<PresenceStatus>,
    pub source: SourceEffect,
}

/// Checks a transition against the table and the row's guards.
///
/// `class` is the `(program_id, group)` the session belongs to. Guards
/// are applied in order: table lookup, requested status, class scope,
/// ownership, administrative lock, then time window.
pub fn decide(
    current: Option<&PresenceRecord>,
    transition: Transition,
    actor: &Actor,
    class: (&str, u32),
    now: DateTime<Utc>,
    policy: &PresencePolicy,
) -> Result<Decision, AppError> {
    let from = current.map_or(Unset, |r| r.status.into());
    let event = transition.kind();
    let invalid = || AppError::InvalidTransition {
        from,
        event,
        role: actor.role,
    };

    let rule = find_rule(from, event, actor.role).ok_or_else(invalid)?;

    let to = match rule.to {
        Target::Fixed(status) => Some(status),
        Target::Removed => None,
        Target::Requested(allowed) => match transition.requested() {
            Some(status) if allowed.contains(&status) => Some(status),
            _ => return Err(invalid()),
        },
    };

    if rule.same_class && !actor.belongs_to(class.0, class.1) {
        return Err(AppError::Forbidden(format!(
            "{} {} does not belong to this class",
            actor.role, actor.id
        )));
    }

    if let Some(record) = current {
        if rule.owner_only && record.declared_by.id != actor.id {
            return Err(AppError::Forbidden(
                "only the representative who declared this presence may change it".to_string(),
            ));
        }
        if rule.admin_locks && record.source == PresenceSource::AdminOverride {
            return Err(AppError::Forbidden(
                "presence has been settled by the administration".to_string(),
            ));
        }

        let limit = match rule.window {
            Window::Unbounded => None,
            Window::Edit => Some(policy.edit_window),
            Window::Confirmation => policy.confirmation_window,
        };
        if let Some(limit) = limit {
            if now - record.declared_at > limit {
                return Err(AppError::EditWindowExpired {
                    minutes: limit.num_minutes(),
                });
            }
        }
    }

    Ok(Decision {
        from,
        event,
        to,
        source: rule.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActorRef;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::collections::HashSet;

    const CLASS: (&str, u32) = ("gc47", 1);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 35, 0).unwrap()
    }

    fn rep() -> Actor {
        Actor::representative("rep-1", "gc47", 1)
    }

    fn record(status: PresenceStatus, declared_by: &Actor, source: PresenceSource) -> PresenceRecord {
        PresenceRecord {
            id: "p1".to_string(),
            session_id: "gc47:1:mon:08h30-11h30".to_string(),
            program_id: "gc47".to_string(),
            group: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            status,
            declared_by: ActorRef::from(declared_by),
            declared_at: t0(),
            arrival_time: None,
            comment: None,
            confirmed_by: None,
            confirmed_at: None,
            source,
            last_modified_at: t0(),
            version: 1,
        }
    }

    fn reachable_from(state: PresenceState) -> HashSet<PresenceState> {
        RULES
            .iter()
            .filter(|r| r.from.contains(&state))
            .flat_map(|r| match r.to {
                Target::Requested(list) => list.iter().map(|s| PresenceState::from(*s)).collect::<Vec<_>>(),
                Target::Fixed(s) => vec![PresenceState::from(s)],
                Target::Removed => vec![Unset],
            })
            .collect()
    }

    #[test]
    fn unset_reaches_only_declared_states_and_pending() {
        let reached = reachable_from(Unset);
        let expected: HashSet<_> = [Present, Absent, Late, Pending].into_iter().collect();
        assert_eq!(reached, expected);
    }

    #[test]
    fn pending_resolves_only_to_present_or_absent() {
        let reached: HashSet<_> = reachable_from(Pending)
            .into_iter()
            .filter(|s| *s != Unset)
            .collect();
        let expected: HashSet<_> = [Present, Absent].into_iter().collect();
        assert_eq!(reached, expected);
    }

    #[test]
    fn every_key_appears_at_most_once() {
        let mut seen = HashSet::new();
        for rule in RULES {
            for from in rule.from {
                assert!(
                    seen.insert((*from, rule.event, rule.role)),
                    "duplicate rule for {from} {} {}",
                    rule.event,
                    rule.role
                );
            }
        }
    }

    #[test]
    fn representative_declares_with_requested_status() {
        let policy = PresencePolicy::default();
        let d = decide(None, Transition::Declare(PresenceStatus::Late), &rep(), CLASS, t0(), &policy).unwrap();
        assert_eq!(d.to, Some(PresenceStatus::Late));
        assert_eq!(d.source, SourceEffect::Set(PresenceSource::Representative));
    }

    #[test]
    fn representative_cannot_raise_pending() {
        let policy = PresencePolicy::default();
        let err = decide(None, Transition::Declare(PresenceStatus::Pending), &rep(), CLASS, t0(), &policy)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: Unset,
                event: EventKind::MobileDeclare,
                role: Role::Representative
            }
        ));
    }

    #[test]
    fn student_can_only_use_mobile_channel() {
        let policy = PresencePolicy::default();
        let student = Actor::student("stu-1", "gc47", 1);
        let d = decide(None, Transition::Declare(PresenceStatus::Pending), &student, CLASS, t0(), &policy).unwrap();
        assert_eq!(d.to, Some(PresenceStatus::Pending));

        let err = decide(None, Transition::Declare(PresenceStatus::Present), &student, CLASS, t0(), &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn representative_of_another_class_is_forbidden() {
        let policy = PresencePolicy::default();
        let other = Actor::representative("rep-2", "gc47", 2);
        let err = decide(None, Transition::Declare(PresenceStatus::Present), &other, CLASS, t0(), &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn edit_window_is_inclusive_of_fifteen_minutes() {
        let policy = PresencePolicy::default();
        let current = record(PresenceStatus::Present, &rep(), PresenceSource::Representative);

        let at = t0() + Duration::minutes(14) + Duration::seconds(59);
        assert!(decide(Some(&current), Transition::Edit(PresenceStatus::Late), &rep(), CLASS, at, &policy).is_ok());

        let at = t0() + Duration::minutes(15);
        assert!(decide(Some(&current), Transition::Edit(PresenceStatus::Late), &rep(), CLASS, at, &policy).is_ok());

        let at = t0() + Duration::minutes(15) + Duration::seconds(1);
        let err = decide(Some(&current), Transition::Edit(PresenceStatus::Late), &rep(), CLASS, at, &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::EditWindowExpired { minutes: 15 }));
    }

    #[test]
    fn admin_override_ignores_the_window() {
        let policy = PresencePolicy::default();
        let current = record(PresenceStatus::Absent, &rep(), PresenceSource::Representative);
        let at = t0() + Duration::hours(100);
        let d = decide(Some(&current), Transition::Override(PresenceStatus::Present), &Actor::admin("adm"), CLASS, at, &policy)
            .unwrap();
        assert_eq!(d.to, Some(PresenceStatus::Present));
        assert_eq!(d.source, SourceEffect::Set(PresenceSource::AdminOverride));
    }

    #[test]
    fn only_the_declaring_representative_may_edit() {
        let policy = PresencePolicy::default();
        let current = record(PresenceStatus::Present, &rep(), PresenceSource::Representative);
        let co_rep = Actor::representative("rep-9", "gc47", 1);
        let err = decide(Some(&current), Transition::Edit(PresenceStatus::Absent), &co_rep, CLASS, t0(), &policy)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn override_locks_the_record_for_representatives() {
        let policy = PresencePolicy::default();
        let current = record(PresenceStatus::Present, &rep(), PresenceSource::AdminOverride);
        let err = decide(Some(&current), Transition::Delete, &rep(), CLASS, t0(), &policy).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn confirming_a_settled_record_is_invalid() {
        let policy = PresencePolicy::default();
        let student = Actor::student("stu-1", "gc47", 1);
        let current = record(PresenceStatus::Present, &student, PresenceSource::StudentMobile);
        let err = decide(Some(&current), Transition::Confirm, &rep(), CLASS, t0(), &policy).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: Present, event: EventKind::Confirm, .. }));
    }

    #[test]
    fn confirmation_window_applies_only_when_configured() {
        let student = Actor::student("stu-1", "gc47", 1);
        let current = record(PresenceStatus::Pending, &student, PresenceSource::StudentMobile);
        let later = t0() + Duration::hours(3);

        let open = PresencePolicy::default();
        assert!(decide(Some(&current), Transition::Confirm, &rep(), CLASS, later, &open).is_ok());

        let bounded = PresencePolicy {
            confirmation_window: Some(Duration::hours(2)),
            ..PresencePolicy::default()
        };
        let err = decide(Some(&current), Transition::Reject, &rep(), CLASS, later, &bounded).unwrap_err();
        assert!(matches!(err, AppError::EditWindowExpired { minutes: 120 }));
    }
}
