use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use crate::models::{
    PresenceRecord, PresenceState, Program, ScheduledSession, SessionKey, SessionWithPresence,
    TemplateEntry,
};

/// Projects the weekly template of `(program, group)` onto `date`.
///
/// Entries belonging to other programs or groups are ignored, so the whole
/// timetable may be passed in.
pub fn derive_sessions(
    program: &Program,
    group: u32,
    date: NaiveDate,
    templates: &[TemplateEntry],
) -> Vec<ScheduledSession> {
    let weekday = date.weekday();

    let mut sessions: Vec<ScheduledSession> = templates
        .iter()
        .filter(|t| t.program_id == program.id && t.group == group && t.weekday == weekday)
        .map(|t| ScheduledSession {
            session_id: SessionKey {
                program_id: program.id.clone(),
                group,
                weekday,
                time_slot: t.time_slot,
            }
            .id(),
            program_id: program.id.clone(),
            group,
            date,
            weekday,
            time_slot: t.time_slot,
            course: t.course.clone(),
            instructor: t.instructor.clone(),
            room: t.room.clone(),
        })
        .collect();

    sessions.sort_by(|a, b| a.time_slot.cmp(&b.time_slot));
    sessions
}

/// Left-joins sessions with presence records on `(session_id, date)`.
pub fn attach_presences(
    sessions: Vec<ScheduledSession>,
    presences: &[PresenceRecord],
) -> Vec<SessionWithPresence> {
    let by_key: HashMap<(&str, NaiveDate), &PresenceRecord> = presences
        .iter()
        .map(|p| ((p.session_id.as_str(), p.date), p))
        .collect();

    sessions
        .into_iter()
        .map(|session| {
            let presence = by_key
                .get(&(session.session_id.as_str(), session.date))
                .map(|p| (*p).clone());
            let state = presence
                .as_ref()
                .map_or(PresenceState::Unset, |p| p.status.into());
            SessionWithPresence {
                session,
                state,
                presence,
            }
        })
        .collect()
}
