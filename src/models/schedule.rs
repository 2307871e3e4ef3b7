use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::{PresenceRecord, PresenceStatus};

/// Fixed teaching slots of the weekly timetable, in day order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "08h30-11h30")]
    Morning,
    #[serde(rename = "11h45-14h45")]
    Midday,
    #[serde(rename = "15h00-18h00")]
    Afternoon,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Midday, TimeSlot::Afternoon];

    pub fn label(self) -> &'static str {
        match self {
            TimeSlot::Morning => "08h30-11h30",
            TimeSlot::Midday => "11h45-14h45",
            TimeSlot::Afternoon => "15h00-18h00",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::ALL
            .into_iter()
            .find(|slot| slot.label() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("unknown time slot {s:?}")))
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn parse_weekday(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_lowercase().as_str() {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Identity of one physical weekly session.
///
/// Its string form `{program_id}:{group}:{weekday}:{slot}` is the
/// `session_id` and stays the same for every date the session occurs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub program_id: String,
    pub group: u32,
    pub weekday: Weekday,
    pub time_slot: TimeSlot,
}

impl SessionKey {
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.program_id,
            self.group,
            weekday_code(self.weekday),
            self.time_slot.label()
        )
    }

    /// Inverse of [`SessionKey::id`]. Only the canonical spelling is
    /// accepted, so one session never has two ids.
    pub fn parse(session_id: &str) -> Option<SessionKey> {
        let mut parts = session_id.rsplitn(4, ':');
        let time_slot = parts.next()?.parse::<TimeSlot>().ok()?;
        let weekday = parse_weekday(parts.next()?)?;
        let group = parts.next()?.parse::<u32>().ok()?;
        let program_id = parts.next()?;
        if program_id.is_empty() {
            return None;
        }
        let key = SessionKey {
            program_id: program_id.to_string(),
            group,
            weekday,
            time_slot,
        };
        (key.id() == session_id).then_some(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub id: String,
    pub name: String,
}

/// One slot of a program group's weekly timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub id: String,
    pub program_id: String,
    pub group: u32,
    pub weekday: Weekday,
    pub time_slot: TimeSlot,
    pub course: CourseRef,
    pub instructor: InstructorRef,
    pub room: RoomRef,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleEntryRow {
    pub id: String,
    pub program_id: String,
    pub group_no: u32,
    pub weekday: String,
    pub time_slot: String,
    pub course_id: String,
    pub course_name: String,
    pub course_type: String,
    pub instructor_id: String,
    pub instructor_name: String,
    pub room_id: String,
    pub room_name: String,
}

impl TryFrom<ScheduleEntryRow> for TemplateEntry {
    type Error = AppError;

    fn try_from(row: ScheduleEntryRow) -> Result<Self, Self::Error> {
        let weekday = parse_weekday(&row.weekday)
            .ok_or_else(|| AppError::Corrupt(format!("weekday {:?} in entry {}", row.weekday, row.id)))?;
        let time_slot = row
            .time_slot
            .parse::<TimeSlot>()
            .map_err(|_| AppError::Corrupt(format!("time slot {:?} in entry {}", row.time_slot, row.id)))?;

        Ok(TemplateEntry {
            id: row.id,
            program_id: row.program_id,
            group: row.group_no,
            weekday,
            time_slot,
            course: CourseRef {
                id: row.course_id,
                name: row.course_name,
                kind: row.course_type,
            },
            instructor: InstructorRef {
                id: row.instructor_id,
                name: row.instructor_name,
            },
            room: RoomRef {
                id: row.room_id,
                name: row.room_name,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplateEntryRequest {
    pub program_id: String,
    pub group: u32,
    pub weekday: Weekday,
    pub time_slot: TimeSlot,
    pub course: CourseRef,
    pub instructor: InstructorRef,
    pub room: RoomRef,
}

/// A weekly template entry materialized on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub session_id: String,
    pub program_id: String,
    pub group: u32,
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub time_slot: TimeSlot,
    pub course: CourseRef,
    pub instructor: InstructorRef,
    pub room: RoomRef,
}

/// Presence state of a session occurrence. `Unset` is never stored: it is
/// what a session without a presence record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Unset,
    Pending,
    Present,
    Absent,
    Late,
}

impl From<PresenceStatus> for PresenceState {
    fn from(status: PresenceStatus) -> Self {
        match status {
            PresenceStatus::Pending => PresenceState::Pending,
            PresenceStatus::Present => PresenceState::Present,
            PresenceStatus::Absent => PresenceState::Absent,
            PresenceStatus::Late => PresenceState::Late,
        }
    }
}

impl PresenceState {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceState::Unset => "unset",
            PresenceState::Pending => "pending",
            PresenceState::Present => "present",
            PresenceState::Absent => "absent",
            PresenceState::Late => "late",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWithPresence {
    #[serde(flatten)]
    pub session: ScheduledSession,
    pub state: PresenceState,
    pub presence: Option<PresenceRecord>,
}

/// Sessions of one program group on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "schedule", content = "sessions", rename_all = "snake_case")]
pub enum DaySchedule {
    /// The weekly template exists; the list may still be empty on a day
    /// without classes.
    Published(Vec<SessionWithPresence>),
    /// Administration has not published a timetable for this group yet.
    NotGenerated,
}

impl DaySchedule {
    pub fn sessions(&self) -> &[SessionWithPresence] {
        match self {
            DaySchedule::Published(sessions) => sessions,
            DaySchedule::NotGenerated => &[],
        }
    }

    pub fn into_sessions(self) -> Vec<SessionWithPresence> {
        match self {
            DaySchedule::Published(sessions) => sessions,
            DaySchedule::NotGenerated => Vec::new(),
        }
    }
}
