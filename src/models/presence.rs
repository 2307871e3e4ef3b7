use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Stored presence status. The implicit `unset` state has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Pending,
    Present,
    Absent,
    Late,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Pending => "pending",
            PresenceStatus::Present => "present",
            PresenceStatus::Absent => "absent",
            PresenceStatus::Late => "late",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresenceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PresenceStatus::Pending),
            "present" => Ok(PresenceStatus::Present),
            "absent" => Ok(PresenceStatus::Absent),
            "late" => Ok(PresenceStatus::Late),
            other => Err(AppError::BadRequest(format!("unknown presence status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Representative,
    Student,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Representative => "representative",
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "representative" => Ok(Role::Representative),
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("unknown role {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceSource {
    Representative,
    StudentMobile,
    AdminOverride,
}

impl PresenceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceSource::Representative => "representative",
            PresenceSource::StudentMobile => "student-mobile",
            PresenceSource::AdminOverride => "admin-override",
        }
    }
}

impl FromStr for PresenceSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "representative" => Ok(PresenceSource::Representative),
            "student-mobile" => Ok(PresenceSource::StudentMobile),
            "admin-override" => Ok(PresenceSource::AdminOverride),
            other => Err(AppError::Corrupt(format!("presence source {other:?}"))),
        }
    }
}

/// The class a representative or student belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassScope {
    pub program_id: String,
    pub group: u32,
}

/// A pre-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassScope>,
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
            class: None,
        }
    }

    pub fn representative(id: impl Into<String>, program_id: impl Into<String>, group: u32) -> Self {
        Self {
            id: id.into(),
            role: Role::Representative,
            class: Some(ClassScope {
                program_id: program_id.into(),
                group,
            }),
        }
    }

    pub fn student(id: impl Into<String>, program_id: impl Into<String>, group: u32) -> Self {
        Self {
            id: id.into(),
            role: Role::Student,
            class: Some(ClassScope {
                program_id: program_id.into(),
                group,
            }),
        }
    }

    pub fn belongs_to(&self, program_id: &str, group: u32) -> bool {
        self.class
            .as_ref()
            .is_some_and(|c| c.program_id == program_id && c.group == group)
    }
}

/// Who performed a declaration or a confirmation, as stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub role: Role,
}

impl From<&Actor> for ActorRef {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id.clone(),
            role: actor.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub id: String,
    pub session_id: String,
    pub program_id: String,
    pub group: u32,
    pub date: NaiveDate,
    pub status: PresenceStatus,
    pub declared_by: ActorRef,
    pub declared_at: DateTime<Utc>,
    pub arrival_time: Option<NaiveTime>,
    pub comment: Option<String>,
    pub confirmed_by: Option<ActorRef>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub source: PresenceSource,
    pub last_modified_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PresenceRow {
    pub id: String,
    pub session_id: String,
    pub program_id: String,
    pub group_no: u32,
    pub date: NaiveDate,
    pub status: String,
    pub declared_by_id: String,
    pub declared_by_role: String,
    pub declared_at: DateTime<Utc>,
    pub arrival_time: Option<NaiveTime>,
    pub comment: Option<String>,
    pub confirmed_by_id: Option<String>,
    pub confirmed_by_role: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub source: String,
    pub last_modified_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<PresenceRow> for PresenceRecord {
    type Error = AppError;

    fn try_from(row: PresenceRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<PresenceStatus>()
            .map_err(|_| AppError::Corrupt(format!("status {:?} on presence {}", row.status, row.id)))?;
        let declared_role = row
            .declared_by_role
            .parse::<Role>()
            .map_err(|_| AppError::Corrupt(format!("role {:?} on presence {}", row.declared_by_role, row.id)))?;
        let confirmed_by = match (row.confirmed_by_id, row.confirmed_by_role) {
            (Some(id), Some(role)) => Some(ActorRef {
                id,
                role: role
                    .parse::<Role>()
                    .map_err(|_| AppError::Corrupt(format!("role {:?} on presence {}", role, row.id)))?,
            }),
            _ => None,
        };

        Ok(PresenceRecord {
            status,
            declared_by: ActorRef {
                id: row.declared_by_id,
                role: declared_role,
            },
            confirmed_by,
            source: row.source.parse()?,
            id: row.id,
            session_id: row.session_id,
            program_id: row.program_id,
            group: row.group_no,
            date: row.date,
            declared_at: row.declared_at,
            arrival_time: row.arrival_time,
            comment: row.comment,
            confirmed_at: row.confirmed_at,
            last_modified_at: row.last_modified_at,
            version: row.version,
        })
    }
}

/// One line of a presence's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PresenceEvent {
    pub id: String,
    pub presence_id: String,
    pub session_id: String,
    pub date: NaiveDate,
    pub event: String,
    pub actor_id: String,
    pub actor_role: String,
    pub from_status: String,
    pub to_status: String,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
