use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::PresencePolicy;
use crate::db::{presence as store, repository};
use crate::error::AppError;
use crate::models::{
    Actor, ActorRef, PresenceEvent, PresenceRecord, PresenceSource, PresenceState, PresenceStatus,
    Role, SessionKey,
};
use crate::services::transitions::{self, Decision, EventKind, SourceEffect, Transition};

/// The only mutating path: every presence change goes through the
/// transition table, a version check-and-set and an audit event, all in
/// one transaction.
pub struct PresenceService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    policy: PresencePolicy,
}

impl PresenceService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, policy: PresencePolicy) -> Self {
        Self { db, clock, policy }
    }

    /// First declaration for a session occurrence. A `Pending` status is a
    /// student's mobile declaration.
    pub async fn declare(
        &self,
        session_id: &str,
        date: NaiveDate,
        status: PresenceStatus,
        actor: &Actor,
        arrival_time: Option<NaiveTime>,
        comment: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        let key = self.scheduled_session(session_id, date).await?;
        let now = self.clock.now();

        let decision = transitions::decide(
            None,
            Transition::Declare(status),
            actor,
            (&key.program_id, key.group),
            now,
            &self.policy,
        )?;
        let status = decision.to.unwrap_or(status);
        let source = match decision.source {
            SourceEffect::Set(source) => source,
            SourceEffect::Keep => PresenceSource::Representative,
        };

        let arrival_time = match status {
            PresenceStatus::Absent | PresenceStatus::Pending => None,
            PresenceStatus::Present if actor.role == Role::Representative => {
                Some(arrival_time.unwrap_or_else(|| now.time()))
            }
            _ => arrival_time,
        };

        let record = PresenceRecord {
            id: Uuid::new_v4().to_string(),
            session_id: key.id(),
            program_id: key.program_id,
            group: key.group,
            date,
            status,
            declared_by: ActorRef::from(actor),
            declared_at: now,
            arrival_time,
            comment,
            confirmed_by: None,
            confirmed_at: None,
            source,
            last_modified_at: now,
            version: 1,
        };

        let mut tx = self.db.begin().await?;
        store::insert_presence(&mut tx, &record).await?;
        store::insert_event(&mut tx, &audit_event(&record, &decision, actor, now)).await?;
        tx.commit().await?;

        info!(
            "presence {} declared {} for {} on {} by {} {}",
            record.id, record.status, record.session_id, record.date, actor.role, actor.id
        );
        Ok(record)
    }

    pub async fn confirm(&self, presence_id: &str, actor: &Actor) -> Result<PresenceRecord, AppError> {
        self.apply(presence_id, Transition::Confirm, actor, None, None).await
    }

    pub async fn reject(
        &self,
        presence_id: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        self.apply(presence_id, Transition::Reject, actor, None, reason).await
    }

    pub async fn override_status(
        &self,
        presence_id: &str,
        actor: &Actor,
        status: PresenceStatus,
        comment: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        self.apply(presence_id, Transition::Override(status), actor, None, comment)
            .await
    }

    pub async fn edit(
        &self,
        presence_id: &str,
        actor: &Actor,
        status: PresenceStatus,
        arrival_time: Option<NaiveTime>,
        comment: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        self.apply(presence_id, Transition::Edit(status), actor, arrival_time, comment)
            .await
    }

    /// Removes the record; the session reads as unset again.
    pub async fn delete(&self, presence_id: &str, actor: &Actor) -> Result<(), AppError> {
        let current = self.load(presence_id).await?;
        self.remove(current, actor).await
    }

    /// Deletes `current` if the stored record still has its version.
    async fn remove(&self, current: PresenceRecord, actor: &Actor) -> Result<(), AppError> {
        let now = self.clock.now();
        let decision = transitions::decide(
            Some(&current),
            Transition::Delete,
            actor,
            (&current.program_id, current.group),
            now,
            &self.policy,
        )?;

        let mut tx = self.db.begin().await?;
        if !store::delete_presence(&mut tx, &current.id, current.version).await? {
            return Err(AppError::ConcurrentModification(current.id));
        }
        store::insert_event(&mut tx, &audit_event(&current, &decision, actor, now)).await?;
        tx.commit().await?;

        info!(
            "presence {} for {} on {} deleted by {} {}",
            current.id, current.session_id, current.date, actor.role, actor.id
        );
        Ok(())
    }

    pub async fn find(&self, presence_id: &str) -> Result<PresenceRecord, AppError> {
        self.load(presence_id).await
    }

    /// Audit trail, kept after the presence itself is deleted.
    pub async fn history(&self, presence_id: &str) -> Result<Vec<PresenceEvent>, AppError> {
        let events = store::fetch_events(&self.db, presence_id).await?;
        if events.is_empty() {
            return Err(AppError::PresenceNotFound(presence_id.to_string()));
        }
        Ok(events)
    }

    async fn apply(
        &self,
        presence_id: &str,
        transition: Transition,
        actor: &Actor,
        arrival_time: Option<NaiveTime>,
        comment: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        let current = self.load(presence_id).await?;
        self.apply_to(current, transition, actor, arrival_time, comment)
            .await
    }

    /// Applies `transition` to the snapshot `current`; loses with
    /// [`AppError::ConcurrentModification`] if the stored record moved on.
    async fn apply_to(
        &self,
        current: PresenceRecord,
        transition: Transition,
        actor: &Actor,
        arrival_time: Option<NaiveTime>,
        comment: Option<String>,
    ) -> Result<PresenceRecord, AppError> {
        let now = self.clock.now();
        let decision = transitions::decide(
            Some(&current),
            transition,
            actor,
            (&current.program_id, current.group),
            now,
            &self.policy,
        )?;

        let next = next_record(&current, &decision, actor, now, arrival_time, comment)?;

        let mut tx = self.db.begin().await?;
        if !store::update_presence(&mut tx, &next, current.version).await? {
            return Err(AppError::ConcurrentModification(current.id));
        }
        store::insert_event(&mut tx, &audit_event(&next, &decision, actor, now)).await?;
        tx.commit().await?;

        info!(
            "presence {} {} {} -> {} by {} {}",
            next.id, decision.event, decision.from, next.status, actor.role, actor.id
        );
        Ok(next)
    }

    async fn load(&self, presence_id: &str) -> Result<PresenceRecord, AppError> {
        store::find_presence_by_id(&self.db, presence_id)
            .await?
            .ok_or_else(|| AppError::PresenceNotFound(presence_id.to_string()))
    }

    /// Checks that `session_id` names a template entry occurring on `date`.
    async fn scheduled_session(&self, session_id: &str, date: NaiveDate) -> Result<SessionKey, AppError> {
        let not_found = || AppError::SessionNotFound {
            session_id: session_id.to_string(),
            date: date.to_string(),
        };

        let key = SessionKey::parse(session_id).ok_or_else(not_found)?;
        if key.weekday != date.weekday() {
            return Err(not_found());
        }
        repository::find_schedule_entry(&self.db, &key)
            .await?
            .ok_or_else(not_found)?;
        Ok(key)
    }
}

fn next_record(
    current: &PresenceRecord,
    decision: &Decision,
    actor: &Actor,
    now: DateTime<Utc>,
    arrival_time: Option<NaiveTime>,
    comment: Option<String>,
) -> Result<PresenceRecord, AppError> {
    let to = decision.to.ok_or(AppError::InvalidTransition {
        from: decision.from,
        event: decision.event,
        role: actor.role,
    })?;

    let mut next = current.clone();
    next.status = to;
    next.last_modified_at = now;
    next.version = current.version + 1;

    if let SourceEffect::Set(source) = decision.source {
        next.source = source;
    }
    if matches!(
        decision.event,
        EventKind::Confirm | EventKind::Reject | EventKind::Override
    ) {
        next.confirmed_by = Some(ActorRef::from(actor));
        next.confirmed_at = Some(now);
    }
    if comment.is_some() {
        next.comment = comment;
    }

    next.arrival_time = match to {
        PresenceStatus::Absent | PresenceStatus::Pending => None,
        _ => arrival_time.or(next.arrival_time),
    };
    if to == PresenceStatus::Present && next.arrival_time.is_none() {
        next.arrival_time = match decision.event {
            EventKind::Confirm => Some(current.declared_at.time()),
            EventKind::Edit => Some(now.time()),
            _ => None,
        };
    }

    Ok(next)
}

fn audit_event(
    record: &PresenceRecord,
    decision: &Decision,
    actor: &Actor,
    now: DateTime<Utc>,
) -> PresenceEvent {
    let to = decision
        .to
        .map_or(PresenceState::Unset, PresenceState::from);
    PresenceEvent {
        id: Uuid::new_v4().to_string(),
        presence_id: record.id.clone(),
        session_id: record.session_id.clone(),
        date: record.date,
        event: decision.event.as_str().to_string(),
        actor_id: actor.id.clone(),
        actor_role: actor.role.as_str().to_string(),
        from_status: decision.from.as_str().to_string(),
        to_status: to.as_str().to_string(),
        comment: record.comment.clone(),
        occurred_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::connect_in_memory;
    use crate::models::{CourseRef, InstructorRef, NewProgramRequest, NewTemplateEntryRequest, RoomRef, TimeSlot};
    use chrono::{TimeZone, Weekday};

    async fn setup() -> (PresenceService, Arc<ManualClock>, Actor, String) {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let program = repository::insert_program(
            &pool,
            NewProgramRequest {
                name: "Génie Civil".to_string(),
                licence_level: 4,
                semester: 7,
                group_count: 1,
            },
        )
        .await
        .expect("Failed to insert program");
        repository::insert_schedule_entry(
            &pool,
            NewTemplateEntryRequest {
                program_id: program.id.clone(),
                group: 1,
                weekday: Weekday::Mon,
                time_slot: TimeSlot::Morning,
                course: CourseRef {
                    id: "beton".to_string(),
                    name: "Béton armé".to_string(),
                    kind: "CM".to_string(),
                },
                instructor: InstructorRef {
                    id: "t-17".to_string(),
                    name: "Mme Ben Salah".to_string(),
                },
                room: RoomRef {
                    id: "a12".to_string(),
                    name: "A12".to_string(),
                },
            },
        )
        .await
        .expect("Failed to insert entry");

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 8, 35, 0).unwrap()));
        let service = PresenceService::new(pool, clock.clone(), PresencePolicy::default());
        let rep = Actor::representative("rep-gc-1", &program.id, 1);
        let session_id = SessionKey {
            program_id: program.id,
            group: 1,
            weekday: Weekday::Mon,
            time_slot: TimeSlot::Morning,
        }
        .id();
        (service, clock, rep, session_id)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn test_stale_edit_loses_to_the_first_writer() {
        let (service, clock, rep, session_id) = setup().await;
        let declared = service
            .declare(&session_id, monday(), PresenceStatus::Present, &rep, None, None)
            .await
            .expect("Failed to declare");

        let stale = service.find(&declared.id).await.expect("Failed to load presence");

        clock.advance(chrono::Duration::minutes(2));
        let winner = service
            .edit(&declared.id, &rep, PresenceStatus::Late, None, None)
            .await
            .expect("First edit should pass");
        assert_eq!(winner.version, 2);

        let err = service
            .apply_to(stale, Transition::Edit(PresenceStatus::Absent), &rep, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification(ref id) if *id == declared.id));

        let stored = service.find(&declared.id).await.expect("Failed to load presence");
        assert_eq!(stored, winner);

        let events = service.history(&declared.id).await.expect("Failed to read history");
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_override_and_delete_leave_record_untouched() {
        let (service, _clock, rep, session_id) = setup().await;
        let declared = service
            .declare(&session_id, monday(), PresenceStatus::Absent, &rep, None, None)
            .await
            .expect("Failed to declare");

        let stale = service.find(&declared.id).await.expect("Failed to load presence");
        let admin = Actor::admin("admin-1");
        let winner = service
            .override_status(&declared.id, &admin, PresenceStatus::Present, None)
            .await
            .expect("Override should pass");

        let err = service
            .apply_to(
                stale.clone(),
                Transition::Override(PresenceStatus::Late),
                &admin,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification(_)));

        let err = service.remove(stale, &admin).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification(_)));

        let stored = service.find(&declared.id).await.expect("Presence must survive");
        assert_eq!(stored, winner);
    }
}
