#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use sqlx::SqlitePool;

use presence::clock::ManualClock;
use presence::config::PresencePolicy;
use presence::db::{connect_in_memory, repository};
use presence::models::{
    CourseRef, InstructorRef, NewProgramRequest, NewTemplateEntryRequest, Program, RoomRef, SessionKey, TimeSlot,
};
use presence::services::PresenceService;

pub struct Fixture {
    pub db: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub genie_civil: Program,
    pub informatique: Program,
}

impl Fixture {
    pub fn presences(&self) -> PresenceService {
        PresenceService::new(self.db.clone(), self.clock.clone(), PresencePolicy::default())
    }

    pub fn presences_with(&self, policy: PresencePolicy) -> PresenceService {
        PresenceService::new(self.db.clone(), self.clock.clone(), policy)
    }

    /// Génie Civil group 1 on Monday morning.
    pub fn monday_morning(&self) -> String {
        session_id(&self.genie_civil, 1, Weekday::Mon, TimeSlot::Morning)
    }
}

/// Monday 10 March 2025.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

pub fn class_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 35, 0).unwrap()
}

pub fn session_id(program: &Program, group: u32, weekday: Weekday, slot: TimeSlot) -> String {
    SessionKey {
        program_id: program.id.clone(),
        group,
        weekday,
        time_slot: slot,
    }
    .id()
}

pub fn entry(program: &Program, group: u32, weekday: Weekday, slot: TimeSlot, course: &str) -> NewTemplateEntryRequest {
    NewTemplateEntryRequest {
        program_id: program.id.clone(),
        group,
        weekday,
        time_slot: slot,
        course: CourseRef {
            id: course.to_lowercase(),
            name: course.to_string(),
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
    }
}

/// Two programs: Génie Civil L4 S7 with two groups and a Monday timetable
/// for group 1 only, and Informatique L3 S5 with one group and a Monday
/// morning course.
pub async fn seed() -> Fixture {
    let db = connect_in_memory().await.expect("Failed to create test db");

    let genie_civil = repository::insert_program(
        &db,
        NewProgramRequest {
            name: "Génie Civil".to_string(),
            licence_level: 4,
            semester: 7,
            group_count: 2,
        },
    )
    .await
    .expect("Failed to insert program");

    let informatique = repository::insert_program(
        &db,
        NewProgramRequest {
            name: "Informatique".to_string(),
            licence_level: 3,
            semester: 5,
            group_count: 1,
        },
    )
    .await
    .expect("Failed to insert program");

    for (slot, course) in [
        (TimeSlot::Afternoon, "Hydraulique"),
        (TimeSlot::Morning, "Béton armé"),
        (TimeSlot::Midday, "Géotechnique"),
    ] {
        repository::insert_schedule_entry(&db, entry(&genie_civil, 1, Weekday::Mon, slot, course))
            .await
            .expect("Failed to insert entry");
    }
    repository::insert_schedule_entry(&db, entry(&genie_civil, 1, Weekday::Wed, TimeSlot::Morning, "Topographie"))
        .await
        .expect("Failed to insert entry");
    repository::insert_schedule_entry(
        &db,
        entry(&informatique, 1, Weekday::Mon, TimeSlot::Morning, "Compilation"),
    )
    .await
    .expect("Failed to insert entry");

    Fixture {
        db,
        clock: Arc::new(ManualClock::new(class_start())),
        genie_civil,
        informatique,
    }
}
