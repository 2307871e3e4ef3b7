use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::schedule::{ScheduleEntryRow, weekday_code};
use crate::models::{NewProgramRequest, NewTemplateEntryRequest, Program, SessionKey, TemplateEntry};

const SCHEDULE_COLUMNS: &str = "id, program_id, group_no, weekday, time_slot, course_id, course_name, course_type, instructor_id, instructor_name, room_id, room_name";

/// The program catalog in insertion order.
pub async fn fetch_programs(db: &SqlitePool) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(
        "SELECT id, name, licence_level, semester, group_count FROM programs ORDER BY rowid",
    )
    .fetch_all(db)
    .await
}

pub async fn find_program_by_id(db: &SqlitePool, id: &str) -> Result<Option<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(
        "SELECT id, name, licence_level, semester, group_count FROM programs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_program(db: &SqlitePool, req: NewProgramRequest) -> Result<Program, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO programs (id, name, licence_level, semester, group_count)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(req.licence_level)
    .bind(req.semester)
    .bind(req.group_count)
    .execute(db)
    .await?;

    Ok(Program {
        id,
        name: req.name,
        licence_level: req.licence_level,
        semester: req.semester,
        group_count: req.group_count,
    })
}

fn into_entries(rows: Vec<ScheduleEntryRow>) -> Result<Vec<TemplateEntry>, AppError> {
    rows.into_iter().map(TemplateEntry::try_from).collect()
}

/// Weekly template of one program group.
pub async fn fetch_schedule(
    db: &SqlitePool,
    program_id: &str,
    group: u32,
) -> Result<Vec<TemplateEntry>, AppError> {
    let rows = sqlx::query_as::<_, ScheduleEntryRow>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries WHERE program_id = ? AND group_no = ?"
    ))
    .bind(program_id)
    .bind(group)
    .fetch_all(db)
    .await?;

    into_entries(rows)
}

/// Every template entry, for all programs and groups.
pub async fn fetch_all_schedules(db: &SqlitePool) -> Result<Vec<TemplateEntry>, AppError> {
    let rows = sqlx::query_as::<_, ScheduleEntryRow>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries"
    ))
    .fetch_all(db)
    .await?;

    into_entries(rows)
}

pub async fn find_schedule_entry(
    db: &SqlitePool,
    key: &SessionKey,
) -> Result<Option<TemplateEntry>, AppError> {
    let row = sqlx::query_as::<_, ScheduleEntryRow>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries
         WHERE program_id = ? AND group_no = ? AND weekday = ? AND time_slot = ?"
    ))
    .bind(&key.program_id)
    .bind(key.group)
    .bind(weekday_code(key.weekday))
    .bind(key.time_slot.label())
    .fetch_optional(db)
    .await?;

    row.map(TemplateEntry::try_from).transpose()
}

pub async fn insert_schedule_entry(
    db: &SqlitePool,
    req: NewTemplateEntryRequest,
) -> Result<TemplateEntry, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO schedule_entries
            (id, program_id, group_no, weekday, time_slot, course_id, course_name, course_type,
            instructor_id, instructor_name, room_id, room_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&id)
    .bind(&req.program_id)
    .bind(req.group)
    .bind(weekday_code(req.weekday))
    .bind(req.time_slot.label())
    .bind(&req.course.id)
    .bind(&req.course.name)
    .bind(&req.course.kind)
    .bind(&req.instructor.id)
    .bind(&req.instructor.name)
    .bind(&req.room.id)
    .bind(&req.room.name)
    .execute(db)
    .await?;

    Ok(TemplateEntry {
        id,
        program_id: req.program_id,
        group: req.group,
        weekday: req.weekday,
        time_slot: req.time_slot,
        course: req.course,
        instructor: req.instructor,
        room: req.room,
    })
}
