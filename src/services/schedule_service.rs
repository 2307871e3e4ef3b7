use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{presence as store, repository};
use crate::error::AppError;
use crate::models::{DaySchedule, NewProgramRequest, NewTemplateEntryRequest, Program, TemplateEntry};
use crate::services::session_deriver::{attach_presences, derive_sessions};
use crate::services::{class_label, resolver};

/// Read path from class labels to the sessions of a day.
pub struct ScheduleService {
    db: SqlitePool,
}

impl ScheduleService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn catalog(&self) -> Result<Vec<Program>, AppError> {
        Ok(repository::fetch_programs(&self.db).await?)
    }

    /// Parses a class label and resolves it against the stored catalog.
    pub async fn resolve_label(&self, label: &str) -> Result<(Program, u32), AppError> {
        let coords = class_label::parse(label)?;
        let catalog = self.catalog().await?;
        let program = resolver::resolve(&coords, &catalog)?;
        debug!("label {:?} resolved to program {}", label, program.id);
        Ok((program, coords.group))
    }

    pub async fn program_group(&self, program_id: &str, group: u32) -> Result<Program, AppError> {
        let program = repository::find_program_by_id(&self.db, program_id)
            .await?
            .ok_or_else(|| AppError::UnknownProgram(program_id.to_string()))?;

        if group == 0 || group > program.group_count {
            return Err(AppError::ProgramNotFound {
                name: program.name,
                licence: program.licence_level,
                semester: program.semester,
                group,
            });
        }
        Ok(program)
    }

    pub async fn add_program(&self, req: NewProgramRequest) -> Result<Program, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::BadRequest("program name must not be empty".to_string()));
        }
        let program = repository::insert_program(&self.db, req).await?;
        info!("program {} created: {}", program.id, program.name);
        Ok(program)
    }

    /// Publishes one slot of a group's weekly timetable.
    pub async fn add_template_entry(&self, req: NewTemplateEntryRequest) -> Result<TemplateEntry, AppError> {
        self.program_group(&req.program_id, req.group).await?;

        let (program_id, group, weekday, slot) = (req.program_id.clone(), req.group, req.weekday, req.time_slot);
        match repository::insert_schedule_entry(&self.db, req).await {
            Ok(entry) => {
                info!("template entry {} published for {} group {}", entry.id, program_id, group);
                Ok(entry)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::BadRequest(format!(
                "group {group} of {program_id} already has a course on {weekday} {slot}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Sessions of `(program_id, group)` on `date`, each with its presence
    /// or `unset`.
    pub async fn sessions_for_date(
        &self,
        program_id: &str,
        group: u32,
        date: NaiveDate,
    ) -> Result<DaySchedule, AppError> {
        let program = self.program_group(program_id, group).await?;

        let templates = repository::fetch_schedule(&self.db, program_id, group).await?;
        if templates.is_empty() {
            info!("no timetable published yet for program {} group {}", program_id, group);
            return Ok(DaySchedule::NotGenerated);
        }

        let sessions = derive_sessions(&program, group, date, &templates);
        let presences = store::fetch_presences_for_date(&self.db, date).await?;
        Ok(DaySchedule::Published(attach_presences(sessions, &presences)))
    }
}
