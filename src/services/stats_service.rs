use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::db::{presence as store, repository};
use crate::error::AppError;
use crate::models::{ClassStat, PresenceStats, Program, StatsReport, StatsScope};
use crate::services::aggregator::{aggregate_by_class, aggregate_global, sort_class_stats};
use crate::services::session_deriver::{attach_presences, derive_sessions};

/// Longest range accepted by [`StatsService::stats_for_range`], in days.
pub const MAX_RANGE_DAYS: i64 = 366;

pub struct StatsService {
    db: SqlitePool,
}

impl StatsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn stats_for_date(&self, date: NaiveDate, scope: StatsScope) -> Result<StatsReport, AppError> {
        self.stats_for_range(date, date, scope).await
    }

    /// Statistics over every scheduled session dated within `from..=to`.
    ///
    /// Reads are not isolated from concurrent mutations; a confirmation
    /// landing mid-read shows up on the next call.
    pub async fn stats_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        scope: StatsScope,
    ) -> Result<StatsReport, AppError> {
        if from > to {
            return Err(AppError::BadRequest(format!("range starts after it ends: {from} > {to}")));
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(AppError::BadRequest(format!(
                "range longer than {MAX_RANGE_DAYS} days"
            )));
        }

        let catalog = repository::fetch_programs(&self.db).await?;
        let classes = classes_in_scope(&catalog, &scope)?;
        let templates = repository::fetch_all_schedules(&self.db).await?;
        let presences = store::fetch_presences_between(&self.db, from, to).await?;

        let mut sessions = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            for (program, group) in &classes {
                sessions.extend(derive_sessions(program, *group, date, &templates));
            }
        }
        let joined = attach_presences(sessions, &presences);

        let mut stats = aggregate_by_class(&joined, &catalog);
        for (program, group) in &classes {
            if !stats.iter().any(|s| s.program_id == program.id && s.group == *group) {
                stats.push(empty_stat(program, *group));
            }
        }
        sort_class_stats(&mut stats);

        match scope {
            StatsScope::AllClasses => {
                let global = aggregate_global(&stats);
                Ok(StatsReport::AllClasses {
                    classes: stats,
                    global,
                })
            }
            StatsScope::OneClass { .. } => {
                let one = stats
                    .into_iter()
                    .next()
                    .ok_or_else(|| AppError::BadRequest("empty class scope".to_string()))?;
                Ok(StatsReport::OneClass(one))
            }
        }
    }
}

fn classes_in_scope<'a>(catalog: &'a [Program], scope: &StatsScope) -> Result<Vec<(&'a Program, u32)>, AppError> {
    match scope {
        StatsScope::AllClasses => Ok(catalog
            .iter()
            .flat_map(|p| (1..=p.group_count).map(move |g| (p, g)))
            .collect()),
        StatsScope::OneClass { program_id, group } => {
            let program = catalog
                .iter()
                .find(|p| &p.id == program_id)
                .ok_or_else(|| AppError::UnknownProgram(program_id.clone()))?;
            if *group == 0 || *group > program.group_count {
                return Err(AppError::ProgramNotFound {
                    name: program.name.clone(),
                    licence: program.licence_level,
                    semester: program.semester,
                    group: *group,
                });
            }
            Ok(vec![(program, *group)])
        }
    }
}

fn empty_stat(program: &Program, group: u32) -> ClassStat {
    ClassStat {
        program_id: program.id.clone(),
        program_name: program.name.clone(),
        licence_level: program.licence_level,
        semester: program.semester,
        group,
        stats: PresenceStats::default(),
    }
}
