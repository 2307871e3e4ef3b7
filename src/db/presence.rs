use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::AppError;
use crate::models::presence::PresenceRow;
use crate::models::{PresenceEvent, PresenceRecord};

const PRESENCE_COLUMNS: &str = "id, session_id, program_id, group_no, date, status, declared_by_id, declared_by_role, declared_at, arrival_time, comment, confirmed_by_id, confirmed_by_role, confirmed_at, source, last_modified_at, version";

fn into_records(rows: Vec<PresenceRow>) -> Result<Vec<PresenceRecord>, AppError> {
    rows.into_iter().map(PresenceRecord::try_from).collect()
}

pub async fn find_presence_by_id(db: &SqlitePool, id: &str) -> Result<Option<PresenceRecord>, AppError> {
    let row = sqlx::query_as::<_, PresenceRow>(&format!(
        "SELECT {PRESENCE_COLUMNS} FROM presences WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(PresenceRecord::try_from).transpose()
}

pub async fn find_presence_by_key(
    db: &SqlitePool,
    session_id: &str,
    date: NaiveDate,
) -> Result<Option<PresenceRecord>, AppError> {
    let row = sqlx::query_as::<_, PresenceRow>(&format!(
        "SELECT {PRESENCE_COLUMNS} FROM presences WHERE session_id = ? AND date = ?"
    ))
    .bind(session_id)
    .bind(date)
    .fetch_optional(db)
    .await?;

    row.map(PresenceRecord::try_from).transpose()
}

pub async fn fetch_presences_for_date(
    db: &SqlitePool,
    date: NaiveDate,
) -> Result<Vec<PresenceRecord>, AppError> {
    fetch_presences_between(db, date, date).await
}

/// Presences dated within `from..=to`.
pub async fn fetch_presences_between(
    db: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PresenceRecord>, AppError> {
    let rows = sqlx::query_as::<_, PresenceRow>(&format!(
        "SELECT {PRESENCE_COLUMNS} FROM presences WHERE date >= ? AND date <= ? ORDER BY date, session_id"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await?;

    into_records(rows)
}

/// Creates the record unless one already exists for its `(session_id, date)`.
///
/// The unique index decides; the loser of a race gets
/// [`AppError::AlreadyExists`].
pub async fn insert_presence(conn: &mut SqliteConnection, p: &PresenceRecord) -> Result<(), AppError> {
    let result = sqlx::query(&format!(
        "INSERT INTO presences ({PRESENCE_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
    ))
    .bind(&p.id)
    .bind(&p.session_id)
    .bind(&p.program_id)
    .bind(p.group)
    .bind(p.date)
    .bind(p.status.as_str())
    .bind(&p.declared_by.id)
    .bind(p.declared_by.role.as_str())
    .bind(p.declared_at)
    .bind(p.arrival_time)
    .bind(&p.comment)
    .bind(p.confirmed_by.as_ref().map(|a| a.id.clone()))
    .bind(p.confirmed_by.as_ref().map(|a| a.role.as_str()))
    .bind(p.confirmed_at)
    .bind(p.source.as_str())
    .bind(p.last_modified_at)
    .bind(p.version)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::AlreadyExists {
            session_id: p.session_id.clone(),
            date: p.date.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Writes `p` over the stored record if the stored version is still
/// `expected_version`. Returns `false` when the check-and-set lost.
pub async fn update_presence(
    conn: &mut SqliteConnection,
    p: &PresenceRecord,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE presences
        SET status = ?1,
            arrival_time = ?2,
            comment = ?3,
            confirmed_by_id = ?4,
            confirmed_by_role = ?5,
            confirmed_at = ?6,
            source = ?7,
            last_modified_at = ?8,
            version = ?9
        WHERE id = ?10 AND version = ?11
        "#,
    )
    .bind(p.status.as_str())
    .bind(p.arrival_time)
    .bind(&p.comment)
    .bind(p.confirmed_by.as_ref().map(|a| a.id.clone()))
    .bind(p.confirmed_by.as_ref().map(|a| a.role.as_str()))
    .bind(p.confirmed_at)
    .bind(p.source.as_str())
    .bind(p.last_modified_at)
    .bind(p.version)
    .bind(&p.id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn delete_presence(
    conn: &mut SqliteConnection,
    id: &str,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM presences WHERE id = ?1 AND version = ?2")
        .bind(id)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn insert_event(conn: &mut SqliteConnection, e: &PresenceEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO presence_events
            (id, presence_id, session_id, date, event, actor_id, actor_role,
            from_status, to_status, comment, occurred_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&e.id)
    .bind(&e.presence_id)
    .bind(&e.session_id)
    .bind(e.date)
    .bind(&e.event)
    .bind(&e.actor_id)
    .bind(&e.actor_role)
    .bind(&e.from_status)
    .bind(&e.to_status)
    .bind(&e.comment)
    .bind(e.occurred_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Audit trail of one presence, oldest first.
pub async fn fetch_events(db: &SqlitePool, presence_id: &str) -> Result<Vec<PresenceEvent>, sqlx::Error> {
    sqlx::query_as::<_, PresenceEvent>(
        r#"
        SELECT id, presence_id, session_id, date, event, actor_id, actor_role,
               from_status, to_status, comment, occurred_at
        FROM presence_events
        WHERE presence_id = ?
        ORDER BY occurred_at, rowid
        "#,
    )
    .bind(presence_id)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::{ActorRef, PresenceSource, PresenceStatus, Role};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, session_id: &str, date: NaiveDate) -> PresenceRecord {
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 8, 40, 0).unwrap();
        PresenceRecord {
            id: id.to_string(),
            session_id: session_id.to_string(),
            program_id: "gc47".to_string(),
            group: 1,
            date,
            status: PresenceStatus::Present,
            declared_by: ActorRef {
                id: "rep-1".to_string(),
                role: Role::Representative,
            },
            declared_at: at,
            arrival_time: chrono::NaiveTime::from_hms_opt(8, 40, 0),
            comment: None,
            confirmed_by: None,
            confirmed_at: None,
            source: PresenceSource::Representative,
            last_modified_at: at,
            version: 1,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_presence() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        let rec = record("p1", "gc47:1:mon:08h30-11h30", monday());
        insert_presence(&mut conn, &rec).await.expect("Failed to insert presence");
        drop(conn);

        let by_id = find_presence_by_id(&pool, "p1")
            .await
            .expect("Failed to find presence")
            .expect("Presence not found");
        assert_eq!(by_id, rec);

        let by_key = find_presence_by_key(&pool, "gc47:1:mon:08h30-11h30", monday())
            .await
            .expect("Failed to find presence");
        assert_eq!(by_key.map(|p| p.id), Some("p1".to_string()));
    }

    #[tokio::test]
    async fn test_second_record_for_same_session_date_is_rejected() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        insert_presence(&mut conn, &record("p1", "s", monday())).await.expect("Failed to insert presence");
        let err = insert_presence(&mut conn, &record("p2", "s", monday())).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));

        let next_week = monday() + chrono::Duration::days(7);
        insert_presence(&mut conn, &record("p3", "s", next_week))
            .await
            .expect("Another date is another occurrence");
    }

    #[tokio::test]
    async fn test_update_requires_matching_version() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        let mut rec = record("p1", "s", monday());
        insert_presence(&mut conn, &rec).await.expect("Failed to insert presence");

        rec.status = PresenceStatus::Late;
        rec.version = 2;
        assert!(update_presence(&mut conn, &rec, 1).await.expect("update failed"));

        rec.status = PresenceStatus::Absent;
        rec.version = 3;
        assert!(!update_presence(&mut conn, &rec, 1).await.expect("update failed"));

        assert!(!delete_presence(&mut conn, "p1", 1).await.expect("delete failed"));
        assert!(delete_presence(&mut conn, "p1", 2).await.expect("delete failed"));
        drop(conn);

        assert!(find_presence_by_id(&pool, "p1").await.expect("lookup failed").is_none());
    }

    #[tokio::test]
    async fn test_fetch_between_dates_is_inclusive() {
        let pool = connect_in_memory().await.expect("Failed to create test db");
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        let tuesday = monday() + chrono::Duration::days(1);
        let wednesday = monday() + chrono::Duration::days(2);
        for (id, date) in [("a", monday()), ("b", tuesday), ("c", wednesday)] {
            insert_presence(&mut conn, &record(id, "s", date)).await.expect("Failed to insert presence");
        }
        drop(conn);

        let found = fetch_presences_between(&pool, monday(), tuesday).await.expect("fetch failed");
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let single = fetch_presences_for_date(&pool, wednesday).await.expect("fetch failed");
        assert_eq!(single.len(), 1);
    }
}
