use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{Report, ReportSummary};

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, user_id, title, content, language, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.id.to_string(),
            report.user_id.to_string(),
            report.title,
            report.content,
            report.language,
            format_ts(&report.created_at),
        ],
    )?;
    Ok(())
}

/// Reports for one user, newest first.
pub fn list_reports(conn: &Connection, user_id: &Uuid) -> Result<Vec<ReportSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, language, created_at FROM reports
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut reports = Vec::new();
    for row in rows {
        let (id, title, language, created_at) = row?;
        reports.push(ReportSummary {
            id: parse_uuid("reports.id", &id)?,
            title,
            language,
            created_at: parse_ts("reports.created_at", &created_at)?,
        });
    }
    Ok(reports)
}

/// Fetch one report. Reports owned by another user are reported as absent.
pub fn get_report(
    conn: &Connection,
    user_id: &Uuid,
    report_id: &Uuid,
) -> Result<Option<Report>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT title, content, language, created_at FROM reports
             WHERE id = ?1 AND user_id = ?2",
            params![report_id.to_string(), user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(title, content, language, created_at)| {
        Ok(Report {
            id: *report_id,
            user_id: *user_id,
            title,
            content,
            language,
            created_at: parse_ts("reports.created_at", &created_at)?,
        })
    })
    .transpose()
}
