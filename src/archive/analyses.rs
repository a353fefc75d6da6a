use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::ResultsArchive;

/// One stored analysis of a capture batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub session_id: String,
    pub task: String,
    pub analyzed_at: DateTime<Utc>,
    pub productive: bool,
    pub reason: String,
    pub raw_response: String,
    pub frame_count: u32,
    pub change_score: Option<u32>,
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

impl ResultsArchive {
    pub async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |store| {
            store.conn.execute(
                "INSERT INTO analyses (
                    id,
                    session_id,
                    task,
                    analyzed_at,
                    productive,
                    reason,
                    raw_response,
                    frame_count,
                    change_score
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.session_id,
                    record.task,
                    record.analyzed_at.to_rfc3339(),
                    record.productive,
                    record.reason,
                    record.raw_response,
                    record.frame_count,
                    record.change_score,
                ],
            )
            .context("failed to insert analysis")?;
            Ok(())
        })
        .await
    }

    /// Most recent analyses first.
    pub async fn recent_analyses(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |store| {
            let mut stmt = store.conn.prepare(
                "SELECT id, session_id, task, analyzed_at, productive, reason,
                        raw_response, frame_count, change_score
                 FROM analyses
                 ORDER BY analyzed_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(AnalysisRecord {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    task: row.get(2)?,
                    analyzed_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    productive: row.get(4)?,
                    reason: row.get(5)?,
                    raw_response: row.get(6)?,
                    frame_count: row.get(7)?,
                    change_score: row.get(8)?,
                });
            }
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, at: DateTime<Utc>, productive: bool) -> AnalysisRecord {
        AnalysisRecord {
            id: id.into(),
            session_id: "session-1".into(),
            task: "write the parser".into(),
            analyzed_at: at,
            productive,
            reason: format!("reason {id}"),
            raw_response: "{}".into(),
            frame_count: 3,
            change_score: Some(12),
        }
    }

    #[tokio::test]
    async fn stores_and_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ResultsArchive::open(dir.path().to_path_buf()).unwrap();
        let now = Utc::now();

        archive.insert_analysis(&record("a", now - Duration::minutes(2), true)).await.unwrap();
        archive.insert_analysis(&record("b", now, false)).await.unwrap();
        archive.insert_analysis(&record("c", now - Duration::minutes(1), true)).await.unwrap();

        let recent = archive.recent_analyses(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(!recent[0].productive);
        assert_eq!(recent[1].change_score, Some(12));
    }

    #[tokio::test]
    async fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let archive = ResultsArchive::open(dir.path().to_path_buf()).unwrap();
            archive.insert_analysis(&record("keep", Utc::now(), true)).await.unwrap();
        }
        let archive = ResultsArchive::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(archive.recent_analyses(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn frames_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ResultsArchive::open(dir.path().to_path_buf()).unwrap();
        let at = Utc::now();

        let first = archive.save_frame(&[1, 2, 3], at).await.unwrap();
        let second = archive.save_frame(&[4, 5, 6], at).await.unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(dir.path().join("screenshots")));
        assert_eq!(std::fs::read(second).unwrap(), vec![4, 5, 6]);
    }
}
