use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; the database's `user_version` counts how many ran.
const STEPS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

pub fn migrate(conn: &mut Connection) -> Result<()> {
    let applied: usize = conn
        .pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0))
        .context("failed to read results database version")?
        .try_into()
        .unwrap_or(usize::MAX);

    if applied > STEPS.len() {
        bail!(
            "results database is at version {applied}, newer than this build ({})",
            STEPS.len()
        );
    }
    if applied == STEPS.len() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in STEPS.iter().enumerate().skip(applied) {
        tx.execute_batch(sql)
            .with_context(|| format!("results schema step {} failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", STEPS.len() as i64)?;
    tx.commit().context("failed to commit results schema")?;
    Ok(())
}
