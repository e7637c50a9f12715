//! `runs` command: recent sync history.

use chrono::{DateTime, Utc};
use gscdb_db::SyncRunRow;

pub(crate) async fn list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = gscdb_db::list_sync_runs(pool, limit.clamp(1, 500)).await?;

    if runs.is_empty() {
        println!("no sync runs recorded");
        return Ok(());
    }

    println!(
        "{:<6} {:<22} {:<10} {:<22} {:>8} {:>10}",
        "ID", "STARTED", "TRIGGER", "STATUS", "SOURCES", "ROWS"
    );
    for run in &runs {
        println!("{}", format_run(run));
        for line in run.errors.lines().filter(|l| !l.is_empty()) {
            println!("       ! {line}");
        }
    }
    Ok(())
}

fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_run(run: &SyncRunRow) -> String {
    format!(
        "{:<6} {:<22} {:<10} {:<22} {:>8} {:>10}",
        run.id,
        fmt_time(run.started_at),
        run.trigger_source,
        run.status,
        run.sources_synced,
        run.total_rows
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn run_row_is_aligned() {
        let started = Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap();
        let run = SyncRunRow {
            id: 7,
            public_id: "00000000-0000-4000-8000-000000000000".parse().unwrap(),
            trigger_source: "scheduler".to_string(),
            window_days: 7,
            status: "completed".to_string(),
            started_at: started,
            completed_at: Some(started),
            sources_synced: 4,
            total_rows: 1_234,
            errors: String::new(),
        };
        let line = format_run(&run);
        assert!(line.starts_with("7      2026-03-09 06:00:00"));
        assert!(line.contains("scheduler"));
        assert!(line.ends_with("1234"));
    }
}
