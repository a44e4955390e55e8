//! Operator commands.

use super::Engine;
use serde_json::Value;
use sync_database::{SyncLogEntry, TargetSystem};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Print counts per target and status, then entries needing an operator.
pub async fn show_status(engine: &Engine, limit: usize) -> CommandResult {
    let counts = engine.log.status_counts().await?;
    if counts.is_empty() {
        println!("Sync log is empty");
    } else {
        println!("{:<10} {:<10} {:>8}", "TARGET", "STATUS", "COUNT");
        for row in &counts {
            println!(
                "{:<10} {:<10} {:>8}",
                row.target_system.as_str(),
                row.status.as_str(),
                row.count
            );
        }
    }

    let attention = engine.log.list_needing_attention(limit).await?;
    if !attention.is_empty() {
        println!();
        println!("Needs attention ({}):", attention.len());
        for entry in &attention {
            println!("  {}", entry_line(entry));
        }
    }
    Ok(())
}

pub async fn upsert_entity(
    engine: &Engine,
    entity_type: &str,
    entity_id: &str,
    data: &str,
) -> CommandResult {
    let data: Value = serde_json::from_str(data)?;
    if !data.is_object() {
        return Err("entity data must be a JSON object".into());
    }
    engine.entities.upsert(entity_type, entity_id, data).await?;
    println!("Stored {} {}", entity_type, entity_id);
    Ok(())
}

pub async fn delete_entity(engine: &Engine, entity_type: &str, entity_id: &str) -> CommandResult {
    if engine.entities.soft_delete(entity_type, entity_id).await? {
        println!("Deleted {} {}", entity_type, entity_id);
    } else {
        println!("{} {} not found or already deleted", entity_type, entity_id);
    }
    Ok(())
}

pub async fn enqueue_change(
    engine: &Engine,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
) -> CommandResult {
    match engine
        .log
        .enqueue_if_changed(entity_type, entity_id, target)
        .await?
    {
        Some(entry) => println!("Enqueued {}", entry_line(&entry)),
        None => println!("{} {} is up to date for {}", entity_type, entity_id, target),
    }
    Ok(())
}

pub async fn show_history(
    engine: &Engine,
    entity_type: &str,
    entity_id: &str,
    target: TargetSystem,
) -> CommandResult {
    let entries = engine.log.history(entity_type, entity_id, target).await?;
    if entries.is_empty() {
        println!("No sync history for {} {} on {}", entity_type, entity_id, target);
    }
    for entry in &entries {
        println!("{}", entry_line(entry));
    }
    Ok(())
}

pub async fn requeue_entry(engine: &Engine, id: i64) -> CommandResult {
    let entry = engine.log.requeue(id).await?;
    println!("Requeued {}", entry_line(&entry));
    Ok(())
}

fn entry_line(entry: &SyncLogEntry) -> String {
    let mut line = format!(
        "#{} {} {} {}/{} {} retries={}",
        entry.id,
        entry.target_system,
        entry.operation,
        entry.entity_type,
        entry.entity_id,
        entry.status.as_str(),
        entry.retry_count,
    );
    if let Some(next) = entry.next_retry_at {
        line.push_str(&format!(" next={}", next.to_rfc3339()));
    }
    if let Some(external_id) = &entry.external_id {
        line.push_str(&format!(" external_id={}", external_id));
    }
    if let Some(error) = &entry.error_message {
        line.push_str(&format!(" error=\"{}\"", error));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_engine;
    use sync_config_and_utils::{Config, Paths};
    use sync_database::SyncStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn unconfigured_target_reschedules_enqueued_change() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let engine = build_engine(&Config::default(), &paths).await.unwrap();

        upsert_entity(&engine, "contact", "42", r#"{"name": "Ada"}"#)
            .await
            .unwrap();
        enqueue_change(&engine, "contact", "42", TargetSystem::Splynx)
            .await
            .unwrap();

        let report = engine.scheduler.run_pending_sync_batch().await.unwrap();
        assert_eq!(report.claimed, 1);
        assert_eq!(report.retry_scheduled, 1);

        let history = engine
            .log
            .history("contact", "42", TargetSystem::Splynx)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SyncStatus::Failed);
        assert!(history[0].next_retry_at.is_some());
        assert!(entry_line(&history[0]).contains("retries=1"));
    }

    #[tokio::test]
    async fn upsert_rejects_non_object_data() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let engine = build_engine(&Config::default(), &paths).await.unwrap();

        assert!(upsert_entity(&engine, "contact", "42", "[1, 2]").await.is_err());
        assert!(upsert_entity(&engine, "contact", "42", "not json").await.is_err());
    }
}
