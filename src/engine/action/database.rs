// ABOUTME: Per-database action pinning the connection character set of the restore
// ABOUTME: Emits SET NAMES from the source database's charset and collation

use super::DatabaseAction;
use crate::database::{DatabaseMeta, Driver, Value};
use crate::engine::response::SqlResponse;
use anyhow::Result;
use async_trait::async_trait;

/// Emits `SET NAMES <charset> COLLATE <collation>` so restored text keeps its encoding
#[derive(Debug, Default, Clone, Copy)]
pub struct SetNames;

#[async_trait]
impl DatabaseAction for SetNames {
    async fn process_database(
        &self,
        db: &mut dyn Driver,
        database: &DatabaseMeta,
    ) -> Result<SqlResponse> {
        if database.character_set.is_empty() {
            return Ok(SqlResponse::empty());
        }

        let mut statement = format!(
            "SET NAMES {}",
            db.quote(&Value::from(database.character_set.as_str()))
        );
        if !database.collation.is_empty() {
            statement.push_str(&format!(
                " COLLATE {}",
                db.quote(&Value::from(database.collation.as_str()))
            ));
        }

        Ok(SqlResponse::single(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::database::memory::MemoryDriver;
    use crate::engine::action::run_per_database_actions;
    use crate::engine::action::tests::CaptureWriter;
    use crate::engine::context::EngineContext;
    use crate::engine::part::PartCore;

    #[tokio::test]
    async fn test_set_names() {
        let mut db = MemoryDriver::new("shop");
        let meta = DatabaseMeta {
            name: "shop".to_string(),
            character_set: "utf8mb4".to_string(),
            collation: "utf8mb4_unicode_ci".to_string(),
        };

        let response = SetNames.process_database(&mut db, &meta).await.unwrap();
        assert_eq!(
            response.action_queries(),
            &["SET NAMES 'utf8mb4' COLLATE 'utf8mb4_unicode_ci'".to_string()]
        );

        let bare = DatabaseMeta::default();
        assert!(!SetNames
            .process_database(&mut db, &bare)
            .await
            .unwrap()
            .has_action_queries());
    }

    #[tokio::test]
    async fn test_database_pipeline_runs_set_names() {
        let config = Configuration {
            per_database_actions: vec!["set_names".to_string(), "get_create".to_string()],
            ..Configuration::default()
        };
        let writer = CaptureWriter::with_path("/tmp/out.sql");
        let mut ctx = EngineContext::new(Box::new(MemoryDriver::new("shop")), config)
            .with_writer(Box::new(writer.clone()));
        let mut core = PartCore::new("shop");
        let meta = DatabaseMeta {
            name: "shop".to_string(),
            character_set: "latin1".to_string(),
            collation: String::new(),
        };

        let count = run_per_database_actions(&mut core, &mut ctx, &meta)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(writer.lines(), vec!["SET NAMES 'latin1';"]);
        assert_eq!(
            core.warnings(),
            &["Action class “get_create” is not a valid per-database action".to_string()]
        );
    }
}
