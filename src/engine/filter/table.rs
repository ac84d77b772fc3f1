// ABOUTME: Table-list filters: keep prefixed tables, order tables before views
// ABOUTME: Both run during database preparation, in configured order

use super::TableFilter;
use crate::database::{Driver, DriverError};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Keeps only tables whose name starts with the configured prefix
///
/// The comparison ignores case: MySQL on case-insensitive filesystems may
/// report names with different casing than they were created with.
#[derive(Debug, Clone)]
pub struct NonCore {
    prefix: String,
}

impl NonCore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn is_core(&self, table: &str) -> bool {
        table
            .to_lowercase()
            .starts_with(&self.prefix.to_lowercase())
    }
}

#[async_trait]
impl TableFilter for NonCore {
    async fn filter(&self, _db: &mut dyn Driver, tables: Vec<String>) -> Result<Vec<String>> {
        Ok(tables.into_iter().filter(|t| self.is_core(t)).collect())
    }
}

/// Orders true tables alphabetically, followed by views alphabetically
#[derive(Debug, Default, Clone, Copy)]
pub struct Sorter;

#[async_trait]
impl TableFilter for Sorter {
    async fn filter(&self, db: &mut dyn Driver, tables: Vec<String>) -> Result<Vec<String>> {
        let mut real_tables = Vec::new();
        let mut views = Vec::new();

        for table in tables {
            let meta = match db.table_meta(&table).await {
                Ok(meta) => meta,
                Err(DriverError::UnknownTable(_)) => {
                    tracing::warn!("Table “{}” no longer exists; leaving it out", table);
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Cannot read metadata of table “{}”", table))
                }
            };
            if meta.is_view() {
                views.push(table);
            } else {
                real_tables.push(table);
            }
        }

        real_tables.sort();
        views.sort();
        real_tables.extend(views);

        Ok(real_tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::database::memory::{MemoryDriver, MemoryTable};
    use crate::database::TableMeta;
    use crate::engine::context::EngineContext;
    use crate::engine::filter::apply_table_filters;
    use crate::engine::part::PartCore;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_non_core_keeps_prefixed_tables() {
        let mut db = MemoryDriver::new("test");
        let tables = names(&[
            "test_foo",
            "test_bar",
            "test2_foo",
            "test2_bar",
            "test_2_foo",
            "test_2_bar",
            "tests_foo",
            "tests_bar",
            "foo",
            "bar",
        ]);

        let kept = NonCore::new("test_").filter(&mut db, tables).await.unwrap();

        assert_eq!(
            kept,
            names(&["test_foo", "test_bar", "test_2_foo", "test_2_bar"])
        );
    }

    #[tokio::test]
    async fn test_non_core_ignores_case() {
        let mut db = MemoryDriver::new("test");
        let kept = NonCore::new("wp_")
            .filter(&mut db, names(&["WP_posts", "Wp_users", "wpx_meta"]))
            .await
            .unwrap();
        assert_eq!(kept, names(&["WP_posts", "Wp_users"]));
    }

    #[tokio::test]
    async fn test_empty_prefix_keeps_everything() {
        let mut db = MemoryDriver::new("test");
        let kept = NonCore::new("")
            .filter(&mut db, names(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(kept, names(&["a", "b"]));
    }

    fn mixed_driver() -> MemoryDriver {
        let db = MemoryDriver::new("test");
        for (name, engine) in [
            ("tst_view2", ""),
            ("tst_table2", "InnoDB"),
            ("tst_view1", ""),
            ("tst_table1", "MyISAM"),
            ("other", "InnoDB"),
        ] {
            db.add_table(MemoryTable::new(TableMeta::new(name, engine), vec![]));
        }
        db
    }

    #[tokio::test]
    async fn test_sorter_puts_views_last() {
        let mut db = mixed_driver();
        let sorted = Sorter
            .filter(
                &mut db,
                names(&["tst_view2", "tst_table2", "tst_view1", "tst_table1"]),
            )
            .await
            .unwrap();

        assert_eq!(
            sorted,
            names(&["tst_table1", "tst_table2", "tst_view1", "tst_view2"])
        );
    }

    #[tokio::test]
    async fn test_sorter_drops_vanished_table_and_keeps_the_rest() {
        let mut db = mixed_driver();
        let sorted = Sorter
            .filter(
                &mut db,
                names(&["tst_view1", "ghost", "tst_table2", "tst_table1"]),
            )
            .await
            .unwrap();

        assert_eq!(sorted, names(&["tst_table1", "tst_table2", "tst_view1"]));
    }

    #[tokio::test]
    async fn test_sorter_fails_without_metadata_access() {
        let mut db = mixed_driver();
        db.deny_information_schema();

        let err = Sorter
            .filter(&mut db, names(&["tst_table1"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DriverError>(),
            Some(DriverError::NoInformationSchemaAccess(_))
        ));
    }

    #[tokio::test]
    async fn test_pipeline_runs_in_order_and_warns() {
        let config = Configuration {
            table_prefix: "tst_".to_string(),
            table_filters: names(&["non_core", "nope", "no_view_data", "sorter"]),
            ..Configuration::default()
        };
        let mut ctx = EngineContext::new(Box::new(mixed_driver()), config);
        let mut core = PartCore::new("test");
        let tables = ctx.db.table_list().await.unwrap();

        let filtered = apply_table_filters(&mut core, &mut ctx, tables).await.unwrap();

        assert_eq!(
            filtered,
            names(&["tst_table1", "tst_table2", "tst_view1", "tst_view2"])
        );
        assert_eq!(core.warnings().len(), 2);
        assert!(core.warnings()[0].contains("“nope” does not exist"));
        assert!(core.warnings()[1].contains("is not a valid table filter"));
    }
}
