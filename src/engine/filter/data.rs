// ABOUTME: Data filters deciding whether a table's rows are dumped
// ABOUTME: Skips views and engines which hold no persisted rows

use super::DataFilter;
use crate::database::TableMeta;

/// Engines whose tables have no real persisted data
const SPECIAL_ENGINES: [&str; 7] = [
    "BLACKHOLE",
    "EXAMPLE",
    "FEDERATED",
    "MEMORY",
    "HEAP",
    "MERGE",
    "MRG_MYISAM",
];

/// Never dump the rows of a view
#[derive(Debug, Default, Clone, Copy)]
pub struct NoViewData;

impl DataFilter for NoViewData {
    fn filter(&self, table: &TableMeta) -> bool {
        !table.is_view()
    }
}

/// Never dump the rows of tables using special storage engines
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecialEngines;

impl DataFilter for SpecialEngines {
    fn filter(&self, table: &TableMeta) -> bool {
        let engine = table.engine.to_ascii_uppercase();
        !SPECIAL_ENGINES.contains(&engine.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::table_data_allowed;

    #[test]
    fn test_views_have_no_data() {
        assert!(!NoViewData.filter(&TableMeta::new("v", "")));
        assert!(NoViewData.filter(&TableMeta::new("t", "InnoDB")));
    }

    #[test]
    fn test_special_engines_case_insensitive() {
        for engine in ["memory", "Heap", "BLACKHOLE", "mrg_myisam", "Federated"] {
            assert!(
                !SpecialEngines.filter(&TableMeta::new("t", engine)),
                "{} should be skipped",
                engine
            );
        }
        for engine in ["InnoDB", "MyISAM", "Aria", "ARCHIVE"] {
            assert!(SpecialEngines.filter(&TableMeta::new("t", engine)));
        }
    }

    #[test]
    fn test_all_filters_must_accept() {
        let filters: Vec<Box<dyn DataFilter>> = vec![Box::new(NoViewData), Box::new(SpecialEngines)];
        assert!(table_data_allowed(&filters, &TableMeta::new("t", "InnoDB")));
        assert!(!table_data_allowed(&filters, &TableMeta::new("t", "MEMORY")));
        assert!(!table_data_allowed(&filters, &TableMeta::new("v", "")));
        assert!(table_data_allowed(&[], &TableMeta::new("v", "")));
    }
}
