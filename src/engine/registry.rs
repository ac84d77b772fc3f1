// ABOUTME: Maps configured component identifiers to filter and action constructors
// ABOUTME: Distinguishes unknown identifiers from identifiers of the wrong kind

use super::action::database::SetNames;
use super::action::{DatabaseAction, GetCreate, TableAction};
use super::filter::{DataFilter, NoViewData, NonCore, RowFilter, Sorter, SpecialEngines, TableFilter};
use crate::config::Configuration;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Constructor<T> = Arc<dyn Fn(&Configuration) -> Box<T> + Send + Sync>;

/// The five kinds of pluggable components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    TableFilter,
    DataFilter,
    RowFilter,
    DatabaseAction,
    TableAction,
}

impl ComponentKind {
    fn family(self) -> &'static str {
        match self {
            ComponentKind::TableFilter | ComponentKind::DataFilter | ComponentKind::RowFilter => {
                "Filter"
            }
            ComponentKind::DatabaseAction | ComponentKind::TableAction => "Action",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::TableFilter => "table filter",
            ComponentKind::DataFilter => "data filter",
            ComponentKind::RowFilter => "row filter",
            ComponentKind::DatabaseAction => "per-database action",
            ComponentKind::TableAction => "per-table action",
        };
        f.write_str(name)
    }
}

/// Why a configured identifier cannot be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("{} class “{id}” does not exist", .kind.family())]
    NotFound { id: String, kind: ComponentKind },

    #[error("{} class “{id}” is not a valid {kind}", .kind.family())]
    WrongKind { id: String, kind: ComponentKind },
}

#[derive(Clone)]
enum Component {
    TableFilter(Constructor<dyn TableFilter>),
    DataFilter(Constructor<dyn DataFilter>),
    RowFilter(Constructor<dyn RowFilter>),
    DatabaseAction(Constructor<dyn DatabaseAction>),
    TableAction(Constructor<dyn TableAction>),
}

/// Identifier to constructor map for every pipeline component
#[derive(Clone, Default)]
pub struct Registry {
    components: HashMap<String, Component>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.components.keys().collect();
        ids.sort();
        f.debug_struct("Registry").field("components", &ids).finish()
    }
}

impl Registry {
    /// Registry without any component
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in filters and actions
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_table_filter("non_core", |config| {
            Box::new(NonCore::new(config.table_prefix.clone()))
        });
        registry.register_table_filter("sorter", |_| Box::new(Sorter));
        registry.register_data_filter("no_view_data", |_| Box::new(NoViewData));
        registry.register_data_filter("special_engines", |_| Box::new(SpecialEngines));
        registry.register_table_action("get_create", |_| Box::new(GetCreate::new()));
        registry.register_database_action("set_names", |_| Box::new(SetNames));
        registry
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn register_table_filter<F>(&mut self, id: &str, make: F)
    where
        F: Fn(&Configuration) -> Box<dyn TableFilter> + Send + Sync + 'static,
    {
        self.components
            .insert(id.to_string(), Component::TableFilter(Arc::new(make)));
    }

    pub fn register_data_filter<F>(&mut self, id: &str, make: F)
    where
        F: Fn(&Configuration) -> Box<dyn DataFilter> + Send + Sync + 'static,
    {
        self.components
            .insert(id.to_string(), Component::DataFilter(Arc::new(make)));
    }

    pub fn register_row_filter<F>(&mut self, id: &str, make: F)
    where
        F: Fn(&Configuration) -> Box<dyn RowFilter> + Send + Sync + 'static,
    {
        self.components
            .insert(id.to_string(), Component::RowFilter(Arc::new(make)));
    }

    pub fn register_database_action<F>(&mut self, id: &str, make: F)
    where
        F: Fn(&Configuration) -> Box<dyn DatabaseAction> + Send + Sync + 'static,
    {
        self.components
            .insert(id.to_string(), Component::DatabaseAction(Arc::new(make)));
    }

    pub fn register_table_action<F>(&mut self, id: &str, make: F)
    where
        F: Fn(&Configuration) -> Box<dyn TableAction> + Send + Sync + 'static,
    {
        self.components
            .insert(id.to_string(), Component::TableAction(Arc::new(make)));
    }

    fn lookup(&self, id: &str, kind: ComponentKind) -> Result<&Component, LookupError> {
        self.components.get(id).ok_or_else(|| LookupError::NotFound {
            id: id.to_string(),
            kind,
        })
    }

    fn wrong_kind(id: &str, kind: ComponentKind) -> LookupError {
        LookupError::WrongKind {
            id: id.to_string(),
            kind,
        }
    }

    pub fn table_filter(
        &self,
        id: &str,
        config: &Configuration,
    ) -> Result<Box<dyn TableFilter>, LookupError> {
        match self.lookup(id, ComponentKind::TableFilter)? {
            Component::TableFilter(make) => Ok(make(config)),
            _ => Err(Self::wrong_kind(id, ComponentKind::TableFilter)),
        }
    }

    pub fn data_filter(
        &self,
        id: &str,
        config: &Configuration,
    ) -> Result<Box<dyn DataFilter>, LookupError> {
        match self.lookup(id, ComponentKind::DataFilter)? {
            Component::DataFilter(make) => Ok(make(config)),
            _ => Err(Self::wrong_kind(id, ComponentKind::DataFilter)),
        }
    }

    pub fn row_filter(
        &self,
        id: &str,
        config: &Configuration,
    ) -> Result<Box<dyn RowFilter>, LookupError> {
        match self.lookup(id, ComponentKind::RowFilter)? {
            Component::RowFilter(make) => Ok(make(config)),
            _ => Err(Self::wrong_kind(id, ComponentKind::RowFilter)),
        }
    }

    pub fn database_action(
        &self,
        id: &str,
        config: &Configuration,
    ) -> Result<Box<dyn DatabaseAction>, LookupError> {
        match self.lookup(id, ComponentKind::DatabaseAction)? {
            Component::DatabaseAction(make) => Ok(make(config)),
            _ => Err(Self::wrong_kind(id, ComponentKind::DatabaseAction)),
        }
    }

    pub fn table_action(
        &self,
        id: &str,
        config: &Configuration,
    ) -> Result<Box<dyn TableAction>, LookupError> {
        match self.lookup(id, ComponentKind::TableAction)? {
            Component::TableAction(make) => Ok(make(config)),
            _ => Err(Self::wrong_kind(id, ComponentKind::TableAction)),
        }
    }
}
