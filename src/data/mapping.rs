use indexmap::IndexMap;

use crate::data::table::Table;
use crate::error::{StockError, StockResult};

/// Named view over table columns, e.g. `open/high/low/close`.
#[derive(Debug, Clone)]
pub struct TableMapping {
    table: Table,
    fields: IndexMap<String, usize>,
}

impl TableMapping {
    #[must_use]
    pub fn new(table: Table) -> Self {
        Self {
            table,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, column: usize) -> StockResult<Self> {
        self.add_field(name, column)?;
        Ok(self)
    }

    pub fn add_field(&mut self, name: impl Into<String>, column: usize) -> StockResult<()> {
        let name = name.into();
        let columns_count = self.table.columns_count();
        if column >= columns_count {
            return Err(StockError::InvalidData(format!(
                "field `{name}` maps to column {column}, table has {columns_count} columns"
            )));
        }
        self.fields.insert(name, column);
        Ok(())
    }

    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn column(&self, field: &str) -> StockResult<usize> {
        self.fields
            .get(field)
            .copied()
            .ok_or_else(|| StockError::UnknownField(field.to_owned()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.fields
            .iter()
            .map(|(name, column)| (name.as_str(), *column))
    }
}
