use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{EntityKind, EntityStore, Row, RowFilter, StoreError, WriteOp};

type Tables = BTreeMap<EntityKind, BTreeMap<String, Row>>;

/// Process-local store backing the API service, the demo, and tests.
///
/// Clones share the same tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `rows`; later duplicates replace earlier ones.
    pub fn with_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (EntityKind, Row)>,
    {
        let store = Self::new();
        {
            let mut tables = store.tables();
            for (kind, row) in rows {
                tables.entry(kind).or_default().insert(row.id.clone(), row);
            }
        }
        store
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.tables().get(&kind).map_or(0, BTreeMap::len)
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntityStore for InMemoryEntityStore {
    fn load_rows(&self, kind: EntityKind, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables();
        let rows = tables
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    fn write(&self, kind: EntityKind, op: WriteOp, row: Row) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let table = tables.entry(kind).or_default();

        match op {
            WriteOp::Insert => {
                if table.contains_key(&row.id) {
                    return Err(StoreError::Conflict { kind, id: row.id });
                }
                table.insert(row.id.clone(), row);
            }
            WriteOp::Update => {
                let stored = table.get_mut(&row.id).ok_or_else(|| StoreError::NotFound {
                    kind,
                    id: row.id.clone(),
                })?;
                stored.fields.extend(row.fields);
            }
            WriteOp::Delete => {
                if table.remove(&row.id).is_none() {
                    return Err(StoreError::NotFound { kind, id: row.id });
                }
            }
        }

        Ok(())
    }
}
