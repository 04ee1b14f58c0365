use super::{EntityKind, EntityStore, Row, StoreError, WriteOp};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingIdColumn { kind: EntityKind },
    Store(StoreError),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(err) => write!(f, "failed to read seed export: {}", err),
            SeedError::Csv(err) => write!(f, "invalid seed CSV data: {}", err),
            SeedError::MissingIdColumn { kind } => write!(
                f,
                "seed file for {} has no '{}' column",
                kind,
                kind.id_column()
            ),
            SeedError::Store(err) => write!(f, "could not load seed rows into store: {}", err),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io(err) => Some(err),
            SeedError::Csv(err) => Some(err),
            SeedError::MissingIdColumn { .. } => None,
            SeedError::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SeedError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<StoreError> for SeedError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Loads CSV exports (one file per table, header row required) into an [`EntityStore`].
pub struct SeedImporter;

impl SeedImporter {
    /// Imports `<table>.csv` for every entity kind present in `dir`; missing files are skipped.
    pub fn import_dir<S, P>(store: &S, dir: P) -> Result<usize, SeedError>
    where
        S: EntityStore + ?Sized,
        P: AsRef<Path>,
    {
        let dir = dir.as_ref();
        let mut total = 0;

        for kind in EntityKind::ordered() {
            let path = dir.join(format!("{}.csv", kind.table_name()));
            if !path.is_file() {
                debug!(table = kind.table_name(), "no seed file present");
                continue;
            }
            let imported = Self::from_path(store, kind, &path)?;
            info!(table = kind.table_name(), rows = imported, "seeded table");
            total += imported;
        }

        Ok(total)
    }

    pub fn from_path<S, P>(store: &S, kind: EntityKind, path: P) -> Result<usize, SeedError>
    where
        S: EntityStore + ?Sized,
        P: AsRef<Path>,
    {
        let file = std::fs::File::open(path)?;
        Self::from_reader(store, kind, file)
    }

    /// Inserts every record; blank cells are dropped so optional columns stay absent.
    pub fn from_reader<S, R>(store: &S, kind: EntityKind, reader: R) -> Result<usize, SeedError>
    where
        S: EntityStore + ?Sized,
        R: Read,
    {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let id_index = headers
            .iter()
            .position(|header| header == kind.id_column())
            .ok_or(SeedError::MissingIdColumn { kind })?;

        let mut imported = 0;
        for record in csv_reader.records() {
            let record = record?;
            let Some(id) = record.get(id_index).filter(|id| !id.is_empty()) else {
                continue;
            };

            let fields: BTreeMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(index, (_, value))| *index != id_index && !value.is_empty())
                .map(|(_, (header, value))| (header.to_string(), value.to_string()))
                .collect();

            store.write(
                kind,
                WriteOp::Insert,
                Row {
                    id: id.to_string(),
                    fields,
                },
            )?;
            imported += 1;
        }

        Ok(imported)
    }
}
