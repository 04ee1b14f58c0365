use energy_portal::error::AppError;
use energy_portal::store::{InMemoryEntityStore, SeedImporter};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the store the portals run against: a seed export when one is given, else the demo
/// accounts.
pub(crate) fn build_store(seed_dir: Option<&Path>) -> Result<InMemoryEntityStore, AppError> {
    match seed_dir {
        Some(dir) => {
            let store = InMemoryEntityStore::new();
            let imported = SeedImporter::import_dir(&store, dir)?;
            info!(dir = %dir.display(), rows = imported, "store seeded from export");
            Ok(store)
        }
        None => {
            info!("no seed export configured; using demo accounts");
            Ok(InMemoryEntityStore::with_demo_accounts())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_portal::store::EntityKind;
    use std::fs;

    #[test]
    fn demo_accounts_back_the_store_without_an_export() {
        let store = build_store(None).expect("demo store");
        assert_eq!(store.count(EntityKind::Technician), 2);
        assert_eq!(store.count(EntityKind::TechnicianJob), 1);
    }

    #[test]
    fn seed_exports_replace_the_demo_accounts() {
        let dir = std::env::temp_dir().join(format!("energy-portal-seed-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        fs::write(
            dir.join("technicians.csv"),
            "email,full_name\nlea@solar.ph,Lea Bautista\n",
        )
        .expect("seed file written");

        let store = build_store(Some(&dir)).expect("seeded store");
        assert_eq!(store.count(EntityKind::Technician), 1);
        assert_eq!(store.count(EntityKind::Customer), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unreadable_exports_surface_as_seed_errors() {
        let dir = std::env::temp_dir().join(format!("energy-portal-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        fs::write(dir.join("technicians.csv"), "full_name\nLea Bautista\n").expect("seed file");

        match build_store(Some(&dir)) {
            Err(AppError::Seed(_)) => {}
            Err(other) => panic!("expected seed error, got {other}"),
            Ok(_) => panic!("expected seed error"),
        }

        fs::remove_dir_all(&dir).ok();
    }
}
