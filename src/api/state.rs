use crate::analysis::HealthEngine;
use crate::config::ExportConfig;
use crate::storage::SqliteSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HealthEngine>,
    pub source: SqliteSource,
    pub export: ExportConfig,
}
