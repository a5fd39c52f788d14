use std::sync::Arc;

use domain::{CatalogService, InvoiceService, InvoiceServiceConfig};
use ledger_store::LedgerStore;
use statistics::StatisticsService;

/// Shared application state accessible from all handlers.
pub struct AppState<S: LedgerStore> {
    pub invoices: InvoiceService<S>,
    pub catalog: CatalogService<S>,
    pub statistics: StatisticsService<S>,
}

/// Wires every service onto one store.
pub fn create_state<S: LedgerStore + Clone>(
    store: S,
    config: InvoiceServiceConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        invoices: InvoiceService::with_config(store.clone(), config),
        catalog: CatalogService::new(store.clone()),
        statistics: StatisticsService::new(store),
    })
}
