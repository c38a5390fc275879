//! Hub configuration service
//!
//! Fetches the hub config together with the live conversion rate and
//! assembles the inputs of the expense calculator.

use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::expenses::ExpenseParameters;
use crate::flight::SingleFlight;
use crate::hub::HubApi;
use crate::models::config::{Config, ConversionRate};
use crate::models::template::ContractTemplate;

#[derive(Default)]
struct ConfigState {
    config: Option<Config>,
    conversion_rate: Option<ConversionRate>,
    fetch_error: Option<String>,
}

/// Cached view of the hub config and the live conversion rate
pub struct ConfigService {
    api: Arc<dyn HubApi>,
    state: RwLock<ConfigState>,
    flight: SingleFlight,
}

impl ConfigService {
    pub fn new(api: Arc<dyn HubApi>) -> Self {
        Self {
            api,
            state: RwLock::new(ConfigState::default()),
            flight: SingleFlight::new(),
        }
    }

    /// Fetch the hub config and the conversion rate. Concurrent calls
    /// share one request pair.
    pub async fn fetch_with_conversion_rate(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.flight
            .run(move || async move { this.fetch_inner().await })
            .await;
    }

    async fn fetch_inner(&self) {
        let config = match self.api.get_config().await {
            Ok(config) => config,
            Err(e) => {
                error!("hub config fetch failed: {}", e);
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.fetch_error = Some(e.to_string());
                return;
            }
        };

        let conversion_rate = match self.api.get_conversion_rate().await {
            Ok(rate) => rate,
            Err(e) => {
                error!("conversion rate fetch failed: {}", e);
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.fetch_error = Some(e.to_string());
                return;
            }
        };

        debug!(
            cycles_permyriad_per_token = conversion_rate.cycles_permyriad_per_token(),
            "hub config refreshed"
        );
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.config = Some(config);
        state.conversion_rate = Some(conversion_rate);
        state.fetch_error = None;
    }

    pub fn config(&self) -> Option<Config> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.config.clone()
    }

    pub fn conversion_rate(&self) -> Option<ConversionRate> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.conversion_rate.clone()
    }

    pub fn fetch_error(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.fetch_error.clone()
    }

    /// Whether the hub currently accepts new deployments. `None` until the
    /// config is loaded.
    pub fn is_deployment_available(&self) -> Option<bool> {
        self.config().map(|config| config.is_deployment_available)
    }

    /// Assemble the expense calculator inputs for a template. `None` while
    /// config or rate are still missing.
    pub fn expense_parameters(&self, template: &ContractTemplate) -> Option<ExpenseParameters> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let config = state.config.as_ref()?;
        let conversion_rate = state.conversion_rate.as_ref()?;

        Some(ExpenseParameters {
            contract_initial_cycles: template.contract_initial_cycles,
            deployment_cycles_cost: config.deployment_cycles_cost,
            cycles_permyriad_per_token: conversion_rate.cycles_permyriad_per_token(),
            ledger_fee_ulps: config.ledger_fee_ulps,
            amount_buffer_permyriad: config.deployment_expenses_amount_buffer_permyriad,
            amount_decimal_places: config.deployment_expenses_amount_decimal_places,
            allowance_expiration_timeout_millis: config
                .deployment_allowance_expiration_timeout_millis,
        })
    }
}
