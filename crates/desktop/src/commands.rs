//! Typed application commands and their dispatcher.
//!
//! Every screen action is one [`AppCommand`]; [`dispatch`] runs it against
//! the [`AppState`] and returns a serializable [`CommandOutcome`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use caravan_core::DomainError;
use caravan_infra::{ClientLookup, SaleSummary, StoreError};
use caravan_inventory::{
    Authorization, AuthorizationForm, AuthorizationId, StockEntry, VehicleForm, VehicleUnit,
    VehicleUnitId,
};
use caravan_parties::{Client, ClientForm, ClientId};
use caravan_sales::{Sale, SaleCompositionEditor, SaleId};

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AppCommand {
    ListClients,
    SaveClient { form: ClientForm },
    DeleteClient { client_id: ClientId },
    LookupClient { input: String },

    ListVehicles,
    ListAvailableVehicles,
    SaveVehicle { form: VehicleForm },
    DeleteVehicle { vehicle_id: VehicleUnitId },

    ListAuthorizations { vehicle_id: VehicleUnitId },
    SaveAuthorization { form: AuthorizationForm },
    DeleteAuthorization { authorization_id: AuthorizationId },

    ListSales,
    LoadSale { sale_id: SaleId },
    /// Compose a new sale from the currently available units.
    CreateSale {
        client_id: Option<ClientId>,
        date: NaiveDate,
        vehicle_ids: Vec<VehicleUnitId>,
    },
    /// Edit an existing sale; `None` keeps the stored client or date.
    EditSale {
        sale_id: SaleId,
        client_id: Option<ClientId>,
        date: Option<NaiveDate>,
        add: Vec<VehicleUnitId>,
        remove: Vec<VehicleUnitId>,
    },
    DeleteSale { sale_id: SaleId },

    RefreshStock,
    ListStock,
    CheckAvailability,
    Export,
    GenerateReports,
    ListReports,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    Clients(Vec<Client>),
    Client(Client),
    Lookup(ClientLookup),
    Vehicles(Vec<VehicleUnit>),
    Vehicle(VehicleUnit),
    Authorizations(Vec<Authorization>),
    Authorization(Authorization),
    Sales(Vec<SaleSummary>),
    Sale(Sale),
    Stock(Vec<StockEntry>),
    /// Units whose availability flag disagrees with the sales.
    Inconsistent(Vec<VehicleUnitId>),
    Exported(PathBuf),
    Reports(BTreeMap<String, PathBuf>),
    ReportNames(Vec<String>),
    Deleted,
}

pub async fn dispatch(state: &AppState, command: AppCommand) -> anyhow::Result<CommandOutcome> {
    tracing::debug!(?command, "dispatching command");

    let outcome = match command {
        AppCommand::ListClients => CommandOutcome::Clients(state.clients.list().await?),
        AppCommand::SaveClient { form } => CommandOutcome::Client(state.clients.save(&form).await?),
        AppCommand::DeleteClient { client_id } => {
            state.clients.delete(client_id).await?;
            CommandOutcome::Deleted
        }
        AppCommand::LookupClient { input } => {
            CommandOutcome::Lookup(state.clients.lookup(&input).await?)
        }

        AppCommand::ListVehicles => CommandOutcome::Vehicles(state.vehicles.list().await?),
        AppCommand::ListAvailableVehicles => {
            CommandOutcome::Vehicles(state.vehicles.list_available().await?)
        }
        AppCommand::SaveVehicle { form } => {
            CommandOutcome::Vehicle(state.vehicles.save(&form).await?)
        }
        AppCommand::DeleteVehicle { vehicle_id } => {
            state.vehicles.delete(vehicle_id).await?;
            CommandOutcome::Deleted
        }

        AppCommand::ListAuthorizations { vehicle_id } => {
            CommandOutcome::Authorizations(state.authorizations.list_for_vehicle(vehicle_id).await?)
        }
        AppCommand::SaveAuthorization { form } => {
            CommandOutcome::Authorization(state.authorizations.save(&form).await?)
        }
        AppCommand::DeleteAuthorization { authorization_id } => {
            state.authorizations.delete(authorization_id).await?;
            CommandOutcome::Deleted
        }

        AppCommand::ListSales => CommandOutcome::Sales(state.sales.list().await?),
        AppCommand::LoadSale { sale_id } => CommandOutcome::Sale(state.sales.load(sale_id).await?),
        AppCommand::CreateSale {
            client_id,
            date,
            vehicle_ids,
        } => {
            let mut editor = state.sales.editor_for_new().await?;
            pick_units(&mut editor, &vehicle_ids)?;
            let draft = editor.to_draft(client_id, date)?;
            CommandOutcome::Sale(state.sales.save(&draft).await?)
        }
        AppCommand::EditSale {
            sale_id,
            client_id,
            date,
            add,
            remove,
        } => {
            let (sale, mut editor) = state.sales.editor_for(sale_id).await?;
            for unit_id in &remove {
                if editor.remove_unit(*unit_id).is_none() {
                    return Err(DomainError::validation(format!(
                        "vehicle unit {unit_id} is not part of this sale"
                    ))
                    .into());
                }
            }
            pick_units(&mut editor, &add)?;
            let draft = editor.to_draft(
                Some(client_id.unwrap_or(sale.client_id())),
                date.unwrap_or(sale.date()),
            )?;
            CommandOutcome::Sale(state.sales.save(&draft).await?)
        }
        AppCommand::DeleteSale { sale_id } => {
            state.sales.delete_sale(sale_id).await?;
            CommandOutcome::Deleted
        }

        AppCommand::RefreshStock => CommandOutcome::Stock(state.stock.refresh().await?),
        AppCommand::ListStock => CommandOutcome::Stock(state.stock.list().await?),
        AppCommand::CheckAvailability => {
            CommandOutcome::Inconsistent(state.vehicles.inconsistencies().await?)
        }
        AppCommand::Export => {
            let dataset = caravan_infra::Dataset::load(&state.db)
                .await
                .context("failed to read the dataset")?;
            CommandOutcome::Exported(
                state
                    .exporter
                    .export(&dataset)
                    .await
                    .context("failed to write the export")?,
            )
        }
        AppCommand::GenerateReports => CommandOutcome::Reports(
            state
                .reports
                .generate()
                .await
                .context("failed to generate reports")?,
        ),
        AppCommand::ListReports => CommandOutcome::ReportNames(state.reports.available_reports()?),
    };
    Ok(outcome)
}

/// Move units from the pick pool into the selection.
fn pick_units(editor: &mut SaleCompositionEditor, ids: &[VehicleUnitId]) -> anyhow::Result<()> {
    for unit_id in ids {
        if editor.contains(*unit_id) {
            continue;
        }
        let unit = editor.pool_unit(*unit_id).cloned().ok_or_else(|| {
            DomainError::validation(format!("vehicle unit {unit_id} is not available"))
        })?;
        editor.add_unit(unit);
    }
    Ok(())
}

/// Message shown to the operator for a failed command.
///
/// Correctable business errors are shown as-is; anything else is reported as
/// an unexpected failure with its cause chain.
pub fn user_message(err: &anyhow::Error) -> String {
    let domain = err
        .downcast_ref::<DomainError>()
        .or_else(|| err.downcast_ref::<StoreError>().and_then(StoreError::as_domain));

    match domain {
        Some(e) if e.is_correctable() => e.to_string(),
        Some(DomainError::Conflict(msg)) => {
            format!("the record changed or is in use; reload and try again ({msg})")
        }
        Some(DomainError::NotFound(what)) => format!("{what} no longer exists; reload the list"),
        Some(e) => e.to_string(),
        None => format!("unexpected error: {err:#}"),
    }
}
