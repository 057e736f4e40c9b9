//! Command-line front end.
//!
//! Each subcommand becomes one [`AppCommand`]; `autosave` runs the backup
//! worker until interrupted.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use caravan_infra::AppConfig;
use caravan_inventory::{AuthorizationForm, AuthorizationId, VehicleForm, VehicleUnitId};
use caravan_parties::{ClientForm, ClientId};
use caravan_sales::SaleId;

use crate::commands::{AppCommand, dispatch};
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "caravan-desktop", about = "Caravan dealership inventory and sales", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand)]
    Clients(ClientsCommand),
    #[command(subcommand)]
    Vehicles(VehiclesCommand),
    #[command(subcommand)]
    Authorizations(AuthorizationsCommand),
    #[command(subcommand)]
    Sales(SalesCommand),
    /// Show per-type stock counts
    Stock {
        /// Recompute the counts from the vehicle units first
        #[arg(long)]
        refresh: bool,
    },
    /// List units whose availability flag disagrees with the sales
    Check,
    /// Write a full JSON snapshot of the database
    Export,
    #[command(subcommand)]
    Reports(ReportsCommand),
    /// Run the periodic cloud backup until interrupted
    Autosave,
    /// Run a command given as JSON, e.g. '{"command":"list_sales"}'
    Json { command: String },
}

#[derive(Debug, Subcommand)]
enum ClientsCommand {
    List,
    Save(ClientArgs),
    Delete { id: ClientId },
    /// Find a client by scanned QR content or public code
    Lookup { input: String },
}

#[derive(Debug, Args)]
struct ClientArgs {
    /// Existing client to update
    #[arg(long)]
    id: Option<ClientId>,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// National ID (DNI)
    #[arg(long)]
    dni: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    email: String,
}

#[derive(Debug, Subcommand)]
enum VehiclesCommand {
    List {
        /// Only units not part of any sale
        #[arg(long)]
        available: bool,
    },
    Save(VehicleArgs),
    Delete { id: VehicleUnitId },
}

#[derive(Debug, Args)]
struct VehicleArgs {
    /// Existing unit to update
    #[arg(long)]
    id: Option<VehicleUnitId>,
    #[arg(long)]
    serial: String,
    #[arg(long)]
    brand: String,
    #[arg(long)]
    model: String,
    #[arg(long)]
    year: String,
    #[arg(long)]
    plate: String,
    /// Registration (SENASA) number
    #[arg(long)]
    registration: String,
    #[arg(long = "type")]
    kind: String,
    #[arg(long)]
    price: String,
    #[arg(long, default_value = "")]
    features: String,
    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Debug, Subcommand)]
enum AuthorizationsCommand {
    List { vehicle: VehicleUnitId },
    Save {
        #[arg(long)]
        id: Option<AuthorizationId>,
        #[arg(long)]
        vehicle: VehicleUnitId,
        #[arg(long)]
        number: String,
        /// Issue date (YYYY-MM-DD)
        #[arg(long)]
        issued_on: NaiveDate,
        #[arg(long)]
        status: String,
    },
    Delete { id: AuthorizationId },
}

#[derive(Debug, Subcommand)]
enum SalesCommand {
    List,
    Show { id: SaleId },
    Create {
        #[arg(long)]
        client: ClientId,
        /// Sale date (YYYY-MM-DD); today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Vehicle unit to include (repeatable)
        #[arg(long = "unit", required = true)]
        units: Vec<VehicleUnitId>,
    },
    Edit {
        id: SaleId,
        #[arg(long)]
        client: Option<ClientId>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        add: Vec<VehicleUnitId>,
        #[arg(long)]
        remove: Vec<VehicleUnitId>,
    },
    Delete { id: SaleId },
}

#[derive(Debug, Subcommand)]
enum ReportsCommand {
    Generate,
    List,
}

/// What a parsed command line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Dispatch(AppCommand),
    AutoSave,
}

impl Cli {
    pub fn action(self) -> anyhow::Result<Action> {
        let command = match self.command {
            Commands::Clients(c) => match c {
                ClientsCommand::List => AppCommand::ListClients,
                ClientsCommand::Save(args) => AppCommand::SaveClient {
                    form: ClientForm {
                        id: args.id,
                        first_name: args.first_name,
                        last_name: args.last_name,
                        national_id: args.dni,
                        phone: args.phone,
                        email: args.email,
                    },
                },
                ClientsCommand::Delete { id } => AppCommand::DeleteClient { client_id: id },
                ClientsCommand::Lookup { input } => AppCommand::LookupClient { input },
            },
            Commands::Vehicles(c) => match c {
                VehiclesCommand::List { available: true } => AppCommand::ListAvailableVehicles,
                VehiclesCommand::List { available: false } => AppCommand::ListVehicles,
                VehiclesCommand::Save(args) => AppCommand::SaveVehicle {
                    form: VehicleForm {
                        id: args.id,
                        serial: args.serial,
                        brand: args.brand,
                        model: args.model,
                        year: args.year,
                        plate: args.plate,
                        registration_number: args.registration,
                        kind: args.kind,
                        price: args.price,
                        features: args.features,
                        description: args.description,
                    },
                },
                VehiclesCommand::Delete { id } => AppCommand::DeleteVehicle { vehicle_id: id },
            },
            Commands::Authorizations(c) => match c {
                AuthorizationsCommand::List { vehicle } => {
                    AppCommand::ListAuthorizations { vehicle_id: vehicle }
                }
                AuthorizationsCommand::Save {
                    id,
                    vehicle,
                    number,
                    issued_on,
                    status,
                } => AppCommand::SaveAuthorization {
                    form: AuthorizationForm {
                        id,
                        vehicle_id: vehicle,
                        number,
                        issued_on,
                        status,
                    },
                },
                AuthorizationsCommand::Delete { id } => {
                    AppCommand::DeleteAuthorization { authorization_id: id }
                }
            },
            Commands::Sales(c) => match c {
                SalesCommand::List => AppCommand::ListSales,
                SalesCommand::Show { id } => AppCommand::LoadSale { sale_id: id },
                SalesCommand::Create {
                    client,
                    date,
                    units,
                } => AppCommand::CreateSale {
                    client_id: Some(client),
                    date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                    vehicle_ids: units,
                },
                SalesCommand::Edit {
                    id,
                    client,
                    date,
                    add,
                    remove,
                } => AppCommand::EditSale {
                    sale_id: id,
                    client_id: client,
                    date,
                    add,
                    remove,
                },
                SalesCommand::Delete { id } => AppCommand::DeleteSale { sale_id: id },
            },
            Commands::Stock { refresh: true } => AppCommand::RefreshStock,
            Commands::Stock { refresh: false } => AppCommand::ListStock,
            Commands::Check => AppCommand::CheckAvailability,
            Commands::Export => AppCommand::Export,
            Commands::Reports(ReportsCommand::Generate) => AppCommand::GenerateReports,
            Commands::Reports(ReportsCommand::List) => AppCommand::ListReports,
            Commands::Autosave => return Ok(Action::AutoSave),
            Commands::Json { command } => {
                serde_json::from_str(&command).context("invalid command JSON")?
            }
        };
        Ok(Action::Dispatch(command))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let action = self.action()?;
        let config = AppConfig::from_env().context("invalid configuration")?;
        let state = AppState::open(config).await?;

        match action {
            Action::Dispatch(command) => {
                let outcome = dispatch(&state, command).await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            Action::AutoSave => {
                let handle = state.autosave_worker().start().await?;
                tracing::info!("auto-save running; press Ctrl-C to stop");
                tokio::signal::ctrl_c()
                    .await
                    .context("failed to listen for Ctrl-C")?;
                handle.shutdown().await;
            }
        }

        state.db.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(args: &[&str]) -> Action {
        Cli::try_parse_from(std::iter::once("caravan-desktop").chain(args.iter().copied()))
            .unwrap()
            .action()
            .unwrap()
    }

    #[test]
    fn sale_edits_collect_repeated_units() {
        let sale = SaleId::new();
        let a = VehicleUnitId::new();
        let b = VehicleUnitId::new();
        let parsed = action(&[
            "sales",
            "edit",
            &sale.to_string(),
            "--add",
            &a.to_string(),
            "--add",
            &b.to_string(),
            "--date",
            "2025-03-01",
        ]);
        assert_eq!(
            parsed,
            Action::Dispatch(AppCommand::EditSale {
                sale_id: sale,
                client_id: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 1),
                add: vec![a, b],
                remove: vec![],
            })
        );
    }

    #[test]
    fn create_requires_a_unit() {
        let client = ClientId::new().to_string();
        let parsed = Cli::try_parse_from(["caravan-desktop", "sales", "create", "--client", &client]);
        assert!(parsed.is_err());
    }

    #[test]
    fn vehicle_type_flag_maps_to_kind() {
        let parsed = action(&[
            "vehicles", "save", "--serial", "S1", "--brand", "B", "--model", "M", "--year",
            "2024", "--plate", "P1", "--registration", "R1", "--type", "Trailer", "--price",
            "1500",
        ]);
        let Action::Dispatch(AppCommand::SaveVehicle { form }) = parsed else {
            panic!("unexpected action {parsed:?}");
        };
        assert_eq!(form.kind, "Trailer");
        assert_eq!(form.registration_number, "R1");
    }

    #[test]
    fn json_commands_and_autosave() {
        assert_eq!(
            action(&["json", r#"{"command":"list_sales"}"#]),
            Action::Dispatch(AppCommand::ListSales)
        );
        assert_eq!(action(&["autosave"]), Action::AutoSave);
        assert!(
            Cli::try_parse_from(["caravan-desktop", "json", "{"])
                .unwrap()
                .action()
                .is_err()
        );
    }
}
