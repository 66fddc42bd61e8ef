mod bootstrap_helpers;
mod cli_args;
mod tenant_commands;
mod verify_command;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use relay_gateway::{run_gateway_server, GatewayConfig, OutboxRelaySink};
use relay_tenancy::{TenancyConfig, TenantRegistry};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::{Cli, Command, ServeArgs};
use crate::tenant_commands::execute_tenants_command;
use crate::verify_command::execute_verify_webhook_command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = cli.tenancy.resolve()?;

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Tenants(command) => {
            println!("{}", execute_tenants_command(config, &command)?);
            Ok(())
        }
        Command::VerifyWebhook(args) => {
            let report = execute_verify_webhook_command(config, &args)?;
            println!("{}", report.render());
            if !report.verdict.is_accepted() {
                bail!("webhook would be rejected ({})", report.verdict.reason_code());
            }
            Ok(())
        }
    }
}

async fn serve(config: TenancyConfig, args: ServeArgs) -> Result<()> {
    let registry = Arc::new(TenantRegistry::open(config).context("failed to load tenants")?);
    let sink = Arc::new(OutboxRelaySink::new(
        args.outbox_dir.clone(),
        args.outbox_rotation(),
    ));
    let gateway = GatewayConfig {
        bind: args.bind,
        admin_token: args.admin_token,
    };
    run_gateway_server(gateway, registry, sink).await
}
