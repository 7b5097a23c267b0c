use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::debug;
use serde::de::DeserializeOwned;

use s3tables_access_provisioning::identifiers::{
    role_arn, validate_account_id, validate_role_name, DEFAULT_CATALOG_NAME,
    DEFAULT_MANAGED_POLICY_ARN, DEFAULT_REGION, DEFAULT_ROLE_NAME,
};
use s3tables_access_provisioning::policy::{
    evaluate, lake_formation_trust_policy, load_trust_policy, validate_trust_policy,
    AccessContext, AccessRequest, GrantRecord, PolicyDocument,
};
use s3tables_access_provisioning::{
    LfPermission, ProvisioningConfig, ProvisioningError, ProvisioningService, TableReference,
};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "s3tables-access",
    version,
    about = "Provision Lake Formation access to S3 Tables",
    long_about = "Creates the Lake Formation service role, registers S3 Tables with Lake \
Formation, creates the federated s3tablescatalog Glue catalog and grants table \
permissions. Every step checks live state first and only creates what is missing."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Integrate a table bucket with Lake Formation: service role, managed
    /// policy, resource registration and federated catalog
    Integrate {
        #[command(flatten)]
        target: TargetArgs,

        /// Inspect live state and print the planned steps without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Grant Lake Formation permissions on the target table to a principal
    Grant {
        #[command(flatten)]
        target: TargetArgs,

        /// IAM role or user ARN receiving the grant (assumed-role ARNs are mapped to the role)
        #[arg(long)]
        principal_arn: String,

        /// Lake Formation permission to grant; repeat for several (default: ALL)
        #[arg(long = "permission", value_name = "PERMISSION")]
        permissions: Vec<LfPermission>,

        /// Let the principal grant the same permissions to others
        #[arg(long)]
        with_grant_option: bool,
    },

    /// Check offline whether IAM, the table bucket policy and Lake Formation
    /// grants together allow a request
    CheckAccess(CheckAccessArgs),

    /// Print the generated Lake Formation trust policy
    RenderTrustPolicy {
        #[arg(long, env = "AWS_ACCOUNT_ID")]
        account_id: String,

        #[arg(long, default_value = DEFAULT_ROLE_NAME)]
        role_name: String,
    },
}

/// Where to provision and with which names.
#[derive(Args, Debug)]
struct TargetArgs {
    /// 12-digit AWS account id
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    account_id: String,

    /// Named credentials profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// S3 table bucket name
    #[arg(long)]
    table_bucket: String,

    /// Table bucket namespace (Glue database)
    #[arg(long)]
    namespace: String,

    #[arg(long)]
    table: String,

    #[arg(long, default_value = DEFAULT_CATALOG_NAME)]
    catalog_name: String,

    /// Lake Formation service role name
    #[arg(long, default_value = DEFAULT_ROLE_NAME)]
    role_name: String,

    /// Managed policy attached to the service role
    #[arg(long, default_value = DEFAULT_MANAGED_POLICY_ARN)]
    managed_policy_arn: String,

    /// Trust policy JSON file replacing the generated one
    #[arg(long, value_name = "FILE")]
    trust_policy: Option<PathBuf>,

    /// Timeout in seconds applied to every AWS call
    #[arg(long, value_name = "SECONDS")]
    call_timeout_secs: Option<u64>,
}

impl TargetArgs {
    fn into_config(self) -> Result<ProvisioningConfig, ProvisioningError> {
        let mut builder = ProvisioningConfig::builder()
            .account_id(self.account_id)
            .region(self.region)
            .profile(self.profile)
            .table_bucket(self.table_bucket)
            .namespace(self.namespace)
            .table(self.table)
            .catalog_name(self.catalog_name)
            .role_name(self.role_name)
            .managed_policy_arn(self.managed_policy_arn)
            .call_timeout(self.call_timeout_secs.map(Duration::from_secs));

        if let Some(path) = &self.trust_policy {
            builder = builder.trust_policy(load_trust_policy(path)?);
        }
        builder.build()
    }
}

#[derive(Args, Debug)]
struct CheckAccessArgs {
    /// Principal making the request
    #[arg(long)]
    principal_arn: String,

    /// Action, e.g. s3tables:GetTableData
    #[arg(long)]
    action: String,

    /// Resource ARN the action targets
    #[arg(long)]
    resource_arn: String,

    /// IAM identity policy JSON attached to the principal; repeat for several
    #[arg(long = "identity-policy", value_name = "FILE")]
    identity_policies: Vec<PathBuf>,

    /// Table bucket resource policy JSON
    #[arg(long, value_name = "FILE")]
    bucket_policy: Option<PathBuf>,

    /// JSON array of Lake Formation grants held by principals
    #[arg(long, value_name = "FILE")]
    grants: Option<PathBuf>,

    /// Namespace the request is scoped to
    #[arg(long)]
    namespace: Option<String>,

    /// Composite catalog id of the table, for requests mediated by Lake Formation
    #[arg(long, requires_all = ["namespace", "table", "lf_permission"])]
    catalog_id: Option<String>,

    #[arg(long, requires = "catalog_id")]
    table: Option<String>,

    /// Lake Formation permission the request needs
    #[arg(long, requires = "catalog_id")]
    lf_permission: Option<LfPermission>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status_for(&err))
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = format!("warn,s3tables_access_provisioning={level},s3tables_access={level}");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

/// Bad input exits with 2, like clap's own usage errors; everything else with 1.
fn exit_status_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ProvisioningError>() {
        Some(e) if e.is_configuration() => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Integrate { target, dry_run } => {
            let config = target.into_config()?;
            let service = ProvisioningService::new(config).await;
            if dry_run {
                for step in service.plan_integration().await? {
                    println!("{step}");
                }
            } else {
                service
                    .integrate(|outcome| println!("{outcome}"))
                    .await?;
                println!("Catalog id: {}", service.config().catalog_id());
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Grant {
            target,
            principal_arn,
            permissions,
            with_grant_option,
        } => {
            let config = target.into_config()?;
            let service = ProvisioningService::new(config).await;
            service.preflight().await?;

            let config = service.config();
            let outcome = service
                .grant_table_permissions(
                    &config.catalog_id(),
                    &config.namespace,
                    &config.table,
                    &principal_arn,
                    &permissions,
                    with_grant_option,
                )
                .await?;
            println!("{outcome}");
            Ok(ExitCode::SUCCESS)
        }

        Commands::CheckAccess(args) => check_access(args),

        Commands::RenderTrustPolicy {
            account_id,
            role_name,
        } => {
            validate_account_id(&account_id)?;
            validate_role_name(&role_name)?;
            let policy = lake_formation_trust_policy(&account_id);
            validate_trust_policy(&policy, &account_id, &role_arn(&account_id, &role_name))?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check_access(args: CheckAccessArgs) -> Result<ExitCode> {
    let identity_policies = args
        .identity_policies
        .iter()
        .map(|path| read_json::<PolicyDocument>(path, "identity policy"))
        .collect::<Result<Vec<_>, _>>()?;
    let bucket_policy = args
        .bucket_policy
        .as_deref()
        .map(|path| read_json::<PolicyDocument>(path, "table bucket policy"))
        .transpose()?;
    let grants = args
        .grants
        .as_deref()
        .map(|path| read_json::<Vec<GrantRecord>>(path, "grants"))
        .transpose()?
        .unwrap_or_default();

    let context = AccessContext {
        identity_policies,
        bucket_policy,
        grants,
    };

    let mut request = AccessRequest::new(args.principal_arn, args.action, args.resource_arn);
    if let Some(namespace) = &args.namespace {
        request = request.in_namespace(namespace.clone());
    }
    if let (Some(catalog_id), Some(namespace), Some(table), Some(permission)) =
        (args.catalog_id, args.namespace, args.table, args.lf_permission)
    {
        let table = TableReference {
            catalog_id,
            namespace,
            table,
        };
        request = request.through_lake_formation(table, permission);
    }
    debug!("Evaluating {request:?}");

    let decision = evaluate(&context, &request);
    for verdict in &decision.verdicts {
        println!("{verdict}");
    }

    if decision.is_allowed() {
        println!("ALLOWED");
        Ok(ExitCode::SUCCESS)
    } else {
        let missing: Vec<String> = decision
            .missing_layers()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("DENIED: missing {}", missing.join(", "));
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ProvisioningError::configuration(format!("cannot read {what} {}: {e}", path.display()))
    })?;
    let value = serde_json::from_str(&text).map_err(|e| {
        ProvisioningError::configuration(format!("malformed {what} {}: {e}", path.display()))
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_configuration_errors_map_to_usage_exit() {
        let err = anyhow::Error::from(ProvisioningError::configuration("bad account"));
        assert_eq!(exit_status_for(&err), EXIT_USAGE);

        let err = anyhow::Error::from(ProvisioningError::Authentication("expired".into()))
            .context("integrate");
        assert_eq!(exit_status_for(&err), EXIT_FAILURE);
    }
}
