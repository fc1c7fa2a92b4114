// Cadence — CLI Command Handlers
//
// Each function handles one CLI subcommand against a `Gateway` built from the
// loaded configuration. The `serve` command starts either the MCP stdio
// server or the UDS server. Output for humans goes to stdout, except under
// `serve --transport stdio`, where stdout belongs to the MCP protocol.

use std::io::BufRead;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::access::RoleSet;
use crate::config::{CadenceConfig, SecretSourceKind};
use crate::enclave::KeyringSecretSource;
use crate::error::{CadenceError, Result};
use crate::gateway::UdsServer;
use crate::knowledge::AnswerOutcome;
use crate::mcp::CadenceServer;
use crate::service::{Caller, Gateway};

use super::{CallerArgs, Cli, Commands, Transport};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = CadenceConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Store {
            caller,
            name,
            secret,
        } => cmd_store(&config, &caller, &name, secret),
        Commands::Get { caller, name } => cmd_get(&config, &caller, &name),
        Commands::List { caller } => cmd_list(&config, &caller),
        Commands::Delete { caller, name } => cmd_delete(&config, &caller, &name),
        Commands::Search { caller, query } => cmd_search(&config, &caller, &query),
        Commands::Ask { caller, question } => cmd_ask(&config, &caller, &question).await,
        Commands::Access { caller } => cmd_access(&config, &caller),
        Commands::Serve {
            transport,
            owner,
            roles,
            socket,
        } => cmd_serve(&config, transport, owner, &roles, socket).await,
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &CadenceConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;

    match config.vault.master_secret {
        SecretSourceKind::Keyring => {
            KeyringSecretSource::new().get_or_create()?;
        }
        SecretSourceKind::Env => {
            let source = config.secret_source();
            if !source.is_present()? {
                return Err(CadenceError::Validation(format!(
                    "master secret not set; export a random value of at least 16 bytes in {}",
                    source.describe()
                )));
            }
        }
    }

    let _gateway = Gateway::open(config)?;

    println!("✓ Cadence initialized successfully");
    println!("  Data dir:      {}", config.data_dir.display());
    println!("  Vault:         {}", config.database_path().display());
    println!("  Master secret: {}", config.secret_source().describe());
    println!();
    println!(
        "Next: store your model key with `cadence store --owner <id> {}`",
        config.llm.credential_name
    );

    Ok(())
}

// ─── Vault ───────────────────────────────────────────────────────────────────

fn cmd_store(
    config: &CadenceConfig,
    args: &CallerArgs,
    name: &str,
    secret: Option<String>,
) -> Result<()> {
    let (gateway, caller) = open(config, args)?;

    let secret = match secret {
        Some(value) => Zeroizing::new(value),
        None => read_secret_from_stdin()?,
    };

    gateway.store_credential(&caller, name, &secret)?;
    println!("✓ Credential '{}' stored for {}", name, caller.owner_id);
    Ok(())
}

fn cmd_get(config: &CadenceConfig, args: &CallerArgs, name: &str) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    let secret = gateway.get_credential(&caller, name)?;
    println!("{}", secret.as_str());
    Ok(())
}

fn cmd_list(config: &CadenceConfig, args: &CallerArgs) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    let summaries = gateway.list_credentials(&caller)?;

    if summaries.is_empty() {
        println!("No credentials stored for {}.", caller.owner_id);
        println!("Add one with: cadence store --owner {} <name>", caller.owner_id);
        return Ok(());
    }

    println!("Credentials for {} ({}):\n", caller.owner_id, summaries.len());
    for summary in &summaries {
        println!("  {}", summary);
    }
    Ok(())
}

fn cmd_delete(config: &CadenceConfig, args: &CallerArgs, name: &str) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    if gateway.delete_credential(&caller, name)? {
        println!("✓ Credential '{}' deleted", name);
    } else {
        println!("Credential not found: {}", name);
    }
    Ok(())
}

// ─── Knowledge ───────────────────────────────────────────────────────────────

fn cmd_search(config: &CadenceConfig, args: &CallerArgs, query: &str) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    let items = gateway.search_knowledge(&caller, query)?;

    if items.is_empty() {
        println!("No knowledge base entries match '{}'.", query);
        return Ok(());
    }

    println!("{:-<80}", "");
    for item in &items {
        println!("{} │ {} │ {} │ {}", item.id, item.tier, item.category, item.title);
        println!("  {}", item.content);
        println!("{:-<80}", "");
    }
    Ok(())
}

async fn cmd_ask(config: &CadenceConfig, args: &CallerArgs, question: &str) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    let answer = gateway.ask(&caller, question).await?;

    println!("{}", answer.text);
    if answer.outcome == AnswerOutcome::Generated && !answer.sources.is_empty() {
        println!();
        println!("Sources: {}", answer.sources.join(", "));
    }
    Ok(())
}

// ─── Access ──────────────────────────────────────────────────────────────────

fn cmd_access(config: &CadenceConfig, args: &CallerArgs) -> Result<()> {
    let (gateway, caller) = open(config, args)?;
    let grant = gateway.permissions(&caller)?;

    let roles = caller.roles.tags();
    println!(
        "Roles: {}",
        if roles.is_empty() {
            "(none)".to_string()
        } else {
            roles.join(", ")
        }
    );
    println!(
        "Tiers: {}",
        grant
            .tiers
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let flags = [
        ("view all courses", grant.can_view_all_courses),
        ("view students", grant.can_view_students),
        ("manage courses", grant.can_manage_courses),
        ("view analytics", grant.can_view_analytics),
        ("manage users", grant.can_manage_users),
        ("configure integrations", grant.can_configure_integrations),
        ("view own progress", grant.can_view_own_progress),
    ];
    for (label, allowed) in flags {
        println!("  {} {}", if allowed { "✓" } else { "✗" }, label);
    }
    Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(
    config: &CadenceConfig,
    transport: Transport,
    owner: Option<String>,
    roles: &str,
    socket: Option<std::path::PathBuf>,
) -> Result<()> {
    match transport {
        Transport::Stdio => {
            let owner = owner.ok_or_else(|| {
                CadenceError::Validation(
                    "--owner is required for the stdio transport".to_string(),
                )
            })?;
            let caller = Caller::new(&owner, RoleSet::from_csv(roles))?;
            let gateway = Arc::new(Gateway::open(config)?);

            tracing::info!(owner = %caller.owner_id, "Starting Cadence MCP server (stdio)");
            let server = CadenceServer::new(gateway, caller);

            use rmcp::ServiceExt;
            let service = server
                .serve(rmcp::transport::stdio())
                .await
                .map_err(|e| CadenceError::Io(std::io::Error::other(format!("MCP server error: {}", e))))?;

            service
                .waiting()
                .await
                .map_err(|e| CadenceError::Io(std::io::Error::other(format!("MCP server error: {}", e))))?;
        }
        Transport::Uds => {
            let gateway = Arc::new(Gateway::open(config)?);
            let socket_path = socket.unwrap_or_else(|| config.socket_path());
            println!("Starting Cadence UDS server at {}...", socket_path.display());

            UdsServer::new(gateway, socket_path).run().await?;
        }
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn open(config: &CadenceConfig, args: &CallerArgs) -> Result<(Gateway, Caller)> {
    let caller = Caller::new(&args.owner, RoleSet::from_csv(&args.roles))?;
    let source = config.secret_source();
    if !source.is_present()? {
        return Err(CadenceError::Validation(format!(
            "Cadence is not initialized ({} has no master secret). Run `cadence init` first.",
            source.describe()
        )));
    }
    Ok((Gateway::open(config)?, caller))
}

fn read_secret_from_stdin() -> Result<Zeroizing<String>> {
    eprint!("Secret: ");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']);
    Ok(Zeroizing::new(trimmed.to_string()))
}
