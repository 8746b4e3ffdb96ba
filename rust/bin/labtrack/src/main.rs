//! `labtrack`: the LabTrack CLI client.
//!
//! Manages contexts, authentication, lab resources and workflows.

mod commands;
mod config;

use clap::{Parser, Subcommand};

/// LabTrack CLI tool.
#[derive(Parser, Debug)]
#[command(name = "labtrack", about = "LabTrack CLI client")]
struct Cli {
    /// Path to client config file (default: ~/.labtrack/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage contexts (server connections).
    #[command(name = "context")]
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Switch the current context.
    #[command(name = "use")]
    Use {
        #[command(subcommand)]
        what: UseWhat,
    },

    /// Root account management.
    Root {
        #[command(subcommand)]
        action: RootAction,
    },

    /// Login to the current context's server.
    Login {
        /// Email, or `root` for the bootstrap admin.
        #[arg(long)]
        email: Option<String>,
        /// Password (not recommended; use the interactive prompt).
        #[arg(long)]
        password: Option<String>,
    },

    /// Clear the token from the current context.
    Logout,

    /// Get resource(s).
    Get {
        /// Resource type (labs, assets, transfers, lab-issues, asset-issues,
        /// profiles, activity, notifications).
        resource: String,
        /// Optional resource ID for single get.
        id: Option<String>,
        /// Filter as key=value (repeatable), e.g. `--filter status=pending`.
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,
        /// Free-text search.
        #[arg(long = "search", short = 'q')]
        search: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },

    /// Create a resource.
    Create {
        resource: String,
        /// JSON body.
        #[arg(long = "json")]
        json_body: Option<String>,
        /// Read JSON from file.
        #[arg(short = 'f', long = "file")]
        file: Option<String>,
    },

    /// Update a resource (PATCH).
    Update {
        resource: String,
        id: String,
        /// JSON merge patch.
        #[arg(long = "json")]
        json_body: String,
    },

    /// Delete a resource.
    Delete {
        resource: String,
        id: String,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Record an approval on an asset.
    Approve {
        /// Asset record id.
        asset: String,
        /// Slot an admin approves as: hod or lab_incharge.
        #[arg(long = "as")]
        slot: Option<String>,
    },

    /// Receive a pending transfer into its destination lab.
    Receive {
        transfer: String,
    },

    /// Move an issue to a new status.
    #[command(name = "issue-status")]
    IssueStatus {
        /// lab or asset.
        kind: String,
        id: String,
        /// open, in_progress, resolved or closed.
        status: String,
        #[arg(long)]
        resolution: Option<String>,
    },

    /// List your notifications.
    Notifications {
        #[arg(long)]
        unread: bool,
    },

    /// Mark notifications as read.
    Read {
        /// Notification id.
        id: Option<String>,
        /// Mark every notification read.
        #[arg(long)]
        all: bool,
    },

    /// Activity statistics.
    Stats {
        /// Window in days (default 30).
        #[arg(long)]
        days: Option<u32>,
    },

    /// Check whether a user may perform an action on a lab.
    Can {
        lab: String,
        /// read, create, update, delete, approve or receive.
        action: String,
        /// Profile id to check (default: yourself).
        #[arg(long)]
        user: Option<String>,
    },

    /// Follow the change feed.
    Watch {
        /// Resume after this sequence number.
        #[arg(long)]
        since: Option<u64>,
    },

    /// Show or set the table theme (light or dark).
    Theme {
        value: Option<String>,
    },

    /// Check server status.
    Status,

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ContextAction {
    /// Create a local deployment: server config, data dir and context.
    Create {
        name: String,
        /// Server config directory.
        #[arg(long, default_value = "/etc/labtrack")]
        config_dir: String,
        /// Data directory (default: /var/lib/labtrack/<name>).
        #[arg(long)]
        data_dir: Option<String>,
        /// Listen address written to the server config.
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
        /// Root password (non-interactive, for CI/automation).
        #[arg(long)]
        password: Option<String>,
    },
    /// List all contexts.
    List,
    /// Set properties on a context (creates it if missing).
    Set {
        name: String,
        #[arg(long)]
        server: Option<String>,
    },
    /// Delete a context.
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum UseWhat {
    /// Switch to a context.
    Context { name: String },
}

#[derive(Subcommand, Debug)]
enum RootAction {
    /// Change root password.
    Chpwd {
        /// Target context (default: current).
        #[arg(long)]
        context: Option<String>,
    },
}

fn prompt_line(label: &str) -> anyhow::Result<String> {
    eprint!("{}", label);
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

fn prompt_new_password(label: &str) -> anyhow::Result<String> {
    let pw = rpassword::prompt_password(format!("{}: ", label))?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if pw != confirm {
        anyhow::bail!("Passwords do not match.");
    }
    if pw.is_empty() {
        anyhow::bail!("Password cannot be empty.");
    }
    Ok(pw)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);
    let json_output = cli.output == "json";

    match cli.command {
        Commands::Context { action } => match action {
            ContextAction::Create {
                name,
                config_dir,
                data_dir,
                listen,
                password,
            } => {
                let data_dir = data_dir.unwrap_or_else(|| format!("/var/lib/labtrack/{}", name));
                let password = match password {
                    Some(p) if p.is_empty() => anyhow::bail!("Password cannot be empty."),
                    Some(p) => p,
                    None => prompt_new_password("Enter root password")?,
                };
                commands::context::create(
                    &name,
                    &config_dir,
                    &data_dir,
                    &listen,
                    &password,
                    &config_path,
                )?;
            }
            ContextAction::List => commands::context::list(&config_path)?,
            ContextAction::Set { name, server } => {
                commands::context::set(&name, server.as_deref(), &config_path)?;
            }
            ContextAction::Delete { name } => commands::context::delete(&name, &config_path)?,
        },

        Commands::Use { what } => match what {
            UseWhat::Context { name } => commands::context::use_context(&name, &config_path)?,
        },

        Commands::Root { action } => match action {
            RootAction::Chpwd { context } => {
                let old = rpassword::prompt_password("Current root password: ")?;
                let new = prompt_new_password("New root password")?;
                commands::root::chpwd(context.as_deref(), &old, &new, &config_path)?;
            }
        },

        Commands::Login { email, password } => {
            let email = match email {
                Some(e) => e,
                None => prompt_line("Email: ")?,
            };
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")?,
            };
            commands::login::login(&email, &password, &config_path)?;
        }

        Commands::Logout => commands::login::logout(&config_path)?,

        Commands::Get {
            resource,
            id,
            filters,
            search,
            limit,
            offset,
        } => {
            let query = commands::resource::list_query(&filters, search.as_deref(), limit, offset)?;
            commands::resource::get(&resource, id.as_deref(), json_output, &query, &config_path)?;
        }

        Commands::Create {
            resource,
            json_body,
            file,
        } => {
            let body = if let Some(path) = file {
                std::fs::read_to_string(&path)?
            } else if let Some(json) = json_body {
                json
            } else {
                anyhow::bail!("Provide --json or -f <file>.");
            };
            commands::resource::create(&resource, &body, &config_path)?;
        }

        Commands::Update {
            resource,
            id,
            json_body,
        } => commands::resource::update(&resource, &id, &json_body, &config_path)?,

        Commands::Delete { resource, id, yes } => {
            if !yes {
                let answer = prompt_line("Are you sure? [y/N]: ")?;
                if !answer.eq_ignore_ascii_case("y") {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            commands::resource::delete(&resource, &id, &config_path)?;
        }

        Commands::Approve { asset, slot } => {
            commands::workflow::approve(&asset, slot.as_deref(), &config_path)?;
        }

        Commands::Receive { transfer } => commands::workflow::receive(&transfer, &config_path)?,

        Commands::IssueStatus {
            kind,
            id,
            status,
            resolution,
        } => commands::workflow::issue_status(
            &kind,
            &id,
            &status,
            resolution.as_deref(),
            &config_path,
        )?,

        Commands::Notifications { unread } => {
            commands::workflow::notifications(unread, json_output, &config_path)?;
        }

        Commands::Read { id, all } => commands::workflow::read(id.as_deref(), all, &config_path)?,

        Commands::Stats { days } => commands::workflow::stats(days, json_output, &config_path)?,

        Commands::Can { lab, action, user } => {
            commands::workflow::can(&lab, &action, user.as_deref(), &config_path)?;
        }

        Commands::Watch { since } => commands::watch::watch(since, &config_path)?,

        Commands::Theme { value } => commands::context::theme(value.as_deref(), &config_path)?,

        Commands::Status => commands::resource::status(&config_path)?,

        Commands::Version => println!("labtrack cli v{}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}
