use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use group_roster::config::{self, RosterConfig};
use group_roster::engine::MembershipEngine;
use group_roster::models::*;
use group_roster::{api, render};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Track students forming project groups")]
struct Cli {
    /// Path to the roster database
    #[arg(long, global = true, env = config::DB_ENV)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register as a student looking for a group
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        email: String,
    },
    /// Found a new group from a roster of `name, student_id` lines
    CreateGroup {
        /// Your student id; must appear on the roster
        #[arg(long)]
        creator: String,
        /// Roster text; read from stdin when omitted
        #[arg(long)]
        members: Option<String>,
        /// Register a partial group (2-3 founders) open for later additions
        #[arg(long)]
        partial: bool,
    },
    /// Add a registered individual to a group
    AddMember {
        #[command(flatten)]
        target: GroupTarget,
        /// Student id of the individual to add
        #[arg(long)]
        student_id: String,
    },
    /// Remove a member from a group and return them to the individuals
    RemoveMember {
        #[command(flatten)]
        target: GroupTarget,
        #[arg(long)]
        student_id: String,
    },
    /// Leave your current group and register as an individual
    Switch {
        #[arg(long)]
        student_id: String,
    },
    /// Delete a group, returning every member to the individuals
    Disband {
        #[command(flatten)]
        target: GroupTarget,
    },
    /// Remove your individual registration
    Withdraw {
        #[arg(long)]
        student_id: String,
    },
    /// Show where a student currently stands
    Status {
        #[arg(long)]
        student_id: String,
    },
    /// Search groups and individuals by name or student id
    Search { term: String },
    /// Show all groups, partial groups and individuals
    Dashboard,
    /// Show headline counts
    Summary,
    /// Print every group member as JSON rows
    Export,
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

/// Identifies a group either by id or by one of its members.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct GroupTarget {
    /// Group id
    #[arg(long)]
    group: Option<Uuid>,
    /// Student id of any member of the group
    #[arg(long = "member-of")]
    member_of: Option<String>,
}

impl GroupTarget {
    fn resolve(&self, engine: &MembershipEngine) -> anyhow::Result<Uuid> {
        if let Some(id) = self.group {
            return Ok(id);
        }
        let student_id = self.member_of.as_deref().unwrap_or_default();
        match engine.student_state(student_id)? {
            StudentState::Grouped { group, .. } => Ok(group.id),
            _ => anyhow::bail!("Student {} is not part of any group", student_id.trim()),
        }
    }
}

/// Log to stderr so command output on stdout stays clean
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(config::log_filter());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_stdin() -> anyhow::Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read roster from stdin")?;
    Ok(text)
}

fn individual_id(engine: &MembershipEngine, student_id: &str) -> anyhow::Result<Uuid> {
    match engine.student_state(student_id)? {
        StudentState::Individual { individual } => Ok(individual.id),
        StudentState::Grouped { .. } => anyhow::bail!("Student {} is already in a group", student_id),
        StudentState::Unregistered => {
            anyhow::bail!("Student {} is not registered as an individual", student_id)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = RosterConfig::resolve(cli.db)?;
    let db = config.open_database()?;
    let engine = MembershipEngine::new(db);

    match cli.command {
        Commands::Register {
            name,
            student_id,
            email,
        } => {
            let individual = engine.register_individual(RegisterIndividualInput {
                name,
                student_id,
                email,
            })?;
            print!("Registered as looking for a group: {}", render::render_individual(&individual));
        }
        Commands::CreateGroup {
            creator,
            members,
            partial,
        } => {
            let roster = match members {
                Some(text) => text,
                None => read_stdin()?,
            };
            let group = engine.create_group(CreateGroupInput {
                creator_id: creator,
                roster,
                partial,
            })?;
            print!("Group created.\n{}", render::render_group(&group));
        }
        Commands::AddMember { target, student_id } => {
            let group_id = target.resolve(&engine)?;
            let individual_id = individual_id(&engine, &student_id)?;
            let group = engine.add_member(group_id, individual_id)?;
            print!("{}", render::render_group(&group));
        }
        Commands::RemoveMember { target, student_id } => {
            let group_id = target.resolve(&engine)?;
            let release = engine.remove_member(group_id, &student_id)?;
            print!(
                "Removed {} and added them back to individuals.\n{}",
                release.individual.name,
                render::render_group(&release.group)
            );
        }
        Commands::Switch { student_id } => {
            let release = engine.switch_group(&student_id)?;
            println!(
                "Left group {} and registered as an individual.",
                release.group.id
            );
        }
        Commands::Disband { target } => {
            let group_id = target.resolve(&engine)?;
            let released = engine.disband_group(group_id)?;
            print!(
                "Disbanded group {}. Released:\n{}",
                group_id,
                render::render_individuals(&released)
            );
        }
        Commands::Withdraw { student_id } => {
            engine.withdraw_individual(&student_id)?;
            println!("Withdrawn.");
        }
        Commands::Status { student_id } => {
            print!("{}", render::render_state(&engine.student_state(&student_id)?));
        }
        Commands::Search { term } => {
            print!("{}", render::render_search(&engine.search(&term)?));
        }
        Commands::Dashboard => {
            print!("{}", render::render_dashboard(&engine.dashboard()?));
        }
        Commands::Summary => {
            print!("{}", render::render_summary(&engine.summary()?));
        }
        Commands::Export => {
            println!("{}", serde_json::to_string_pretty(&engine.export_rows()?)?);
        }
        Commands::Serve { port } => {
            let app = api::create_router(engine);

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("Roster server listening on http://127.0.0.1:{}", port);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
