use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::models::{DayOfWeek, MaritalStatus};

#[derive(Parser)]
#[command(
    name = "crisma",
    about = "Manage confirmation-class participants, catechists and groups",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a bearer token in the system keychain
    Login(LoginArgs),
    /// Forget the stored token
    Logout,
    /// Show the current session
    Whoami,
    /// Show dashboard statistics
    Stats,
    /// Participant (confirmand) records
    #[command(subcommand)]
    Participants(ParticipantsCmd),
    /// Catechist records
    #[command(subcommand)]
    Catechists(CatechistsCmd),
    /// Meeting groups and their members
    #[command(subcommand)]
    Groups(GroupsCmd),
}

#[derive(Args)]
pub struct LoginArgs {
    /// Token issued by the identity provider (read from stdin when omitted)
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Case-insensitive substring filter on the name
    #[arg(short, long)]
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ParticipantsCmd {
    /// List participants sorted by name
    List(SearchArgs),
    /// Show profile, group history and sacrament checklist
    Show { id: i64 },
    /// Add a participant
    Add(ParticipantArgs),
    /// Edit a participant; omitted fields keep their current value
    Edit {
        id: i64,
        #[command(flatten)]
        fields: ParticipantEditArgs,
    },
    /// Permanently delete a participant
    Delete { id: i64 },
    /// Bulk import a tab-separated export
    Import(ImportArgs),
    /// Mark a sacrament as completed (or not, with --undo)
    Sacrament(SacramentArgs),
}

#[derive(Args)]
pub struct ParticipantArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    /// Birth date as YYYY-MM-DD
    #[arg(long)]
    pub birth_date: NaiveDate,
    #[arg(long)]
    pub address: String,
    #[arg(long, default_value = "Single")]
    pub marital_status: MaritalStatus,
    #[command(flatten)]
    pub family: FamilyArgs,
}

#[derive(Args)]
pub struct ParticipantEditArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub birth_date: Option<NaiveDate>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub marital_status: Option<MaritalStatus>,
    #[command(flatten)]
    pub family: FamilyArgs,
}

#[derive(Args)]
pub struct FamilyArgs {
    #[arg(long)]
    pub father_name: Option<String>,
    #[arg(long)]
    pub mother_name: Option<String>,
    #[arg(long)]
    pub baptism_church: Option<String>,
    #[arg(long)]
    pub communion_church: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// TSV file with a header row
    pub file: PathBuf,
    /// Check the file locally without sending it
    #[arg(long)]
    pub preview: bool,
}

#[derive(Args)]
pub struct SacramentArgs {
    /// Participant id
    pub id: i64,
    /// Sacrament id or name
    pub sacrament: String,
    /// Mark as not completed
    #[arg(long)]
    pub undo: bool,
}

// ---------------------------------------------------------------------------
// Catechists
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum CatechistsCmd {
    /// List catechists sorted by name
    List(SearchArgs),
    /// Show a catechist and the groups they led
    Show { id: i64 },
    /// Add a catechist
    Add {
        name: String,
        /// Record as not currently active
        #[arg(long)]
        inactive: bool,
    },
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum GroupsCmd {
    /// List groups
    List(SearchArgs),
    /// Show a group and its members
    Show { id: i64 },
    /// Create a group
    Add(GroupArgs),
    /// Add a participant to a group
    AddMember {
        group_id: i64,
        /// Participant id or name
        participant: String,
    },
    /// Remove a participant from a group
    RemoveMember {
        group_id: i64,
        /// Participant id or name
        participant: String,
    },
}

#[derive(Args)]
pub struct GroupArgs {
    #[arg(long)]
    pub module: i16,
    /// Catechist id or name
    #[arg(long)]
    pub catechist: Option<String>,
    #[arg(long)]
    pub day: DayOfWeek,
    /// Start date as YYYY-MM-DD
    #[arg(long)]
    pub start: NaiveDate,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub link: Option<String>,
}
