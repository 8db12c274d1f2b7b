use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::store::TargetColumn;

#[derive(Parser, Debug)]
#[command(
    name = "ayah-sync",
    version,
    about = "Sync verse translations from a JSON export into the local SQLite store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Update(UpdateArgs),
    Verify(VerifyArgs),
    Status(StatusArgs),
}

/// Table and column names shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    #[arg(long, default_value = "ayah")]
    pub table: String,

    #[arg(long, default_value = "id")]
    pub id_column: String,

    #[arg(long, default_value = "text_english")]
    pub text_column: String,
}

impl TargetArgs {
    pub fn to_target(&self) -> anyhow::Result<TargetColumn> {
        TargetColumn::new(&self.table, &self.id_column, &self.text_column)
    }
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[arg(long, default_value = "assets/data/quran-english.json")]
    pub json_path: PathBuf,

    #[arg(long, default_value = "assets/data/quran.db")]
    pub db_path: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Roll back when a verse id matches no row.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[arg(long, default_value = "assets/data/quran.db")]
    pub db_path: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, default_value_t = 1)]
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "assets/data/quran.db")]
    pub db_path: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}
