pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "gfhs")]
#[command(about = "Multi-tenant file hosting with layered namespace permissions")]
pub struct Args {
    /// Server URL, including any path prefix (defaults to the local config)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the gfhs config directory (defaults to ~/.gfhs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Account to act as; pair with --auth-token (defaults to the saved session)
    #[arg(long, global = true, requires = "auth_token")]
    pub auth_user: Option<String>,

    /// Session token for --auth-user
    #[arg(long, global = true, requires = "auth_user")]
    pub auth_token: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
