// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::op::{OpContext, SavedSession};
use cli::{
    args::Args, op::Op, Daemon, File, Health, Init, Login, Logout, Namespace, Permission, Reset,
    User, Version,
};
use gfhs_daemon::access::Credentials;

command_enum! {
    (Daemon, Daemon),
    (File, File),
    (Health, Health),
    (Init, Init),
    (Login, Login),
    (Logout, Logout),
    (Namespace, Namespace),
    (Permission, Permission),
    (Reset, Reset),
    (User, User),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Resolve remote URL: explicit flag > config listen address > default
    let remote = cli::op::resolve_remote(args.remote, args.config_path.clone());

    // Credentials: explicit flags > session saved by `gfhs login`
    let credentials = match (args.auth_user, args.auth_token) {
        (Some(user), Some(token)) => Some(Credentials::new(user, token)),
        _ => SavedSession::load(args.config_path.clone())
            .map(|session| Credentials::new(session.user, session.token)),
    };

    let ctx = match OpContext::new(remote, args.config_path, credentials) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
