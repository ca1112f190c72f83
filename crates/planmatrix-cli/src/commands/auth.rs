//! Google authentication commands.

use clap::Subcommand;

use planmatrix_core::auth::GoogleAuth;

#[derive(Subcommand)]
pub enum AuthOp {
    /// Authenticate with Google (opens a browser)
    Login {
        /// OAuth client ID; stored in the OS keyring when given
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth client secret; stored in the OS keyring when given
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Remove stored tokens
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthOp) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthOp::Login {
            client_id,
            client_secret,
        } => {
            if let (Some(id), Some(secret)) = (&client_id, &client_secret) {
                GoogleAuth::set_credentials(id, secret)?;
                println!("Client credentials stored.");
            }

            let runtime = tokio::runtime::Runtime::new()?;
            let _guard = runtime.enter();

            let auth = GoogleAuth::new();
            auth.authenticate()?;
            println!("Authenticated with Google.");
        }
        AuthOp::Logout => {
            GoogleAuth::new().disconnect()?;
            println!("Google tokens removed.");
        }
        AuthOp::Status => {
            if GoogleAuth::new().is_authenticated() {
                println!("google: authenticated");
            } else {
                println!("google: not authenticated");
                println!("Run `planmatrix auth login --client-id ... --client-secret ...`");
            }
        }
    }
    Ok(())
}
