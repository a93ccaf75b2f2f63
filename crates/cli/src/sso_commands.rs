use {
    anyhow::{Context, Result},
    clap::Subcommand,
    secrecy::Secret,
    tollgate_sso::{OAuth1Token, SsoLoginFlow, flow::parse_oauth1_import},
};

use crate::config::Config;

#[derive(Subcommand)]
pub enum SsoAction {
    /// Log in with username and password (no MFA).
    Login {
        #[arg(long)]
        username: String,
        /// Prompted for (without echo) when omitted.
        #[arg(long, env = "TOLLGATE_SSO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Import an OAuth1 token obtained elsewhere, e.g. for an MFA-protected account.
    Import {
        #[arg(long, required_unless_present = "body", requires = "token_secret")]
        token: Option<String>,
        #[arg(long, env = "TOLLGATE_SSO_TOKEN_SECRET", hide_env_values = true)]
        token_secret: Option<String>,
        /// Raw `oauth_token=..&oauth_token_secret=..` response body.
        #[arg(long, conflicts_with = "token")]
        body: Option<String>,
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Print a valid access token, refreshing it if needed.
    Token {
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Show the account's display name and profile id.
    Whoami {
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Show token status.
    Status {
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Remove stored tokens and cached profile values.
    Logout {
        #[arg(long, default_value = "default")]
        account: String,
    },
}

pub async fn handle_sso(action: SsoAction, config: &Config) -> Result<()> {
    let secrets = config.secret_store()?;
    let flow = |account: &str| SsoLoginFlow::new(config.sso.clone(), secrets.clone(), account);

    match action {
        SsoAction::Login {
            username,
            password,
            account,
        } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            flow(&account)?
                .login(&username, &Secret::new(password))
                .await?;
            println!("Successfully logged in as {username} ({account})");
        },
        SsoAction::Import {
            token,
            token_secret,
            body,
            account,
        } => {
            let oauth1 = match (body, token, token_secret) {
                (Some(body), ..) => parse_oauth1_import(&body)
                    .context("body must contain oauth_token and oauth_token_secret")?,
                (None, Some(token), Some(token_secret)) => OAuth1Token {
                    token,
                    token_secret,
                },
                _ => anyhow::bail!("pass --token and --token-secret, or --body"),
            };
            flow(&account)?.import_oauth1(oauth1).await?;
            println!("Imported tokens for {account}");
        },
        SsoAction::Token { account } => {
            println!("{}", flow(&account)?.get_valid_access_token().await?);
        },
        SsoAction::Whoami { account } => {
            let profile = flow(&account)?.profile().await?;
            println!("{} (profile {})", profile.display_name, profile.profile_pk);
        },
        SsoAction::Status { account } => match flow(&account)?.status()? {
            Some(status) => println!("sso ({account}) [{status}]"),
            None => println!("Not logged in ({account})."),
        },
        SsoAction::Logout { account } => {
            if flow(&account)?.logout()? {
                println!("Logged out ({account})");
            } else {
                println!("Not logged in ({account})");
            }
        },
    }
    Ok(())
}

fn read_password() -> Result<String> {
    let password =
        rpassword::prompt_password("Password: ").context("failed to read password")?;
    non_empty_password(password)
}

fn non_empty_password(password: String) -> Result<String> {
    anyhow::ensure!(!password.is_empty(), "no password given");
    Ok(password)
}
