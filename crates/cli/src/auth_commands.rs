use std::io::{BufRead, Write};

use {
    anyhow::Result,
    clap::Subcommand,
    secrecy::Secret,
    tollgate_oauth::{
        OAuth2Credentials, OAuthFlow, TokenStatus, TokenStore, account_namespace,
        lifecycle::now_secs, tool_namespace,
    },
};

use crate::config::Config;

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8976";

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the OAuth client registration for a provider (shared by all accounts).
    Setup {
        /// Provider name (e.g. "google").
        #[arg(long)]
        provider: String,
        #[arg(long)]
        client_id: String,
        #[arg(long, env = "TOLLGATE_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
        /// Redirect URI registered with the provider, used by `login --manual`.
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
    /// Log in to a provider via OAuth.
    Login {
        /// Provider name (e.g. "google").
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "default")]
        account: String,
        /// Paste the redirect URL instead of running a local callback listener.
        #[arg(long, default_value_t = false)]
        manual: bool,
    },
    /// Print a valid access token, refreshing it if needed.
    Token {
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Show authentication status for all providers.
    Status {
        #[arg(long, default_value = "default")]
        account: String,
    },
    /// Log out from a provider.
    Logout {
        /// Provider name (e.g. "google").
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "default")]
        account: String,
    },
}

pub async fn handle_auth(action: AuthAction, config: &Config) -> Result<()> {
    let store = TokenStore::new(config.secret_store()?);
    match action {
        AuthAction::Setup {
            provider,
            client_id,
            client_secret,
            redirect_uri,
        } => setup(config, &store, &provider, client_id, client_secret, redirect_uri),
        AuthAction::Login {
            provider,
            account,
            manual,
        } => login(config, &store, &provider, &account, manual).await,
        AuthAction::Token { provider, account } => {
            let flow = OAuthFlow::new(config.provider(&provider)?);
            let token = flow
                .get_valid_access_token(
                    &store,
                    &account_namespace(&provider, &account),
                    Some(&tool_namespace(&provider)),
                )
                .await?;
            println!("{token}");
            Ok(())
        },
        AuthAction::Status { account } => status(config, &store, &account),
        AuthAction::Logout { provider, account } => logout(&store, &provider, &account),
    }
}

fn setup(
    config: &Config,
    store: &TokenStore,
    provider: &str,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
) -> Result<()> {
    config.provider(provider)?;
    store.save_credentials(&tool_namespace(provider), &OAuth2Credentials {
        client_id,
        client_secret: Secret::new(client_secret),
        redirect_uri,
    })?;
    println!("Saved client credentials for {provider}");
    Ok(())
}

async fn login(
    config: &Config,
    store: &TokenStore,
    provider: &str,
    account: &str,
    manual: bool,
) -> Result<()> {
    let flow = OAuthFlow::new(config.provider(provider)?);
    let account_ns = account_namespace(provider, account);
    let credentials_ns = tool_namespace(provider);

    if manual {
        flow.login_manual(store, &account_ns, Some(&credentials_ns), prompt_for_redirect)
            .await?;
    } else {
        flow.login(store, &account_ns, Some(&credentials_ns), |url| {
            println!("Opening browser for authentication...");
            if open::that(url).is_err() {
                println!("Could not open browser. Please visit:\n{url}");
            }
            println!("Waiting for the redirect (up to 2 minutes)...");
        })
        .await?;
    }

    println!("Successfully logged in to {provider} ({account})");
    Ok(())
}

fn prompt_for_redirect(url: &str) -> std::io::Result<String> {
    println!("Open this URL in a browser and approve access:\n\n{url}\n");
    print!("Paste the URL you were redirected to: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn status(config: &Config, store: &TokenStore, account: &str) -> Result<()> {
    let now = now_secs();
    let mut any = false;
    for provider in config.provider_names() {
        if let Some(tokens) = store.load(&account_namespace(&provider, account))? {
            any = true;
            let status = TokenStatus::at(now, tokens.expires_at, None);
            println!("{provider} ({account}) [{status}]");
        }
    }
    if !any {
        println!("No authenticated providers for account {account}.");
    }
    Ok(())
}

fn logout(store: &TokenStore, provider: &str, account: &str) -> Result<()> {
    if store.delete(&account_namespace(provider, account))? {
        println!("Logged out from {provider} ({account})");
    } else {
        println!("Not logged in to {provider} ({account})");
    }
    Ok(())
}
