//! Single-use localhost listener that captures the OAuth2 redirect.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::{Query, State},
        response::Html,
    },
    tokio::{
        net::TcpListener,
        sync::{Mutex, oneshot},
    },
    tracing::{debug, warn},
};

use crate::error::{AuthError, Result};

/// How long to wait for the browser redirect.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const DONE_PAGE: &str = "<!DOCTYPE html><html><body><h2>Login complete</h2>\
<p>You can close this tab and return to the terminal.</p></body></html>";

const FAILED_PAGE: &str = "<!DOCTYPE html><html><body><h2>Login failed</h2>\
<p>Return to the terminal for details.</p></body></html>";

const WAITING_PAGE: &str = "<!DOCTYPE html><html><body><h2>Waiting for authorization...</h2>\
</body></html>";

/// Authorization code delivered to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackCode {
    pub code: String,
    /// Redirect URI the code was issued for; the token request must repeat it.
    pub redirect_uri: String,
}

/// Shared between the request handler and [`CallbackServer::wait_for_code`].
struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

impl CallbackState {
    /// Resolve the flow on the first request carrying `error` or `code`.
    /// Later requests, and requests carrying neither, only get the waiting page.
    async fn handle(&self, params: &HashMap<String, String>) -> Html<&'static str> {
        let outcome = if let Some(error) = params.get("error") {
            let detail = match params.get("error_description") {
                Some(desc) => format!("{error}: {desc}"),
                None => error.clone(),
            };
            Err(AuthError::CallbackError(detail))
        } else if let Some(code) = params.get("code") {
            match params.get("state") {
                Some(state) if *state == self.expected_state => Ok(code.clone()),
                _ => Err(AuthError::StateMismatch),
            }
        } else {
            return Html(WAITING_PAGE);
        };

        let Some(sender) = self.sender.lock().await.take() else {
            debug!("ignoring callback request after the flow resolved");
            return Html(WAITING_PAGE);
        };

        let page = if outcome.is_ok() {
            DONE_PAGE
        } else {
            FAILED_PAGE
        };
        if sender.send(outcome).is_err() {
            warn!("callback arrived after the listener stopped waiting");
        }
        Html(page)
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    state.handle(&params).await
}

/// Ephemeral listener bound to `127.0.0.1:<os-assigned port>`.
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
    expected_state: String,
    timeout: Duration,
}

impl CallbackServer {
    pub async fn bind(expected_state: &str) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        debug!(port, "OAuth callback listener bound");
        Ok(Self {
            listener,
            port,
            expected_state: expected_state.to_string(),
            timeout: CALLBACK_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The dynamic redirect URI to register with the authorize request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Serve until one callback resolves the flow or the timeout fires.
    /// The port is released before this returns, whatever the outcome.
    pub async fn wait_for_code(self) -> Result<CallbackCode> {
        let redirect_uri = self.redirect_uri();
        let Self {
            listener,
            port,
            expected_state,
            timeout,
        } = self;
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected_state,
            sender: Mutex::new(Some(tx)),
        });
        let app = Router::new().fallback(handle_callback).with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let result = tokio::time::timeout(timeout, rx).await;

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(Duration::from_secs(5), &mut server)
            .await
            .is_err()
        {
            server.abort();
        }
        debug!(port, "OAuth callback listener stopped");

        match result {
            Err(_) => Err(AuthError::Timeout(timeout.as_secs())),
            Ok(Err(_)) => Err(AuthError::CallbackError(
                "callback listener closed before a redirect arrived".into(),
            )),
            Ok(Ok(outcome)) => outcome.map(|code| CallbackCode { code, redirect_uri }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn callback_state(expected: &str) -> (CallbackState, oneshot::Receiver<Result<String>>) {
        let (tx, rx) = oneshot::channel();
        (
            CallbackState {
                expected_state: expected.into(),
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_resolves_exactly_once() {
        let (state, rx) = callback_state("s1");

        let page = state.handle(&params(&[("code", "first"), ("state", "s1")])).await;
        assert_eq!(page.0, DONE_PAGE);
        let page = state.handle(&params(&[("code", "second"), ("state", "s1")])).await;
        assert_eq!(page.0, WAITING_PAGE);

        assert_eq!(rx.await.unwrap().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_state_mismatch_never_succeeds() {
        let (state, rx) = callback_state("expected");
        state
            .handle(&params(&[("code", "c"), ("state", "forged")]))
            .await;
        assert!(matches!(rx.await.unwrap(), Err(AuthError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_missing_state_is_mismatch() {
        let (state, rx) = callback_state("expected");
        state.handle(&params(&[("code", "c")])).await;
        assert!(matches!(rx.await.unwrap(), Err(AuthError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_error_param_resolves_with_description() {
        let (state, rx) = callback_state("s");
        let page = state
            .handle(&params(&[
                ("error", "access_denied"),
                ("error_description", "user said no"),
            ]))
            .await;
        assert_eq!(page.0, FAILED_PAGE);
        match rx.await.unwrap() {
            Err(AuthError::CallbackError(msg)) => assert_eq!(msg, "access_denied: user said no"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrelated_request_does_not_resolve() {
        let (state, mut rx) = callback_state("s");
        let page = state.handle(&HashMap::new()).await;
        assert_eq!(page.0, WAITING_PAGE);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_listener_end_to_end() {
        let server = CallbackServer::bind("abc").await.unwrap();
        let port = server.port();
        assert_eq!(server.redirect_uri(), format!("http://localhost:{port}"));
        let waiter = tokio::spawn(server.wait_for_code());

        let client = reqwest::Client::new();
        let favicon = client
            .get(format!("http://127.0.0.1:{port}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert!(favicon.text().await.unwrap().contains("Waiting"));

        let resp = client
            .get(format!("http://127.0.0.1:{port}/?code=the-code&state=abc"))
            .send()
            .await
            .unwrap();
        assert!(resp.text().await.unwrap().contains("Login complete"));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.code, "the-code");
        assert_eq!(got.redirect_uri, format!("http://localhost:{port}"));

        // Port is released once the flow resolves.
        TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_times_out_and_releases_port() {
        let server = CallbackServer::bind("abc")
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let port = server.port();

        let err = server.wait_for_code().await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout(0)));
        TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    }
}
