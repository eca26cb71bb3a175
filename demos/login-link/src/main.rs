//! Walkthrough of a magic-link login with short clocks.
//!
//! Run with `cargo run -p login-link`, optionally passing a JSON config
//! file. `RUST_LOG=debug` shows every clock firing.

use std::time::Duration;

use latchkey::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Demo config
// ---------------------------------------------------------------------------

/// Short clocks so the whole lifecycle plays out in a few seconds.
const DEMO_CONFIG: &str = r#"{
    "logout_after_secs": 2,
    "login_key_expires_after_secs": 3,
    "delete_after_secs": 4
}"#;

fn load_config() -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEMO_CONFIG.to_string(),
    };
    Ok(latchkey::config::from_json(&text)?)
}

/// The link a real app would email. The session key rides in the cookie,
/// so only the login key goes in the URL.
fn login_link(base_url: &str, login_key: &str) -> String {
    format!("{}/login?key={login_key}", base_url.trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let sessions = SessionManager::new(config.clone())?;

    // Audit log: one observer for every session.
    let mut events = sessions.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(
                kind = ?event.kind,
                session = event.session.key().short(),
                "audit"
            );
        }
    });

    // 1. First visit: anonymous session, key goes in a cookie.
    let session = sessions.create_session().await?;
    let cookie = session.key().clone();

    // 2. Visitor types an email address; we send them a link.
    let login_key = session.issue_login_key("me@example.com").await?;
    let link = login_link("https://example.com/", &login_key);
    tracing::info!(user = "me@example.com", "login link sent");

    // 3. They click it: find the session by cookie, pull the key from the URL.
    let clicked = sessions
        .get_session(cookie.as_str())
        .await?
        .ok_or("session vanished")?;
    let presented = link
        .rsplit_once("key=")
        .map(|(_, key)| key)
        .unwrap_or_default();
    clicked.attempt_login(presented).await?;
    let user = clicked.user_id().await?;
    let logged_in = clicked.is_logged_in().await?;
    tracing::info!(?user, logged_in, "link clicked");

    // 4. They wander off; the logout clock fires first.
    tokio::time::sleep(config.logout_after() + Duration::from_millis(500)).await;
    let logged_in = clicked.is_logged_in().await?;
    tracing::info!(logged_in, "after idling");

    // 5. Much later the deletion clock removes the session entirely.
    tokio::time::sleep(config.delete_after()).await;
    let found = sessions.get_session(cookie.as_str()).await?;
    tracing::info!(found = found.is_some(), "after the deletion window");

    sessions.shutdown().await?;
    Ok(())
}
