use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use reqwest::Method;

use crate::auth::{FileSystemCredentialStore, LoginRedirect};
use crate::client::Client;
use crate::config::Config;
use crate::http::ReqwestHttpClient;

pub mod api;
pub mod auth;
pub mod client;
pub mod cmd;
pub mod config;
pub mod error;
pub mod http;
pub mod log;

#[cfg(test)]
pub(crate) mod testing;

pub async fn run(raw_input: Vec<String>, redirect: Arc<dyn LoginRedirect>) -> Result<String> {
    let matches = cmd::cmd().get_matches_from(raw_input);

    let config_path = matches.get_one::<String>(cmd::CONFIG_OPTION).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Using API at {}", config.base_url);

    let http_client = Arc::new(ReqwestHttpClient::new(config.timeout())?);
    let store = FileSystemCredentialStore::new(config.profile_path.clone());
    let client = Client::from_config(&config, http_client, store, redirect)?;

    execute(&client, &config, &matches).await
}

async fn execute(client: &Client, config: &Config, matches: &ArgMatches) -> Result<String> {
    let auth_api = api::AuthApi::new(client, config);
    match matches.subcommand() {
        Some(("login", matches)) => {
            let username = required(matches, "username")?;
            let password = required(matches, "password")?;
            let session = auth_api.login(username, password).await?;
            Ok(match session.user {
                Some(user) => serde_json::to_string_pretty(&user)?,
                None => format!("Logged in as {username}"),
            })
        }
        Some(("logout", _)) => {
            auth_api.logout().await?;
            Ok("Logged out".to_string())
        }
        Some(("whoami", _)) => {
            let user = auth_api.me().await?;
            Ok(serde_json::to_string_pretty(&user)?)
        }
        Some(("api", matches)) => {
            let method = required(matches, "method")?;
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("parsing the HTTP method {method}"))?;
            let path = required(matches, "path")?;
            let query: Vec<String> = matches
                .get_many::<String>("query")
                .map(|q| q.cloned().collect())
                .unwrap_or_default();
            let query = cmd::parse_query(&query)?;
            let body = matches
                .get_one::<String>("data")
                .map(|d| serde_json::from_str::<serde_json::Value>(d))
                .transpose()
                .context("parsing --data as JSON")?;
            let value = client.call(method, path, &query, body.as_ref()).await?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        _ => unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`"),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!(r#"missing "{name}""#))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialStore, MemoryCredentialStore, NoopLoginRedirect, Session};
    use crate::testing::{FakeBackend, json_response};
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_api_subcommand_refreshes_transparently() {
        let backend = FakeBackend::new();
        backend.on_refresh(|_| {
            json_response(StatusCode::OK, serde_json::json!({"access_token": "new"}))
        });
        backend.accept_token("new");
        let store = MemoryCredentialStore::new(Some(Session::new(
            "old".to_string(),
            "r".to_string(),
            None,
        )));
        let config = Config {
            base_url: backend.base(),
            ..Config::default()
        };
        let client = Client::from_config(
            &config,
            backend.clone(),
            store.clone(),
            Arc::new(NoopLoginRedirect),
        )
        .unwrap();

        let matches = cmd::cmd()
            .try_get_matches_from([
                "schoolhub",
                "api",
                "get",
                "classrooms/4/roster",
                "-q",
                "active=true",
            ])
            .unwrap();
        let out = execute(&client, &config, &matches).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["path"], "/classrooms/4/roster");
        assert_eq!(value["token"], "new");
        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("new"));
    }
}
