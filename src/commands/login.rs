use anyhow::{bail, Context as _, Result};
use serde_json::json;
use tracing::info;

use ultraload_auth::{load_private_key, JwtAuth, LoginProfile};

use super::{CommandOutput, Context};
use crate::cli::LoginArgs;

pub async fn run(args: &LoginArgs, ctx: &Context) -> Result<CommandOutput> {
    let profile = args
        .json_credential_file
        .as_deref()
        .map(LoginProfile::from_file)
        .transpose()
        .context("error while loading credentials")?;

    let username = args
        .username
        .clone()
        .or_else(|| profile.as_ref().map(|p| p.username.clone()));
    let consumer_id = args
        .consumer_id
        .clone()
        .or_else(|| profile.as_ref().map(|p| p.consumer_id.clone()));
    let environment = args.environment.or(profile.as_ref().map(|p| p.environment));

    let (Some(username), Some(consumer_id), Some(environment)) = (username, consumer_id, environment)
    else {
        bail!("username, consumer id and environment are required, as arguments or in --json-credential-file");
    };

    let private_key = match profile.as_ref().and_then(|p| p.private_key.clone()) {
        Some(inline) => inline.into_bytes(),
        None => load_private_key(args.private_key.as_deref())
            .context("error while loading the private key")?,
    };

    let login_url = args
        .login_url
        .as_deref()
        .unwrap_or_else(|| environment.login_url());

    let login = JwtAuth::new(&consumer_id, &username, private_key)
        .authenticate(login_url)
        .await
        .context("error while authenticating, double-check your credentials")?;

    let stored = login.into_stored(consumer_id, environment);

    if args.json_out {
        return CommandOutput::ok(&stored);
    }

    ctx.store
        .save(&stored)
        .context("could not save the credential")?;
    info!(username = %stored.username, "Credential saved");

    CommandOutput::ok(json!({
        "status": "saved",
        "username": stored.username,
        "instance_url": stored.instance_url,
    }))
}
