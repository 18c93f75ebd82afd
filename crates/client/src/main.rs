//! `findesk`: inspect and drive the persisted client session from a terminal.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::json;

use findesk_client::{ClientConfig, ClientContext, NoopNavigator};
use findesk_core::OrganizationId;

const USAGE: &str = "usage: findesk <login <email> <password> | whoami | orgs | switch <org-id> | refresh | logout>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    findesk_observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ClientConfig::from_env();
    let ctx = ClientContext::from_config(config, Arc::new(NoopNavigator))?;

    let output = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["login", email, password] => {
            let session = ctx.session().login(email, password).await?;
            json!({
                "authenticated": session.is_authenticated(),
                "user": session.user_profile,
                "organization": ctx.orgs().selected(),
            })
        }
        ["whoami"] => json!({
            "status": format!("{:?}", ctx.session().status()),
            "token_expired": ctx.session().is_token_expired(),
            "user": ctx.session().user_profile(),
        }),
        ["orgs"] => {
            let snapshot = ctx.orgs().snapshot();
            json!({
                "selected": snapshot.selected.map(|o| o.id),
                "organizations": snapshot.organizations,
            })
        }
        ["switch", id] => {
            let id: OrganizationId = id.parse().context("invalid organization id")?;
            if !ctx.orgs().switch_org(id) {
                bail!("not a member of organization {id}");
            }
            json!({ "selected": ctx.orgs().selected() })
        }
        ["refresh"] => {
            let session = ctx.session().refresh().await?;
            json!({
                "refreshed": true,
                "authenticated": session.is_authenticated(),
            })
        }
        ["logout"] => {
            ctx.session().logout();
            json!({ "logged_out": true })
        }
        _ => bail!(USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
