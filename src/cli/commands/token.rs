use anyhow::Context;
use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims, Role};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "User id (random when omitted)")]
    pub user: Option<Uuid>,

    #[arg(long, help = "Organization id")]
    pub org: Uuid,

    #[arg(long, default_value = "member", help = "Role: platform_owner, platform_admin, tenant_owner, admin, manager, technician, member")]
    pub role: Role,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    config.validate()?;

    let user_id = args.user.unwrap_or_else(Uuid::new_v4);
    let hours = args.hours.unwrap_or(config.security.jwt_expiry_hours);
    let claims = Claims::new(user_id, args.org, args.role, args.email, hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret).context("failed to mint token")?;

    match output_format {
        OutputFormat::Json => {
            let output = json!({
                "token": token,
                "user_id": user_id,
                "organization_id": args.org,
                "role": args.role,
                "expires_at": claims.exp,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
