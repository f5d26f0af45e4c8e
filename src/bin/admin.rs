use anyhow::{bail, Context};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use startup_scout::{config::AppConfig, db, entities::user, logging};
use std::env;
use tracing::{error, info};

const USERNAME_MAX_LEN: usize = 150;

fn usage() -> ! {
    eprintln!("usage: startup-scout-admin <migrate | create-user USERNAME>");
    std::process::exit(2);
}

// Letters, digits and @.+-_ only
fn validate_username(username: &str) -> anyhow::Result<()> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        bail!("username must be 1 to {} characters", USERNAME_MAX_LEN);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        bail!("username may only contain letters, digits and @/./+/-/_");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) so DATABASE_URL from file is visible
    let _ = dotenvy::dotenv();
    logging::init();

    // Command-line arguments
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or_else(|| usage());

    let config = AppConfig::from_env()?;
    let db_conn = db::connect(&config).await.context("failed to connect to database")?;
    db::migrate(&db_conn).await.context("failed to apply migrations")?;

    match command {
        "migrate" => {
            info!("Migrations applied");
        }
        "create-user" => {
            let Some(username) = args.get(1) else { usage() };
            validate_username(username)?;

            let token = uuid::Uuid::new_v4().simple().to_string();
            let am = user::ActiveModel {
                username: Set(username.clone()),
                api_token: Set(token.clone()),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            match am.insert(&db_conn).await {
                Ok(user) => {
                    info!(user_id = user.id, "Created user {}", user.username);
                    println!("{}", token);
                }
                Err(e) => {
                    error!(?e, "failed to create user");
                    return Err(e).context("username may already be taken");
                }
            }
        }
        _ => usage(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_username;

    #[test]
    fn accepts_letters_digits_and_symbols() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob.smith+scout@example-co_1").is_ok());
    }

    #[test]
    fn rejects_bad_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("with space").is_err());
        assert!(validate_username("ünïcode").is_err());
        assert!(validate_username("quote\"d").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }
}
