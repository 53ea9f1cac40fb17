use clap::{Parser, Subcommand};
use studylink::{
    clock::SystemClock,
    config::AppConfig,
    db,
    models::Account,
    repositories::SqliteAccountRepository,
    services::{create_email_service, AccountService, EmailService},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "studylink-cli")]
#[command(about = "CLI tool for managing StudyLink accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List accounts
    List {
        /// Maximum number of accounts to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Show one account
    Show {
        /// Email address of the account
        #[arg(short, long)]
        email: String,

        /// Print the account as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark an account's email as verified without a token
    Verify {
        /// Email address of the account to verify
        #[arg(short, long)]
        email: String,
    },

    /// Issue a new verification token and email it
    Resend {
        /// Email address of the account
        #[arg(short, long)]
        email: String,

        /// Send even if the last email went out less than an hour ago
        #[arg(long)]
        force: bool,
    },
}

fn format_time(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn print_account(account: &Account) {
    println!("  ID: {}", account.id);
    println!("  Username: {}", account.username);
    println!("  Email: {}", account.email);
    println!("  Verified: {}", account.email_verified);
    println!(
        "  Token issued: {}",
        format_time(account.email_check_token_generated_at)
    );
    println!("  Joined: {}", format_time(account.joined_at));
}

async fn find_or_exit(service: &AccountService, email: &str) -> Account {
    match service.find_by_email(email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            eprintln!("❌ Account '{}' not found", email);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("❌ Failed to find account: {}", err);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    // Initialize services
    let account_repository = Arc::new(SqliteAccountRepository::new(pool.clone()));
    let email_service: Arc<dyn EmailService> = Arc::from(create_email_service(&config.base_url));
    let account_service =
        AccountService::new(account_repository, email_service, Arc::new(SystemClock));

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Account { command } => match command {
            AccountCommands::List { limit, offset } => {
                match account_service
                    .list_accounts(Some(limit), Some(offset))
                    .await
                {
                    Ok(accounts) => {
                        if accounts.is_empty() {
                            println!("No accounts found.");
                        } else {
                            println!(
                                "{:<5} {:<20} {:<40} {:<10} {:<20}",
                                "ID", "Username", "Email", "Verified", "Joined"
                            );
                            println!("{}", "-".repeat(95));
                            for account in accounts {
                                println!(
                                    "{:<5} {:<20} {:<40} {:<10} {:<20}",
                                    account.id,
                                    account.username,
                                    account.email,
                                    if account.email_verified { "Yes" } else { "No" },
                                    format_time(account.joined_at)
                                );
                            }
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to list accounts: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            AccountCommands::Show { email, json } => {
                let account = find_or_exit(&account_service, &email).await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&account)?);
                } else {
                    print_account(&account);
                }
            }

            AccountCommands::Verify { email } => {
                let mut account = find_or_exit(&account_service, &email).await;
                match account_service.complete_sign_up(&mut account).await {
                    Ok(true) => {
                        println!("✅ Account '{}' verified successfully!", email);
                        println!("  Joined: {}", format_time(account.joined_at));
                    }
                    Ok(false) => {
                        println!("ℹ️  Account '{}' is already verified", email);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to verify account: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            AccountCommands::Resend { email, force } => {
                let account = find_or_exit(&account_service, &email).await;
                if account.email_verified {
                    println!("ℹ️  Account '{}' is already verified", email);
                    return Ok(());
                }
                if !force && !account.can_send_confirm_email(account_service.now()) {
                    eprintln!(
                        "❌ A verification email was sent less than an hour ago (use --force to send anyway)"
                    );
                    std::process::exit(1);
                }

                match account_service.send_sign_up_confirm_email(&account).await {
                    Ok(updated) => {
                        println!("✅ Verification email sent to '{}'", email);
                        println!(
                            "  Token issued: {}",
                            format_time(updated.email_check_token_generated_at)
                        );
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to send verification email: {}", err);
                        std::process::exit(1);
                    }
                }
            }
        },
    }

    Ok(())
}
