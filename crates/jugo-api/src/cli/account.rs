//! `jugo user` and `jugo key` commands.

use jugo_infra::sqlite::credential::SqliteCredentialStore;
use jugo_types::error::RepositoryError;
use jugo_types::work::UserId;

/// Register a user and print its id.
pub async fn create_user(store: &SqliteCredentialStore, username: &str) -> anyhow::Result<()> {
    let user_id = store.create_user(username).await?;
    println!();
    println!(
        "  {} Created user '{}' with id {}",
        console::style("✓").green().bold(),
        console::style(username).cyan(),
        console::style(user_id).bold()
    );
    println!();
    Ok(())
}

/// Create an API key and print the plaintext once.
pub async fn create_key(
    store: &SqliteCredentialStore,
    user_id: i64,
    name: &str,
) -> anyhow::Result<()> {
    let key = match store.create_key(UserId(user_id), name).await {
        Ok(key) => key,
        Err(RepositoryError::NotFound) => anyhow::bail!("no user with id {user_id}"),
        Err(e) => return Err(e.into()),
    };

    println!();
    println!(
        "  {} API key created (save this -- it won't be shown again):",
        console::style("🔑").bold()
    );
    println!();
    println!("  {}", console::style(&key).yellow().bold());
    println!();
    println!(
        "  {}",
        console::style("Send it as 'Authorization: Bearer <key>' or '/ws?token=<key>'").dim()
    );
    println!();
    Ok(())
}
