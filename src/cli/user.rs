use anyhow::Result;

use crate::config::MemoriaConfig;
use crate::memory::users;

/// Create a user (idempotent) and print its id.
pub fn add(config: &MemoriaConfig, email: &str, name: Option<&str>) -> Result<()> {
    let conn = super::open_db(config)?;
    let user = users::ensure_user(&conn, email, name)?;
    println!("user {} ({})", user.id, user.email);
    Ok(())
}

/// Print one user's record.
pub fn show(config: &MemoriaConfig, email: &str) -> Result<()> {
    let conn = super::open_db(config)?;
    let user = super::require_user(&conn, email)?;

    println!("id:         {}", user.id);
    println!("email:      {}", user.email);
    println!("name:       {}", user.name.as_deref().unwrap_or("-"));
    println!("created at: {}", user.created_at);
    Ok(())
}
