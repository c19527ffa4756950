use anyhow::Result;

use crate::config::MemoriaConfig;
use crate::ledger;

/// List the user's threads, most recently active first.
pub fn list(config: &MemoriaConfig, email: &str) -> Result<()> {
    let conn = super::open_db(config)?;
    let user = super::require_user(&conn, email)?;

    let previews = ledger::latest_per_thread(&conn, user.id)?;
    if previews.is_empty() {
        println!("no threads yet");
        return Ok(());
    }
    for preview in previews {
        println!(
            "{:<24} {}  [{}] {}",
            preview.title,
            preview.created_at,
            preview.sender,
            truncate(&preview.message, 60)
        );
    }
    Ok(())
}

/// Print the full history of one thread, oldest first.
pub fn history(config: &MemoriaConfig, email: &str, thread: &str) -> Result<()> {
    let conn = super::open_db(config)?;
    let user = super::require_user(&conn, email)?;

    let thread_id = ledger::namespace_thread_id(user.id, thread);
    let messages = ledger::thread_history(&conn, user.id, &thread_id)?;
    if messages.is_empty() {
        println!("thread '{thread}' has no messages");
        return Ok(());
    }
    for message in messages {
        println!("[{}] {}: {}", message.created_at, message.sender, message.message);
    }
    Ok(())
}

/// Delete one thread's history.
pub fn forget(config: &MemoriaConfig, email: &str, thread: &str) -> Result<()> {
    let conn = super::open_db(config)?;
    let user = super::require_user(&conn, email)?;

    let thread_id = ledger::namespace_thread_id(user.id, thread);
    if ledger::delete_thread(&conn, user.id, &thread_id)? {
        println!("forgot thread '{thread}'");
    } else {
        println!("no thread named '{thread}'");
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
