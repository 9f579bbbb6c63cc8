use anyhow::{Context, Result};
use chrono::NaiveDate;

use agentic_gateway::config::GatewayConfig;
use agentic_gateway::memory::{MemoryKind, MemoryMetadata, MemoryRecord, MemoryStore};

fn open_store(config: &GatewayConfig) -> Result<MemoryStore> {
    let db_path = config.resolved_db_path();
    MemoryStore::open(&db_path)
        .with_context(|| format!("failed to open memory store at {}", db_path.display()))
}

fn resolve_user(config: &GatewayConfig, user: Option<String>) -> String {
    user.unwrap_or_else(|| config.memory.default_user_id.clone())
}

pub async fn add(
    config: &GatewayConfig,
    text: &str,
    user: Option<String>,
    kind: Option<String>,
    category: Option<String>,
    date: Option<String>,
) -> Result<()> {
    let metadata = MemoryMetadata {
        kind: kind
            .map(|k| k.parse::<MemoryKind>())
            .transpose()
            .map_err(anyhow::Error::msg)?,
        category,
        date: date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .context("date must be YYYY-MM-DD")?,
    };

    let store = open_store(config)?;
    let user = resolve_user(config, user);
    let outcome = store
        .add(&user, text, Some(metadata).filter(|m| !m.is_empty()))
        .await?;

    if outcome.deduped {
        println!("Already stored as {} (user {user})", outcome.id);
    } else {
        println!("Stored {} (user {user})", outcome.id);
    }
    Ok(())
}

pub async fn search(
    config: &GatewayConfig,
    query: &str,
    user: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let store = open_store(config)?;
    let user = resolve_user(config, user);
    let limit = limit.unwrap_or(config.memory.default_limit);
    let records = store.search(&user, query, limit).await?;

    if records.is_empty() {
        println!("No memories matching {query:?} for user {user}.");
        return Ok(());
    }
    println!("Found {} memory(ies) for user {user}\n", records.len());
    print_records(&records);
    Ok(())
}

pub async fn list(config: &GatewayConfig, user: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let user = resolve_user(config, user);
    let records = store.list(&user).await?;

    if records.is_empty() {
        println!("No memories for user {user}.");
        return Ok(());
    }
    println!("{} memory(ies) for user {user}\n", records.len());
    print_records(&records);
    Ok(())
}

fn print_records(records: &[MemoryRecord]) {
    for (i, record) in records.iter().enumerate() {
        let tags = record
            .metadata
            .as_ref()
            .map(|m| {
                let mut parts = Vec::new();
                if let Some(kind) = m.kind {
                    parts.push(kind.to_string());
                }
                if let Some(category) = &m.category {
                    parts.push(category.clone());
                }
                if let Some(date) = m.date {
                    parts.push(date.to_string());
                }
                parts.join(", ")
            })
            .filter(|t| !t.is_empty())
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();

        println!("  {}. {}{tags}", i + 1, record.id);
        println!("     {}", record.text);
        println!("     created {}", record.created_at);
        println!();
    }
}
