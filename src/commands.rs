//! Command execution.

use crate::Commands;
use bson::{Bson, Document};
use colored::Colorize;
use docwire_client::{Client, Query};
use serde_json::Value;

/// Executes a command against `database` and returns the formatted output.
pub async fn execute(
    client: &Client,
    database: &str,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    let db = client.database(database)?;

    match cmd {
        Commands::Insert {
            collection,
            document,
        } => {
            let doc = parse_document(&document)?;
            db.collection(&collection)?.insert(&doc).await?;
            Ok(format!("{} into {}", "Inserted".green(), collection.cyan()))
        }

        Commands::Find {
            collection,
            query,
            fields,
            sort,
            skip,
            limit,
            batch_size,
        } => {
            let mut q = Query::new(parse_optional(query.as_deref())?);
            if let Some(sort) = sort {
                q.sort(parse_document(&sort)?);
            }
            let fields = fields.as_deref().map(parse_document).transpose()?;

            let coll = db.collection(&collection)?;
            let mut cursor = coll.query(q, fields, skip, batch_size).await?;
            let mut output = String::new();
            let mut count = 0usize;
            while limit.map_or(true, |limit| count < limit) {
                match cursor.next().await? {
                    Some(doc) => {
                        output.push_str(&format_document(doc));
                        output.push('\n');
                        count += 1;
                    }
                    None => break,
                }
            }
            cursor.close().await?;

            output.push_str(&format!("{} document(s)", count).dimmed().to_string());
            Ok(output)
        }

        Commands::Count { collection, query } => {
            let query = query.as_deref().map(parse_document).transpose()?;
            let n = db.collection(&collection)?.count(query).await?;
            Ok(n.to_string())
        }

        Commands::Update {
            collection,
            selector,
            update,
            upsert,
            multi,
        } => {
            let coll = db.collection(&collection)?;
            let selector = parse_document(&selector)?;
            let update = parse_document(&update)?;
            match (upsert, multi) {
                (false, false) => coll.update(&selector, &update).await?,
                (true, false) => coll.upsert(&selector, &update).await?,
                (false, true) => coll.update_all(&selector, &update).await?,
                (true, true) => coll.upsert_all(&selector, &update).await?,
            }
            Ok(format!("{} {}", "Updated".green(), collection.cyan()))
        }

        Commands::Remove {
            collection,
            selector,
            first,
        } => {
            let coll = db.collection(&collection)?;
            let selector = parse_optional(selector.as_deref())?;
            if first {
                coll.remove_first(&selector).await?;
            } else {
                coll.remove(&selector).await?;
            }
            Ok(format!("{} from {}", "Removed".green(), collection.cyan()))
        }

        Commands::Command { command } => {
            let reply = db.command(parse_document(&command)?).await?;
            Ok(format_document(reply))
        }

        Commands::Drop { collection } => {
            db.collection(&collection)?.drop().await?;
            Ok(format!("{} collection {}", "Dropped".green(), collection.cyan()))
        }

        Commands::Stats => {
            let stats = db.stats().await?;
            Ok(format!(
                "{}\n  Collections: {}\n  Objects: {}\n  Data size: {}\n  Storage size: {}\n  Indexes: {}\n  Index size: {}",
                format!("Database {}", database.cyan()).bold(),
                stats.collections,
                stats.objects,
                stats.data_size,
                stats.storage_size,
                stats.indexes,
                stats.index_size
            ))
        }
    }
}

/// Parses a JSON object argument (or `@file.json` to read from file) into a
/// document. Extended JSON such as `{"$oid": ...}` is understood.
fn parse_document(arg: &str) -> Result<Document, Box<dyn std::error::Error>> {
    let value: Value = if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        serde_json::from_str(arg)?
    };

    match Bson::try_from(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(format!("expected a JSON object, got {}", other).into()),
    }
}

/// Like [`parse_document`]; a missing argument is the empty document.
fn parse_optional(arg: Option<&str>) -> Result<Document, Box<dyn std::error::Error>> {
    arg.map(parse_document)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Formats a document as relaxed extended JSON.
fn format_document(doc: Document) -> String {
    let value = Bson::Document(doc).into_relaxed_extjson();
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}
