//! Clear operation: empties a store ahead of a clone or a fresh import.
//!
//! Internal tables are never touched. Per-object failures are reported in
//! the result and do not stop the remaining objects from being cleared.

use crate::codec::quote_identifier;
use crate::config::{ClearOptions, is_internal_name};
use crate::models::ClearResult;
use crate::store::DumpStore;

/// Clears user objects from `store`.
///
/// Without `keep_schema` every user view and table is dropped; with it,
/// every user table is emptied and the schema is left in place. With
/// `reset_triggers` trigger definitions are dropped as well.
pub async fn clear(store: &dyn DumpStore, options: &ClearOptions) -> ClearResult {
    tracing::info!(
        "Clearing {} (keep_schema: {}, reset_triggers: {})",
        store.source_name(),
        options.keep_schema,
        options.reset_triggers
    );
    let mut result = ClearResult::default();

    if options.reset_triggers {
        match store.list_triggers().await {
            Ok(triggers) => {
                for trigger in triggers
                    .iter()
                    .filter(|t| !is_internal_name(t, &options.internal_prefixes))
                {
                    let statement = format!("DROP TRIGGER IF EXISTS {}", quote_identifier(trigger));
                    run(store, &statement, &mut result).await;
                }
            }
            Err(e) => result
                .warnings
                .push(format!("Failed to list triggers: {}", e.to_report_string())),
        }
    }

    if !options.keep_schema {
        match store.list_views().await {
            Ok(views) => {
                for view in views
                    .iter()
                    .filter(|v| !is_internal_name(&v.name, &options.internal_prefixes))
                {
                    let statement = format!("DROP VIEW IF EXISTS {}", quote_identifier(&view.name));
                    run(store, &statement, &mut result).await;
                }
            }
            Err(e) => result
                .warnings
                .push(format!("Failed to list views: {}", e.to_report_string())),
        }
    }

    let tables = match store.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            result
                .warnings
                .push(format!("Failed to list tables: {}", e.to_report_string()));
            result.success = false;
            return result;
        }
    };

    for table in tables
        .iter()
        .filter(|t| !is_internal_name(t, &options.internal_prefixes))
    {
        let statement = if options.keep_schema {
            format!("DELETE FROM {}", quote_identifier(table))
        } else {
            format!("DROP TABLE IF EXISTS {}", quote_identifier(table))
        };
        if run(store, &statement, &mut result).await {
            result.tables_cleared.push(table.clone());
        }
    }

    result.success = result.warnings.is_empty();
    tracing::info!(
        "Cleared {} tables with {} warnings",
        result.tables_cleared.len(),
        result.warnings.len()
    );
    result
}

async fn run(store: &dyn DumpStore, statement: &str, result: &mut ClearResult) -> bool {
    match store.execute(statement).await {
        Ok(_) => true,
        Err(e) => {
            let warning = format!("{} failed: {}", statement, e.to_report_string());
            tracing::warn!("{}", warning);
            result.warnings.push(warning);
            false
        }
    }
}
