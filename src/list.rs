//! `vocab list`: run one page query from the command line.

use anyhow::Result;

use vocab_pager_core::paginate::{ListParams, PageResult};

use crate::backend::open_store;
use crate::config::Config;
use crate::service::QueryService;

/// Queries `collection` (or the sub-view of `collection` scoped to
/// `parent_id`) and prints the page as JSON or a table.
pub async fn run_list(
    config: &Config,
    collection: &str,
    parent_id: Option<&str>,
    params: ListParams,
    json: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let service = QueryService::from_config(config, store)?;

    let (page, view) = match parent_id {
        Some(id) => {
            let page = service.query_child(collection, id, params).await?;
            let view = service
                .catalog()
                .child_of(collection)
                .map(|spec| spec.name.clone())
                .unwrap_or_else(|| collection.to_string());
            (page, view)
        }
        None => (service.query(collection, params).await?, collection.to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    let columns = service.catalog().get(&view)?.sortable.clone();
    print_table(&page, &columns);
    Ok(())
}

fn print_table(page: &PageResult, columns: &[String]) {
    println!(
        "Page {} of {} ({} per page, {} total)",
        page.page,
        page.page_count().max(1),
        page.per_page,
        page.total
    );
    if page.items.is_empty() {
        println!("No items.");
        return;
    }

    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|c| item.filter_text(c).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .max()
                .unwrap_or(0)
                .max(c.len())
        })
        .collect();

    println!("{}", format_row(columns, &widths));
    for row in &rows {
        println!("{}", format_row(row, &widths));
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
