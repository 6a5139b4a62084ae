//! Memory CLI commands: extract, recall, layers.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use strata_types::layer::Layer;
use strata_types::memory::{ExtractionRequest, RetrievalQuery};

use crate::state::AppState;

/// Run one extraction synchronously and print the report.
///
/// ```bash
/// strata extract --owner alice --chat c1 --message m1 --text "I love espresso"
/// ```
pub async fn extract(
    state: &AppState,
    owner: Option<String>,
    chat: String,
    message: String,
    text: String,
    context: String,
    json: bool,
) -> Result<()> {
    let request = ExtractionRequest {
        owner_id: ExtractionRequest::resolve_owner(owner.as_deref(), &chat),
        source_chat_id: chat,
        source_message_id: message,
        text,
        context_window: context,
    };
    let owner_id = request.owner_id.clone();
    let report = state.memory_service.extract_now(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Extraction for '{}'",
        style("✓").green().bold(),
        style(&owner_id).cyan()
    );
    println!();
    println!("  Inserted: {}", style(report.inserted).bold());
    println!("  Updated:  {}", style(report.updated).bold());
    if report.skipped > 0 {
        println!("  Skipped:  {}", style(report.skipped).yellow());
    }
    if report.failed > 0 {
        println!("  Failed:   {}", style(report.failed).red());
    }
    println!();

    Ok(())
}

/// Print the ranked memories for a query and the context block they render to.
///
/// ```bash
/// strata recall --owner alice "what do I drink?"
/// ```
pub async fn recall(state: &AppState, owner: String, query: String, json: bool) -> Result<()> {
    let query = RetrievalQuery {
        owner_id: owner,
        text: query,
    };
    let items = state.memory_service.retrieve(&query).await?;
    let context = state.memory_service.format_context(&items);

    if json {
        let out = serde_json::json!({ "items": items, "context": context });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if items.is_empty() {
        println!();
        println!(
            "  {} No memories for '{}' match this query.",
            style("i").blue().bold(),
            style(&query.owner_id).cyan(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Score").fg(Color::White),
        Cell::new("Layer").fg(Color::White),
        Cell::new("Memory").fg(Color::White),
        Cell::new("Tags").fg(Color::White),
    ]);

    for item in &items {
        table.add_row(vec![
            Cell::new(format!("{:.3}", item.score)).fg(Color::Yellow),
            layer_cell(item.layer),
            Cell::new(item.display_text()).fg(Color::White),
            Cell::new(item.tags.join(", ")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("{}", style(&context).dim());
    println!();

    Ok(())
}

/// Print how many records an owner holds in each layer.
pub async fn layers(state: &AppState, owner: String, json: bool) -> Result<()> {
    let counts = state.memory_service.layer_counts(&owner).await?;

    if json {
        let out: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(layer, count)| (layer.to_string(), serde_json::Value::from(*count)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Layer").fg(Color::White),
        Cell::new("Records").fg(Color::White),
    ]);
    for (layer, count) in &counts {
        table.add_row(vec![layer_cell(*layer), Cell::new(count)]);
    }

    let total: u64 = counts.iter().map(|(_, c)| c).sum();
    println!();
    println!("  Memory layers for '{}'", style(&owner).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!("  {} records total", style(total).bold());
    println!();

    Ok(())
}

fn layer_cell(layer: Layer) -> Cell {
    let color = match layer {
        Layer::Identities => Color::Cyan,
        Layer::Preferences => Color::Magenta,
        Layer::Experiences => Color::Yellow,
        Layer::Activities => Color::Green,
        Layer::Contexts => Color::Blue,
        Layer::Personas => Color::Red,
    };
    Cell::new(layer.as_str()).fg(color)
}
