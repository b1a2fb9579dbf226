use super::ui;
use crate::api::AppState;
use crate::core::analytics::{PortfolioSummary, summarize, value_assets};
use crate::core::currency::convert;
use crate::core::models::{Asset, User};
use anyhow::{Context, Result, anyhow};
use comfy_table::Cell;

impl PortfolioSummary {
    pub fn display_as_table(&self) -> String {
        let currency = &self.currency;

        let mut categories = ui::new_styled_table();
        categories.set_header(vec![
            ui::header_cell("Category"),
            ui::header_cell(&format!("Value ({currency})")),
            ui::header_cell("Share (%)"),
        ]);
        for group in &self.by_category {
            categories.add_row(vec![
                Cell::new(group.label),
                ui::amount_cell(group.total_value),
                ui::format_percentage_cell(group.percentage_of_total),
            ]);
        }

        let mut currencies = ui::new_styled_table();
        currencies.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell(&format!("Value ({currency})")),
            ui::header_cell("Share (%)"),
        ]);
        for group in &self.by_currency {
            currencies.add_row(vec![
                Cell::new(&group.currency),
                ui::amount_cell(group.total_value),
                ui::format_percentage_cell(group.percentage_of_total),
            ]);
        }

        let mut output = format!(
            "{}\n{}\n\n{}\n{}",
            ui::style_text("By category", ui::StyleType::Title),
            categories,
            ui::style_text("By currency", ui::StyleType::Title),
            currencies,
        );
        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text(currency, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.total_value), ui::StyleType::TotalValue)
        ));
        output
    }
}

/// One row per asset with its valuation and the converted amount.
pub fn holdings_table(
    assets: &[Asset],
    summary_currency: &str,
    convert_fn: impl Fn(&Asset) -> f64,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Asset"),
        ui::header_cell("Category"),
        ui::header_cell("Shares"),
        ui::header_cell("Value"),
        ui::header_cell(&format!("Value ({summary_currency})")),
    ]);

    for asset in assets {
        let name = match &asset.symbol {
            Some(symbol) => format!("{} ({symbol})", asset.description),
            None => asset.description.clone(),
        };
        let valuation = &asset.current_valuation;
        table.add_row(vec![
            Cell::new(name),
            Cell::new(asset.category.group().label()),
            ui::format_optional_cell(asset.shares, |s| format!("{s:.4}")),
            Cell::new(format!("{:.2} {}", valuation.amount, valuation.currency)),
            ui::amount_cell(convert_fn(asset)),
        ]);
    }
    table.to_string()
}

fn render(
    user: &User,
    assets: &[Asset],
    summary: &PortfolioSummary,
    convert_fn: impl Fn(&Asset) -> f64,
) -> String {
    format!(
        "Portfolio: {} {}\n\n{}\n\n{}",
        ui::style_text(&user.name, ui::StyleType::Title),
        ui::style_text(&format!("<{}>", user.email), ui::StyleType::Subtle),
        holdings_table(assets, &summary.currency, convert_fn),
        summary.display_as_table(),
    )
}

/// Prints the summary of one user's assets.
pub async fn run(state: &AppState, email: &str, currency: Option<&str>) -> Result<()> {
    let user = state
        .store
        .find_user_by_email(email)?
        .ok_or_else(|| anyhow!("No user with email {}", email))?;
    let currency = currency.unwrap_or(&state.config.currency);

    let assets = state.store.assets_for(user.id)?;
    if assets.is_empty() {
        println!(
            "{}",
            ui::style_text(&format!("{} has no assets yet", user.email), ui::StyleType::Subtle)
        );
        return Ok(());
    }

    let spinner = ui::new_spinner("Fetching prices...");
    let valued = value_assets(&assets, &state.pricing).await;
    spinner.set_message("Fetching currency rates...");
    let rates = state
        .rates
        .fetch_rates(currency)
        .await
        .with_context(|| format!("Failed to fetch rates for {currency}"));
    spinner.finish_and_clear();
    let rates = rates?;

    let summary = summarize(&valued, &rates, currency);
    println!(
        "{}",
        render(&user, &valued, &summary, |asset| convert(
            asset.current_valuation.amount,
            &asset.current_valuation.currency,
            &rates
        ))
    );
    ui::print_separator();
    state.store.persist()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allocation::AssetCategory;
    use crate::core::currency::RateTable;
    use crate::core::models::Valuation;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn test_display_contains_groups_and_total() {
        let mut stock = Asset::new(Uuid::new_v4(), AssetCategory::Stocks, "Apple");
        stock.symbol = Some("AAPL".to_string());
        stock.current_valuation = Valuation {
            currency: "USD".to_string(),
            amount: 1500.0,
        };
        let mut house = Asset::new(Uuid::new_v4(), AssetCategory::RealEstate, "Flat");
        house.current_valuation = Valuation {
            currency: "EUR".to_string(),
            amount: 450.0,
        };
        let rates = RateTable::new("usd", HashMap::from([("eur".to_string(), 0.9)]));
        let assets = vec![stock, house];

        let summary = summarize(&assets, &rates, "USD");
        let output = summary.display_as_table();
        assert!(output.contains("Stocks"));
        assert!(output.contains("Real Estate"));
        assert!(output.contains("EUR"));
        assert!(output.contains("2000.00"));

        let holdings = holdings_table(&assets, "USD", |asset| {
            convert(
                asset.current_valuation.amount,
                &asset.current_valuation.currency,
                &rates,
            )
        });
        assert!(holdings.contains("Apple (AAPL)"));
        assert!(holdings.contains("500.00"));
    }
}
