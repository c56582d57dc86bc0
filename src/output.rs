use asx_tax::accounting::planning::{ParcelSuggestion, PortfolioSummary, SalePreview};
use asx_tax::accounting::positions::Position;
use asx_tax::accounting::reports::AnnualReport;
use asx_tax::accounting::unrealized::UnrealizedSummary;
use asx_tax::franking::FrankingSummary;
use asx_tax::{CgtEvent, Parcel};
use rust_decimal::Decimal;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ParcelRow {
    #[tabled(rename = "#")]
    id: usize,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Bought")]
    original: u64,
    #[tabled(rename = "Held")]
    remaining: u64,
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    #[tabled(rename = "Cost Base")]
    remaining_cost: String,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Disposed")]
    disposed: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Parcel")]
    parcel: usize,
    #[tabled(rename = "Qty")]
    quantity: u64,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Base")]
    cost_base: String,
    #[tabled(rename = "Days")]
    holding_days: i64,
    #[tabled(rename = "Gain")]
    gain: String,
    #[tabled(rename = "Taxable")]
    discounted: String,
}

#[derive(Tabled)]
struct UnrealizedRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Parcel")]
    parcel: usize,
    #[tabled(rename = "Qty")]
    quantity: u64,
    #[tabled(rename = "Cost Base")]
    cost_base: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Value")]
    market_value: String,
    #[tabled(rename = "Gain")]
    gain: String,
    #[tabled(rename = "Days")]
    holding_days: i64,
    #[tabled(rename = "Discount")]
    eligible: String,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Qty")]
    quantity: u64,
    #[tabled(rename = "Avg Cost")]
    avg_cost: String,
    #[tabled(rename = "Cost Base")]
    cost_base: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Value")]
    market_value: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

#[derive(Tabled)]
struct SuggestionRow {
    #[tabled(rename = "Parcel")]
    parcel: usize,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Held")]
    available: u64,
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    #[tabled(rename = "Gain/Share")]
    gain: String,
    #[tabled(rename = "Days")]
    holding_days: i64,
    #[tabled(rename = "Taxable/Share")]
    effective: String,
    #[tabled(rename = "For Target")]
    for_target: String,
}

#[derive(Tabled)]
struct PriceRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Price")]
    price: String,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Item")]
    item: &'static str,
    #[tabled(rename = "Amount")]
    amount: String,
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn optional_money(value: Option<Decimal>) -> String {
    value.map(money).unwrap_or_else(|| "-".to_string())
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

pub fn print_parcels<'a>(parcels: impl Iterator<Item = &'a Parcel>) {
    let rows: Vec<ParcelRow> = parcels
        .map(|p| ParcelRow {
            id: p.id,
            symbol: p.symbol.clone(),
            acquired: p.acquired.to_string(),
            original: p.original_quantity,
            remaining: p.remaining_quantity,
            unit_cost: format!("{:.4}", p.unit_cost.round_dp(4)),
            remaining_cost: money(p.remaining_cost),
        })
        .collect();
    println!("{}", render(rows));
}

pub fn print_events<'a>(events: impl Iterator<Item = &'a CgtEvent>) {
    let rows: Vec<EventRow> = events
        .map(|e| EventRow {
            disposed: e.disposed.to_string(),
            symbol: e.symbol.clone(),
            parcel: e.parcel_id,
            quantity: e.quantity,
            proceeds: money(e.proceeds),
            cost_base: money(e.cost_base),
            holding_days: e.holding_days,
            gain: money(e.gross_gain),
            discounted: money(e.discounted_gain),
        })
        .collect();
    println!("{}", render(rows));
}

pub fn print_report(report: &AnnualReport) {
    println!("Capital gains for {}", report.financial_year);
    let rows = vec![
        FieldRow { item: "Gross gains", amount: money(report.gross_gains) },
        FieldRow { item: "Gross losses", amount: money(report.gross_losses) },
        FieldRow { item: "Discount eligible gains", amount: money(report.discount_eligible_gains) },
        FieldRow { item: "CGT discount", amount: money(report.discount_amount) },
        FieldRow { item: "Gains after discount", amount: money(report.discounted_gains) },
        FieldRow { item: "Prior losses available", amount: money(report.prior_loss_available) },
        FieldRow { item: "Prior losses applied", amount: money(report.prior_loss_applied) },
        FieldRow { item: "Net capital gain", amount: money(report.net_taxable_gain) },
        FieldRow { item: "Loss carried forward", amount: money(report.carried_forward_loss) },
    ];
    println!("{}", render(rows));
}

pub fn print_unrealized(summary: &UnrealizedSummary) {
    let rows: Vec<UnrealizedRow> = summary
        .parcels
        .iter()
        .map(|p| UnrealizedRow {
            symbol: p.symbol.clone(),
            parcel: p.parcel_id,
            quantity: p.quantity,
            cost_base: money(p.cost_base),
            price: money(p.price),
            market_value: money(p.market_value),
            gain: money(p.gain),
            holding_days: p.holding_days,
            eligible: if p.discount_eligible { "yes" } else { "no" }.to_string(),
        })
        .collect();
    println!("{}", render(rows));

    let totals = vec![
        FieldRow { item: "Market value", amount: money(summary.market_value) },
        FieldRow { item: "Cost base", amount: money(summary.cost_base) },
        FieldRow { item: "Unrealized gain", amount: money(summary.total_gain) },
        FieldRow { item: "Discount eligible", amount: money(summary.eligible_gain) },
        FieldRow { item: "Not yet eligible", amount: money(summary.ineligible_gain) },
        FieldRow { item: "Taxable if sold", amount: money(summary.projected_discounted_gain) },
    ];
    println!("{}", render(totals));
    if !summary.skipped_symbols.is_empty() {
        println!("No price for: {}", summary.skipped_symbols.join(", "));
    }
}

pub fn print_positions(positions: &[Position]) {
    let rows: Vec<PositionRow> = positions
        .iter()
        .map(|p| PositionRow {
            symbol: p.symbol.clone(),
            quantity: p.quantity,
            avg_cost: format!("{:.4}", p.avg_cost),
            cost_base: money(p.cost_base),
            price: optional_money(p.price),
            market_value: optional_money(p.market_value),
            gain: optional_money(p.unrealized_gain),
        })
        .collect();
    println!("{}", render(rows));
}

pub fn print_preview(preview: &SalePreview) {
    println!(
        "Selling {} {} @ {} on {} ({})",
        preview.quantity, preview.symbol, preview.sale_price, preview.date, preview.method
    );
    let rows = vec![
        FieldRow { item: "Proceeds after fees", amount: money(preview.proceeds) },
        FieldRow { item: "Cost base", amount: money(preview.cost_base) },
        FieldRow { item: "Capital gain", amount: money(preview.gross_gain) },
        FieldRow { item: "Taxable gain", amount: money(preview.discounted_gain) },
    ];
    println!("{}", render(rows));
}

pub fn print_suggestions(suggestions: &[ParcelSuggestion]) {
    let rows: Vec<SuggestionRow> = suggestions
        .iter()
        .map(|s| SuggestionRow {
            parcel: s.parcel_id,
            acquired: s.acquired.to_string(),
            available: s.available_quantity,
            unit_cost: format!("{:.4}", s.unit_cost.round_dp(4)),
            gain: money(s.gain_per_share),
            holding_days: s.holding_days,
            effective: money(s.effective_gain_per_share),
            for_target: s.shares_for_target.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", render(rows));
}

pub fn print_summary(summary: &PortfolioSummary) {
    let rows = vec![
        FieldRow { item: "Starting cash", amount: money(summary.starting_cash) },
        FieldRow { item: "Fees paid", amount: money(summary.total_fees) },
        FieldRow { item: "Cash balance", amount: money(summary.cash_balance) },
        FieldRow { item: "Cost base", amount: money(summary.cost_base) },
        FieldRow { item: "Market value", amount: money(summary.market_value) },
        FieldRow { item: "Unrealized gain", amount: money(summary.unrealized_gain) },
        FieldRow { item: "Portfolio value", amount: money(summary.total_value) },
        FieldRow { item: "Return", amount: format!("{}%", summary.return_pct) },
    ];
    println!("{}", render(rows));
    if !summary.unpriced_symbols.is_empty() {
        println!("No price for: {}", summary.unpriced_symbols.join(", "));
    }
}

pub fn print_prices(prices: &[(String, Option<Decimal>)]) {
    let rows: Vec<PriceRow> = prices
        .iter()
        .map(|(symbol, price)| PriceRow {
            symbol: symbol.clone(),
            price: price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", render(rows));
}

pub fn print_franking(summary: &FrankingSummary) {
    let rows = vec![
        FieldRow { item: "Cash dividends", amount: money(summary.cash_dividends) },
        FieldRow { item: "Franking credits", amount: money(summary.franking_credits) },
        FieldRow { item: "Grossed-up dividends", amount: money(summary.grossed_up_dividends) },
        FieldRow { item: "Marginal rate", amount: format!("{}%", (summary.marginal_rate * Decimal::ONE_HUNDRED).normalize()) },
        FieldRow { item: "Tax on dividends", amount: money(summary.tax_on_dividends) },
        FieldRow { item: "Net tax after credits", amount: money(summary.net_tax_on_dividends) },
        FieldRow { item: "Refundable credits", amount: money(summary.refundable_credits) },
    ];
    println!("{}", render(rows));
}
