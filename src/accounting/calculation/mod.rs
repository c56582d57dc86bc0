mod inventory;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::accounting::calculation::inventory::Inventory;
use crate::accounting::{pro_rata, CgtEvent, MatchingPolicy, Parcel, ParcelBook};
use crate::config::TaxConfig;
use crate::error::TaxError;
use crate::ledger::{Action, Transaction};

/// Replays the whole ledger into parcels and CGT events.
///
/// Transactions may arrive in any order; they are replayed by date, then by
/// insertion id. Non-executed transactions are ignored. Every executed
/// transaction is validated before the first one is applied, and an oversell
/// aborts the run, so a caller either gets a complete book or an error.
pub fn rebuild_from_ledger(
    transactions: &[Transaction],
    method: MatchingPolicy,
    tax: &TaxConfig,
) -> Result<ParcelBook, TaxError> {
    let mut ledger: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| {
            if !tx.is_executed() {
                debug!("skipping {} transaction #{}", tx.status, tx.id);
            }
            tx.is_executed()
        })
        .collect();

    for tx in ledger.iter() {
        tx.validate()?;
    }
    ledger.sort_by_key(|tx| (tx.date, tx.id));

    let mut calculation = CapitalGainsCalculation::new(method, tax);
    for tx in ledger {
        calculation.process_transaction(tx)?;
    }
    Ok(calculation.finish())
}

struct CapitalGainsCalculation<'a> {
    assets: BTreeMap<String, Inventory>,
    events: Vec<CgtEvent>,
    method: MatchingPolicy,
    tax: &'a TaxConfig,
    next_parcel_id: usize,
}

impl<'a> CapitalGainsCalculation<'a> {
    fn new(method: MatchingPolicy, tax: &'a TaxConfig) -> CapitalGainsCalculation<'a> {
        CapitalGainsCalculation {
            assets: BTreeMap::new(),
            events: Vec::new(),
            method,
            tax,
            next_parcel_id: 1,
        }
    }

    fn process_transaction(&mut self, tx: &Transaction) -> Result<(), TaxError> {
        debug!(
            "replaying #{} {} {} {} @ {} on {}",
            tx.id, tx.action, tx.quantity, tx.symbol, tx.price, tx.date
        );
        match tx.action {
            Action::Buy => {
                self.process_purchase(tx);
                Ok(())
            }
            Action::Sell => self.process_sale(tx),
        }
    }

    fn inventory(&mut self, symbol: &str) -> &mut Inventory {
        let method = self.method;
        self.assets
            .entry(symbol.to_string())
            .or_insert_with(|| Inventory::new(symbol, method))
    }

    fn process_purchase(&mut self, tx: &Transaction) {
        // brokerage is part of the cost base
        let total_cost = tx.value() + tx.fee;
        let parcel = Parcel {
            id: self.next_parcel_id,
            symbol: tx.symbol.clone(),
            source_tx: tx.id,
            acquired: tx.date,
            original_quantity: tx.quantity,
            remaining_quantity: tx.quantity,
            unit_cost: total_cost / Decimal::from(tx.quantity),
            total_cost,
            remaining_cost: total_cost,
        };
        self.next_parcel_id += 1;
        self.inventory(&tx.symbol).deposit(parcel);
    }

    fn process_sale(&mut self, tx: &Transaction) -> Result<(), TaxError> {
        let method = self.method;
        let tax = self.tax;
        let inventory = self.inventory(&tx.symbol);
        let draws = inventory.withdraw(tx.quantity, tx.date)?;

        let mut fee_allocated = Decimal::ZERO;
        let last = draws.len().saturating_sub(1);
        let mut events = Vec::with_capacity(draws.len());

        for (i, draw) in draws.iter().enumerate() {
            let parcel = inventory.parcel(draw.parcel);
            let quantity = Decimal::from(draw.quantity);

            // the last slice absorbs the rounding remainder of the sale fee
            let fee_share = if i == last {
                tx.fee - fee_allocated
            } else {
                pro_rata(tx.fee, draw.quantity, tx.quantity)
            };
            fee_allocated += fee_share;

            let proceeds = tx.price * quantity - fee_share;
            let gross_gain = proceeds - draw.cost_base;
            let holding_days = parcel.holding_days(tx.date);
            let discount_eligible = tax.is_discount_eligible(holding_days);

            events.push(CgtEvent {
                symbol: tx.symbol.clone(),
                parcel_id: parcel.id,
                sale_tx: tx.id,
                quantity: draw.quantity,
                acquired: parcel.acquired,
                disposed: tx.date,
                sale_price: tx.price,
                proceeds,
                cost_base: draw.cost_base,
                holding_days,
                discount_eligible,
                gross_gain,
                discounted_gain: tax.discounted(gross_gain, discount_eligible),
                method,
            });
        }

        self.events.extend(events);
        Ok(())
    }

    fn finish(self) -> ParcelBook {
        let parcels = self
            .assets
            .into_iter()
            .map(|(symbol, inventory)| (symbol, inventory.into_parcels()))
            .collect();
        ParcelBook {
            parcels,
            events: self.events,
        }
    }
}
