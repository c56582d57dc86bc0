use std::collections::VecDeque;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::accounting::{pro_rata, MatchingPolicy, Parcel};
use crate::error::TaxError;

/// A slice taken out of one parcel by a withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub parcel: usize,
    pub quantity: u64,
    pub cost_base: Decimal,
}

/// Parcels held in one symbol. `parcels` keeps every lot in acquisition
/// order; `layers` indexes the open ones in the order they get consumed.
pub struct Inventory {
    symbol: String,
    parcels: Vec<Parcel>,
    layers: VecDeque<usize>,
    method: MatchingPolicy,
}

impl Inventory {
    pub fn new(symbol: &str, method: MatchingPolicy) -> Inventory {
        Inventory {
            symbol: symbol.to_string(),
            parcels: Vec::new(),
            layers: VecDeque::new(),
            method,
        }
    }

    pub fn deposit(&mut self, parcel: Parcel) {
        let index = self.parcels.len();
        self.parcels.push(parcel);

        // add layer to inventory
        match self.method {
            MatchingPolicy::Fifo => self.layers.push_back(index),
            MatchingPolicy::Lifo => self.layers.push_front(index),
        };
    }

    pub fn available(&self) -> u64 {
        self.layers
            .iter()
            .map(|&i| self.parcels[i].remaining_quantity)
            .sum()
    }

    pub fn parcel(&self, index: usize) -> &Parcel {
        &self.parcels[index]
    }

    pub fn into_parcels(self) -> Vec<Parcel> {
        self.parcels
    }

    /// Draws `quantity` shares layer by layer. Nothing is touched when the
    /// open layers cannot cover the whole amount.
    pub fn withdraw(&mut self, quantity: u64, date: NaiveDate) -> Result<Vec<Draw>, TaxError> {
        let available = self.available();
        if quantity > available {
            return Err(TaxError::InsufficientParcels {
                symbol: self.symbol.clone(),
                date,
                requested: quantity,
                available,
            });
        }

        let mut res: Vec<Draw> = Vec::new();
        let mut remaining = quantity;

        while remaining > 0 {
            let index = match self.layers.front() {
                Some(&index) => index,
                None => break,
            };
            let layer = &mut self.parcels[index];
            let amount = remaining.min(layer.remaining_quantity);

            // the draw that empties a layer takes whatever cost is left on it
            let cost_base = if amount == layer.remaining_quantity {
                layer.remaining_cost
            } else {
                pro_rata(layer.total_cost, amount, layer.original_quantity)
            };

            layer.remaining_quantity -= amount;
            layer.remaining_cost -= cost_base;
            if layer.remaining_quantity == 0 {
                self.layers.pop_front();
            }

            res.push(Draw {
                parcel: index,
                quantity: amount,
                cost_base,
            });
            remaining -= amount;
        }

        Ok(res)
    }
}
