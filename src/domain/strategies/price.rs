//! Execution prices with symmetric percentage slippage.

use crate::domain::error::SeqtraderError;
use crate::domain::fragment::{role_handle, Fragment, Role};
use crate::domain::handle::SeriesHandle;
use crate::domain::operation::Operation;
use crate::domain::sequence::OpSequence;
use crate::domain::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PriceFragment {
    name: String,
    slippage_pct: f64,
    handles: BTreeMap<Role, SeriesHandle>,
}

impl PriceFragment {
    /// `src` is the raw price column, typically `(ticker, Close)`.
    pub fn new(name: &str, src: SeriesHandle, slippage_pct: f64) -> Result<Self, SeqtraderError> {
        if !slippage_pct.is_finite() || !(0.0..100.0).contains(&slippage_pct) {
            return Err(SeqtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "slippage_pct".into(),
                reason: format!("slippage must be in [0, 100), got {}", slippage_pct),
            });
        }
        let mut handles = BTreeMap::new();
        handles.insert(Role::Src, src);
        handles.insert(Role::BuyPrice, role_handle(name, Role::BuyPrice));
        handles.insert(Role::SellPrice, role_handle(name, Role::SellPrice));
        Ok(Self {
            name: name.to_string(),
            slippage_pct,
            handles,
        })
    }

    pub fn slippage_pct(&self) -> f64 {
        self.slippage_pct
    }

    pub fn src(&self) -> &SeriesHandle {
        &self.handles[&Role::Src]
    }

    pub fn buy_price(&self) -> &SeriesHandle {
        &self.handles[&Role::BuyPrice]
    }

    pub fn sell_price(&self) -> &SeriesHandle {
        &self.handles[&Role::SellPrice]
    }

    fn scaled(&self, output: &SeriesHandle, factor: f64) -> Operation {
        Operation::call(output.clone(), vec![("src", self.src().clone())], move |i| {
            Ok(Value::Num(i.get("src")?.f64_at(-1)? * factor))
        })
    }
}

impl Fragment for PriceFragment {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle> {
        &self.handles
    }

    fn own_ops(&self) -> OpSequence {
        OpSequence::new(vec![
            self.scaled(self.buy_price(), (100.0 + self.slippage_pct) / 100.0),
            self.scaled(self.sell_price(), (100.0 - self.slippage_pct) / 100.0),
        ])
    }
}
