//! Money averaging: on every scheduled step, deposit and invest all cash.

use crate::domain::alarm::Alarm;
use crate::domain::error::SeqtraderError;
use crate::domain::fragment::{
    check_name, child_name, role_handle, role_handle_with_first, Fragment, Role, SubRole,
};
use crate::domain::handle::SeriesHandle;
use crate::domain::operation::Operation;
use crate::domain::sequence::OpSequence;
use crate::domain::strategies::{
    check_amount, deposit_now, AlarmFragment, Deposit, PriceFragment, ALARM_INPUT,
};
use crate::domain::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct MoneyAvgFragment {
    name: String,
    deposit: Option<Deposit>,
    alarm: AlarmFragment,
    price: PriceFragment,
    handles: BTreeMap<Role, SeriesHandle>,
}

impl MoneyAvgFragment {
    /// Deposits of `add_cash` and buys both happen on `alarm`. With no
    /// deposit the initial cash is invested on the first step and held.
    pub fn new(
        name: &str,
        src: SeriesHandle,
        initial_cash: f64,
        add_cash: f64,
        alarm: Alarm,
        slippage_pct: f64,
    ) -> Result<Self, SeqtraderError> {
        check_name(name)?;
        check_amount(name, "initial_cash", initial_cash)?;
        let deposit = Deposit::new(name, add_cash, alarm)?;
        let price = PriceFragment::new(&child_name(name, SubRole::Price), src, slippage_pct)?;
        let alarm = AlarmFragment::new(&child_name(name, SubRole::Alarm), alarm);

        let mut handles = BTreeMap::new();
        handles.insert(Role::Cash, role_handle_with_first(name, Role::Cash, initial_cash));
        handles.insert(Role::Asset, role_handle_with_first(name, Role::Asset, 0.0));
        handles.insert(
            Role::Invested,
            role_handle_with_first(name, Role::Invested, initial_cash),
        );
        handles.insert(Role::Total, role_handle(name, Role::Total));
        Ok(Self {
            name: name.to_string(),
            deposit,
            alarm,
            price,
            handles,
        })
    }

    fn h(&self, role: Role) -> SeriesHandle {
        self.handles[&role].clone()
    }
}

impl Fragment for MoneyAvgFragment {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle> {
        &self.handles
    }

    fn children(&self) -> Vec<(SubRole, &dyn Fragment)> {
        vec![
            (SubRole::Alarm, &self.alarm as &dyn Fragment),
            (SubRole::Price, &self.price as &dyn Fragment),
        ]
    }

    fn own_ops(&self) -> OpSequence {
        let deposit = self.deposit;
        let (cash, asset, invested, total) = (
            self.h(Role::Cash),
            self.h(Role::Asset),
            self.h(Role::Invested),
            self.h(Role::Total),
        );
        let signal = self.alarm.signal().clone();
        let buy = self.price.buy_price().clone();
        let sell = self.price.sell_price().clone();

        OpSequence::new(vec![
            // deposit
            Operation::call(
                cash.clone(),
                vec![("cash", cash.clone()), (ALARM_INPUT, signal.clone())],
                move |i| Ok(Value::Num(i.get("cash")?.f64_at(-2)? + deposit_now(i, deposit)?)),
            ),
            Operation::call(
                invested.clone(),
                vec![("invested", invested.clone()), (ALARM_INPUT, signal.clone())],
                move |i| {
                    Ok(Value::Num(
                        i.get("invested")?.f64_at(-2)? + deposit_now(i, deposit)?,
                    ))
                },
            ),
            // buy with everything on the alarm
            Operation::call(
                asset.clone(),
                vec![
                    ("asset", asset.clone()),
                    ("cash", cash.clone()),
                    ("buy", buy),
                    (ALARM_INPUT, signal.clone()),
                ],
                |i| {
                    let held = i.get("asset")?.f64_at(-2)?;
                    if !i.get(ALARM_INPUT)?.bool_at(-1)? {
                        return Ok(Value::Num(held));
                    }
                    Ok(Value::Num(
                        held + i.get("cash")?.f64_at(-1)? / i.get("buy")?.f64_at(-1)?,
                    ))
                },
            ),
            Operation::call(
                cash.clone(),
                vec![("cash", cash.clone()), (ALARM_INPUT, signal)],
                |i| {
                    if i.get(ALARM_INPUT)?.bool_at(-1)? {
                        Ok(Value::Num(0.0))
                    } else {
                        i.get("cash")?.last()
                    }
                },
            ),
            Operation::call(
                total,
                vec![("cash", cash), ("asset", asset), ("sell", sell)],
                |i| {
                    Ok(Value::Num(
                        i.get("cash")?.f64_at(-1)?
                            + i.get("asset")?.f64_at(-1)? * i.get("sell")?.f64_at(-1)?,
                    ))
                },
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::BacktestEngine;
    use crate::domain::table::Table;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn table(closes: &[f64], start: NaiveDate) -> Table {
        let index = (0..closes.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let mut t = Table::new(index);
        t.insert_raw(
            &SeriesHandle::new("SPX", "Close"),
            closes.iter().map(|c| Value::Num(*c)).collect(),
        )
        .unwrap();
        t
    }

    #[test]
    fn invests_initial_cash_on_first_step() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let frag = MoneyAvgFragment::new(
            "avg",
            SeriesHandle::new("SPX", "Close"),
            1000.0,
            0.0,
            Alarm::Monthly,
            0.0,
        )
        .unwrap();
        let mut engine =
            BacktestEngine::new_strict(table(&[100.0, 110.0, 120.0], start), vec![frag.ops()])
                .unwrap();
        let t = engine.run().unwrap();
        assert_relative_eq!(t.last(&frag.h(Role::Asset)).unwrap().as_f64().unwrap(), 10.0);
        assert_relative_eq!(t.last(&frag.h(Role::Cash)).unwrap().as_f64().unwrap(), 0.0);
        assert_eq!(frag.total(t).unwrap(), vec![1000.0, 1100.0, 1200.0]);
        assert_relative_eq!(frag.invested(t).unwrap(), 1000.0);
    }

    #[test]
    fn deposits_are_invested_at_buy_price() {
        // Jan 31 -> Feb 1 opens a new month
        let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let frag = MoneyAvgFragment::new(
            "avg",
            SeriesHandle::new("SPX", "Close"),
            900.0,
            100.0,
            Alarm::Monthly,
            1.0,
        )
        .unwrap();
        let mut engine = BacktestEngine::with_ops(table(&[100.0, 100.0], start), frag.ops()).unwrap();
        let t = engine.run().unwrap();

        // step 0: 1000 at 101, step 1: 100 more at 101
        let units = 1100.0 / 101.0;
        assert_relative_eq!(
            t.last(&frag.h(Role::Asset)).unwrap().as_f64().unwrap(),
            units,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            *frag.total(t).unwrap().last().unwrap(),
            units * 99.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(frag.invested(t).unwrap(), 1100.0);
    }

    #[test]
    fn ops_start_with_children() {
        let frag = MoneyAvgFragment::new(
            "avg",
            SeriesHandle::new("SPX", "Close"),
            1.0,
            0.0,
            Alarm::Weekly,
            0.0,
        )
        .unwrap();
        let outputs: Vec<String> = frag.ops().iter().map(|op| op.output().name()).collect();
        assert_eq!(outputs[0], "avg.alarm.signal");
        assert_eq!(outputs[1], "avg.price.buy_price");
        assert_eq!(outputs[2], "avg.price.sell_price");
        assert_eq!(outputs.last().unwrap(), "avg.total");
    }
}
