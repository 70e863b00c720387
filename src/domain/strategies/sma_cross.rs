//! Moving-average crossover with long and short legs.
//!
//! Per step the fragment computes up to eight SMAs of the source price, the
//! four edge-triggered cross signals, the position transition and finally
//! the book (cash, held units, shorted units) and its total value.

use crate::domain::error::SeqtraderError;
use crate::domain::fragment::{
    check_name, child_name, role_handle, role_handle_with_first, Fragment, Role, SubRole,
};
use crate::domain::handle::SeriesHandle;
use crate::domain::indicator::IndicatorType;
use crate::domain::lookback::LookbackView;
use crate::domain::operation::{Inputs, Operation};
use crate::domain::sequence::OpSequence;
use crate::domain::strategies::{
    check_amount, deposit_now, AlarmFragment, Deposit, PriceFragment, ALARM_INPUT,
};
use crate::domain::value::Value;
use std::collections::BTreeMap;

/// Moving-average windows per leg; a window of 0 disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmaCrossParams {
    /// Use exponential instead of simple averages.
    pub exponential: bool,
    pub long_entry_fast: usize,
    pub long_entry_slow: usize,
    pub long_exit_fast: usize,
    pub long_exit_slow: usize,
    pub short_entry_fast: usize,
    pub short_entry_slow: usize,
    pub short_exit_fast: usize,
    pub short_exit_slow: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    /// fast goes from at-or-below slow to strictly above
    Above,
    /// fast goes from at-or-above slow to strictly below
    Below,
}

struct Leg {
    signal: Role,
    fast: (Role, usize),
    slow: (Role, usize),
    cross: Cross,
}

impl SmaCrossParams {
    fn legs(&self) -> [Leg; 4] {
        [
            Leg {
                signal: Role::LongEntry,
                fast: (Role::LongEntryFastSma, self.long_entry_fast),
                slow: (Role::LongEntrySlowSma, self.long_entry_slow),
                cross: Cross::Above,
            },
            Leg {
                signal: Role::LongExit,
                fast: (Role::LongExitFastSma, self.long_exit_fast),
                slow: (Role::LongExitSlowSma, self.long_exit_slow),
                cross: Cross::Below,
            },
            Leg {
                signal: Role::ShortEntry,
                fast: (Role::ShortEntryFastSma, self.short_entry_fast),
                slow: (Role::ShortEntrySlowSma, self.short_entry_slow),
                cross: Cross::Below,
            },
            Leg {
                signal: Role::ShortExit,
                fast: (Role::ShortExitFastSma, self.short_exit_fast),
                slow: (Role::ShortExitSlowSma, self.short_exit_slow),
                cross: Cross::Above,
            },
        ]
    }

    /// Each leg must be fully disabled or have `0 < fast < slow`.
    pub fn validate(&self, section: &str) -> Result<(), SeqtraderError> {
        for leg in self.legs() {
            let (fast_role, fast) = leg.fast;
            let (slow_role, slow) = leg.slow;
            let invalid = |key: Role, reason: String| SeqtraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.as_str().to_string(),
                reason,
            };
            match (fast, slow) {
                (0, 0) => {}
                (0, _) => {
                    return Err(invalid(
                        fast_role,
                        format!("{} is set but {} is not", slow_role, fast_role),
                    ))
                }
                (_, 0) => {
                    return Err(invalid(
                        slow_role,
                        format!("{} is set but {} is not", fast_role, slow_role),
                    ))
                }
                (f, s) if f >= s => {
                    return Err(invalid(
                        fast_role,
                        format!("fast window {} must be shorter than slow window {}", f, s),
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Whether `fast` crossed `slow` between the previous and the current step.
///
/// Never true at the first step. Missing values never cross.
pub fn crossed(
    fast: &LookbackView<'_>,
    slow: &LookbackView<'_>,
    cross: Cross,
) -> Result<bool, SeqtraderError> {
    if fast.len() < 2 || slow.len() < 2 {
        return Ok(false);
    }
    let (pf, cf) = (fast.f64_at(-2)?, fast.f64_at(-1)?);
    let (ps, cs) = (slow.f64_at(-2)?, slow.f64_at(-1)?);
    Ok(match cross {
        Cross::Above => pf <= ps && cf > cs,
        Cross::Below => pf >= ps && cf < cs,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Short,
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub long_entry: bool,
    pub long_exit: bool,
    pub short_entry: bool,
    pub short_exit: bool,
}

impl Position {
    pub fn from_f64(value: f64) -> Self {
        if value > 0.0 {
            Position::Long
        } else if value < 0.0 {
            Position::Short
        } else {
            Position::Flat
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Position::Short => -1.0,
            Position::Flat => 0.0,
            Position::Long => 1.0,
        }
    }

    /// Apply one step's signals. Combinations not listed are no-ops; an
    /// exit never re-enters on the same step.
    pub fn next(self, s: Signals) -> Result<Position, &'static str> {
        match self {
            Position::Flat => match (s.long_entry, s.short_entry) {
                (true, true) => Err("long entry and short entry on the same step"),
                (true, false) => Ok(Position::Long),
                (false, true) => Ok(Position::Short),
                (false, false) => Ok(Position::Flat),
            },
            Position::Long => match (s.long_entry, s.long_exit) {
                (true, true) => Err("long entry and long exit on the same step"),
                (_, true) => Ok(Position::Flat),
                _ => Ok(Position::Long),
            },
            Position::Short => match (s.short_entry, s.short_exit) {
                (true, true) => Err("short entry and short exit on the same step"),
                (_, true) => Ok(Position::Flat),
                _ => Ok(Position::Short),
            },
        }
    }
}

/// Account state carried between steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Book {
    pub cash: f64,
    pub asset: f64,
    pub short_units: f64,
}

impl Book {
    /// Settle a step: deposit, close, open, then sweep cash while long.
    pub fn settle(
        self,
        from: Position,
        to: Position,
        deposit: f64,
        buy: f64,
        sell: f64,
    ) -> Book {
        let mut book = self;
        book.cash += deposit;
        match (from, to) {
            (Position::Long, Position::Flat) => {
                book.cash += book.asset * sell;
                book.asset = 0.0;
            }
            (Position::Short, Position::Flat) => {
                book.cash -= book.short_units * buy;
                book.short_units = 0.0;
            }
            (Position::Flat, Position::Short) => {
                let units = book.cash / sell;
                book.short_units += units;
                book.cash += units * sell;
            }
            _ => {}
        }
        if to == Position::Long && book.cash > 0.0 {
            book.asset += book.cash / buy;
            book.cash = 0.0;
        }
        book
    }

    pub fn value(&self, buy: f64, sell: f64) -> f64 {
        self.cash + self.asset * sell - self.short_units * buy
    }
}

#[derive(Debug, Clone)]
pub struct SmaCrossFragment {
    name: String,
    params: SmaCrossParams,
    deposit: Option<Deposit>,
    alarm: Option<AlarmFragment>,
    price: PriceFragment,
    handles: BTreeMap<Role, SeriesHandle>,
}

impl SmaCrossFragment {
    pub fn new(
        name: &str,
        src: SeriesHandle,
        params: SmaCrossParams,
        initial_cash: f64,
        deposit: Option<Deposit>,
        slippage_pct: f64,
    ) -> Result<Self, SeqtraderError> {
        check_name(name)?;
        check_amount(name, "initial_cash", initial_cash)?;
        params.validate(name)?;
        let price = PriceFragment::new(&child_name(name, SubRole::Price), src, slippage_pct)?;
        let alarm = deposit.map(|d| AlarmFragment::new(&child_name(name, SubRole::Alarm), d.alarm));

        let mut handles = BTreeMap::new();
        for leg in params.legs() {
            handles.insert(leg.signal, role_handle(name, leg.signal));
            handles.insert(leg.fast.0, role_handle(name, leg.fast.0));
            handles.insert(leg.slow.0, role_handle(name, leg.slow.0));
        }
        handles.insert(Role::Position, role_handle_with_first(name, Role::Position, 0.0));
        handles.insert(Role::Cash, role_handle_with_first(name, Role::Cash, initial_cash));
        handles.insert(Role::Asset, role_handle_with_first(name, Role::Asset, 0.0));
        handles.insert(
            Role::ShortUnits,
            role_handle_with_first(name, Role::ShortUnits, 0.0),
        );
        handles.insert(
            Role::Invested,
            role_handle_with_first(name, Role::Invested, initial_cash),
        );
        handles.insert(Role::Total, role_handle(name, Role::Total));

        Ok(Self {
            name: name.to_string(),
            params,
            deposit,
            alarm,
            price,
            handles,
        })
    }

    pub fn params(&self) -> &SmaCrossParams {
        &self.params
    }

    fn h(&self, role: Role) -> SeriesHandle {
        self.handles[&role].clone()
    }

    fn with_alarm(&self, mut inputs: Vec<(&'static str, SeriesHandle)>) -> Vec<(&'static str, SeriesHandle)> {
        if let Some(alarm) = &self.alarm {
            inputs.push((ALARM_INPUT, alarm.signal().clone()));
        }
        inputs
    }

    fn sma_ops(&self) -> Vec<Operation> {
        let src = self.price.src().clone();
        self.params
            .legs()
            .iter()
            .flat_map(|leg| [leg.fast, leg.slow])
            .map(|(role, window)| {
                if window == 0 {
                    return Operation::set(self.h(role), Value::Missing);
                }
                let average = if self.params.exponential {
                    IndicatorType::Ema(window)
                } else {
                    IndicatorType::Sma(window)
                };
                Operation::call(
                    self.h(role),
                    vec![("src", src.clone()), ("own", self.h(role))],
                    move |i| average.last_value(i.get("src")?, i.get("own")?),
                )
            })
            .collect()
    }

    fn signal_ops(&self) -> Vec<Operation> {
        self.params
            .legs()
            .into_iter()
            .map(|leg| {
                if leg.fast.1 == 0 {
                    return Operation::set(self.h(leg.signal), false);
                }
                let cross = leg.cross;
                Operation::call(
                    self.h(leg.signal),
                    vec![("fast", self.h(leg.fast.0)), ("slow", self.h(leg.slow.0))],
                    move |i| Ok(Value::Bool(crossed(i.get("fast")?, i.get("slow")?, cross)?)),
                )
            })
            .collect()
    }

    fn position_op(&self) -> Operation {
        let name = self.name.clone();
        let position = self.h(Role::Position);
        Operation::call(
            position.clone(),
            vec![
                ("position", position),
                ("long_entry", self.h(Role::LongEntry)),
                ("long_exit", self.h(Role::LongExit)),
                ("short_entry", self.h(Role::ShortEntry)),
                ("short_exit", self.h(Role::ShortExit)),
                ("t", SeriesHandle::time()),
            ],
            move |i| {
                let from = Position::from_f64(i.get("position")?.f64_at(-2)?);
                let signals = Signals {
                    long_entry: i.get("long_entry")?.bool_at(-1)?,
                    long_exit: i.get("long_exit")?.bool_at(-1)?,
                    short_entry: i.get("short_entry")?.bool_at(-1)?,
                    short_exit: i.get("short_exit")?.bool_at(-1)?,
                };
                let to = from.next(signals).map_err(|reason| {
                    match i.get("t").and_then(|t| t.date_at(-1)) {
                        Ok(date) => SeqtraderError::AmbiguousSignal {
                            fragment: name.clone(),
                            date,
                            reason: reason.to_string(),
                        },
                        Err(e) => e,
                    }
                })?;
                Ok(Value::Num(to.as_f64()))
            },
        )
    }

    /// Carry the book forward, then settle each of its columns from the
    /// previous step's book.
    fn book_ops(&self) -> Vec<Operation> {
        let deposit = self.deposit;
        let book_inputs = self.with_alarm(vec![
            ("position", self.h(Role::Position)),
            ("cash", self.h(Role::Cash)),
            ("asset", self.h(Role::Asset)),
            ("short_units", self.h(Role::ShortUnits)),
            ("buy", self.price.buy_price().clone()),
            ("sell", self.price.sell_price().clone()),
        ]);

        let mut ops: Vec<Operation> = [Role::Cash, Role::Asset, Role::ShortUnits]
            .into_iter()
            .map(|role| {
                Operation::call(self.h(role), vec![("x", self.h(role))], |i| {
                    i.get("x")?.prev()
                })
            })
            .collect();

        let settled = move |i: &Inputs<'_>| -> Result<Book, SeqtraderError> {
            let before = Book {
                cash: i.get("cash")?.f64_at(-2)?,
                asset: i.get("asset")?.f64_at(-2)?,
                short_units: i.get("short_units")?.f64_at(-2)?,
            };
            let position = i.get("position")?;
            Ok(before.settle(
                Position::from_f64(position.f64_at(-2)?),
                Position::from_f64(position.f64_at(-1)?),
                deposit_now(i, deposit)?,
                i.get("buy")?.f64_at(-1)?,
                i.get("sell")?.f64_at(-1)?,
            ))
        };
        ops.push(Operation::call(self.h(Role::Cash), book_inputs.clone(), move |i| {
            Ok(Value::Num(settled(i)?.cash))
        }));
        ops.push(Operation::call(self.h(Role::Asset), book_inputs.clone(), move |i| {
            Ok(Value::Num(settled(i)?.asset))
        }));
        ops.push(Operation::call(self.h(Role::ShortUnits), book_inputs, move |i| {
            Ok(Value::Num(settled(i)?.short_units))
        }));

        let invested = self.h(Role::Invested);
        ops.push(Operation::call(
            invested.clone(),
            self.with_alarm(vec![("invested", invested)]),
            move |i| Ok(Value::Num(i.get("invested")?.f64_at(-2)? + deposit_now(i, deposit)?)),
        ));

        ops.push(Operation::call(
            self.h(Role::Total),
            vec![
                ("cash", self.h(Role::Cash)),
                ("asset", self.h(Role::Asset)),
                ("short_units", self.h(Role::ShortUnits)),
                ("buy", self.price.buy_price().clone()),
                ("sell", self.price.sell_price().clone()),
            ],
            |i| {
                let book = Book {
                    cash: i.get("cash")?.f64_at(-1)?,
                    asset: i.get("asset")?.f64_at(-1)?,
                    short_units: i.get("short_units")?.f64_at(-1)?,
                };
                Ok(Value::Num(
                    book.value(i.get("buy")?.f64_at(-1)?, i.get("sell")?.f64_at(-1)?),
                ))
            },
        ));
        ops
    }
}

impl Fragment for SmaCrossFragment {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle> {
        &self.handles
    }

    fn children(&self) -> Vec<(SubRole, &dyn Fragment)> {
        let mut children: Vec<(SubRole, &dyn Fragment)> =
            vec![(SubRole::Price, &self.price as &dyn Fragment)];
        if let Some(alarm) = &self.alarm {
            children.push((SubRole::Alarm, alarm as &dyn Fragment));
        }
        children
    }

    fn own_ops(&self) -> OpSequence {
        let mut ops = self.sma_ops();
        ops.extend(self.signal_ops());
        ops.push(self.position_op());
        ops.extend(self.book_ops());
        OpSequence::new(ops)
    }
}
