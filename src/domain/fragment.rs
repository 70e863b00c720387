//! Strategy fragment contract.
//!
//! A fragment owns a set of handles keyed by [`Role`], may compose nested
//! fragments keyed by [`SubRole`], and emits the operations that maintain
//! its handles. Composition is by whole-fragment concatenation: children
//! first, in sub-role order, then the fragment's own operations.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::SeriesHandle;
use crate::domain::sequence::OpSequence;
use crate::domain::table::Table;
use crate::domain::value::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Total,
    Cash,
    Asset,
    Invested,
    Signal,
    Src,
    BuyPrice,
    SellPrice,
    Position,
    ShortUnits,
    LongEntryFastSma,
    LongEntrySlowSma,
    LongExitFastSma,
    LongExitSlowSma,
    ShortEntryFastSma,
    ShortEntrySlowSma,
    ShortExitFastSma,
    ShortExitSlowSma,
    LongEntry,
    LongExit,
    ShortEntry,
    ShortExit,
}

impl Role {
    /// Field name used for the role's column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Total => "total",
            Role::Cash => "cash",
            Role::Asset => "asset",
            Role::Invested => "invested",
            Role::Signal => "signal",
            Role::Src => "src",
            Role::BuyPrice => "buy_price",
            Role::SellPrice => "sell_price",
            Role::Position => "position",
            Role::ShortUnits => "short_units",
            Role::LongEntryFastSma => "long_entry_fast_sma",
            Role::LongEntrySlowSma => "long_entry_slow_sma",
            Role::LongExitFastSma => "long_exit_fast_sma",
            Role::LongExitSlowSma => "long_exit_slow_sma",
            Role::ShortEntryFastSma => "short_entry_fast_sma",
            Role::ShortEntrySlowSma => "short_entry_slow_sma",
            Role::ShortExitFastSma => "short_exit_fast_sma",
            Role::ShortExitSlowSma => "short_exit_slow_sma",
            Role::LongEntry => "long_entry",
            Role::LongExit => "long_exit",
            Role::ShortEntry => "short_entry",
            Role::ShortExit => "short_exit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubRole {
    Alarm,
    Price,
}

impl SubRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubRole::Alarm => "alarm",
            SubRole::Price => "price",
        }
    }
}

impl fmt::Display for SubRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group name of a child fragment, namespaced under its parent.
pub fn child_name(parent: &str, sub: SubRole) -> String {
    format!("{}.{}", parent, sub)
}

/// Handle owned by fragment `name` for `role`.
pub fn role_handle(name: &str, role: Role) -> SeriesHandle {
    SeriesHandle::new(name, role.as_str())
}

pub fn role_handle_with_first(name: &str, role: Role, first: impl Into<Value>) -> SeriesHandle {
    SeriesHandle::with_first_value(name, role.as_str(), first)
}

pub fn check_name(name: &str) -> Result<(), SeqtraderError> {
    if name.trim().is_empty() {
        return Err(SeqtraderError::ConfigInvalid {
            section: "strategies".into(),
            key: "names".into(),
            reason: "fragment name must not be empty".into(),
        });
    }
    Ok(())
}

pub trait Fragment {
    fn name(&self) -> &str;

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle>;

    fn children(&self) -> Vec<(SubRole, &dyn Fragment)> {
        Vec::new()
    }

    /// Operations maintaining this fragment's own handles.
    fn own_ops(&self) -> OpSequence;

    fn ops(&self) -> OpSequence {
        let mut children = self.children();
        children.sort_by_key(|(sub, _)| *sub);
        children
            .into_iter()
            .fold(OpSequence::default(), |acc, (_, child)| acc + child.ops())
            + self.own_ops()
    }

    fn handle(&self, role: Role) -> Result<&SeriesHandle, SeqtraderError> {
        self.handles()
            .get(&role)
            .ok_or_else(|| SeqtraderError::ConfigMissing {
                section: self.name().to_string(),
                key: role.as_str().to_string(),
            })
    }

    /// The `Total` column after a run.
    fn total(&self, table: &Table) -> Result<Vec<f64>, SeqtraderError> {
        table.values_f64(self.handle(Role::Total)?)
    }

    /// Capital paid in so far: initial cash plus deposits.
    fn invested(&self, table: &Table) -> Result<f64, SeqtraderError> {
        let handle = self.handle(Role::Invested)?;
        match table.last(handle)? {
            Value::Missing => handle
                .first_value()
                .map(|v| v.as_f64())
                .unwrap_or(Ok(0.0)),
            v => v.as_f64(),
        }
    }

    /// `role -> group.field` lines for this fragment and its children.
    fn debug_handles(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .handles()
            .iter()
            .map(|(role, handle)| format!("{}: {} -> {}", self.name(), role, handle))
            .collect();
        for (_, child) in self.children() {
            lines.extend(child.debug_handles());
        }
        lines
    }
}
