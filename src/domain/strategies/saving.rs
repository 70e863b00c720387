//! Saving plan: cash that only grows by scheduled deposits.

use crate::domain::error::SeqtraderError;
use crate::domain::fragment::{
    check_name, child_name, role_handle_with_first, Fragment, Role, SubRole,
};
use crate::domain::handle::SeriesHandle;
use crate::domain::operation::Operation;
use crate::domain::sequence::OpSequence;
use crate::domain::strategies::{check_amount, deposit_now, AlarmFragment, Deposit, ALARM_INPUT};
use crate::domain::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct SavingFragment {
    name: String,
    deposit: Option<Deposit>,
    alarm: Option<AlarmFragment>,
    handles: BTreeMap<Role, SeriesHandle>,
}

impl SavingFragment {
    pub fn new(name: &str, initial_cash: f64, deposit: Option<Deposit>) -> Result<Self, SeqtraderError> {
        check_name(name)?;
        check_amount(name, "initial_cash", initial_cash)?;
        let mut handles = BTreeMap::new();
        handles.insert(
            Role::Total,
            role_handle_with_first(name, Role::Total, initial_cash),
        );
        handles.insert(
            Role::Invested,
            role_handle_with_first(name, Role::Invested, initial_cash),
        );
        let alarm = deposit.map(|d| AlarmFragment::new(&child_name(name, SubRole::Alarm), d.alarm));
        Ok(Self {
            name: name.to_string(),
            deposit,
            alarm,
            handles,
        })
    }

    /// `x <- x[-2]` then `x <- x[-1] + deposit`.
    fn accumulate(&self, target: &SeriesHandle) -> Vec<Operation> {
        let carry = Operation::call(target.clone(), vec![("x", target.clone())], |i| {
            i.get("x")?.prev()
        });
        let Some(alarm) = &self.alarm else {
            return vec![carry];
        };
        let deposit = self.deposit;
        let add = Operation::call(
            target.clone(),
            vec![("x", target.clone()), (ALARM_INPUT, alarm.signal().clone())],
            move |i| Ok(Value::Num(i.get("x")?.f64_at(-1)? + deposit_now(i, deposit)?)),
        );
        vec![carry, add]
    }
}

impl Fragment for SavingFragment {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle> {
        &self.handles
    }

    fn children(&self) -> Vec<(SubRole, &dyn Fragment)> {
        self.alarm
            .iter()
            .map(|a| (SubRole::Alarm, a as &dyn Fragment))
            .collect()
    }

    fn own_ops(&self) -> OpSequence {
        let mut ops = self.accumulate(&self.handles[&Role::Total]);
        ops.extend(self.accumulate(&self.handles[&Role::Invested]));
        OpSequence::new(ops)
    }
}
