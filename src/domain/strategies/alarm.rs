//! Alarm fragment: a boolean column that is true on scheduled steps.

use crate::domain::alarm::Alarm;
use crate::domain::fragment::{role_handle, Fragment, Role};
use crate::domain::handle::SeriesHandle;
use crate::domain::operation::Operation;
use crate::domain::sequence::OpSequence;
use crate::domain::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct AlarmFragment {
    name: String,
    alarm: Alarm,
    handles: BTreeMap<Role, SeriesHandle>,
}

impl AlarmFragment {
    pub fn new(name: &str, alarm: Alarm) -> Self {
        let mut handles = BTreeMap::new();
        handles.insert(Role::Signal, role_handle(name, Role::Signal));
        Self {
            name: name.to_string(),
            alarm,
            handles,
        }
    }

    pub fn alarm(&self) -> Alarm {
        self.alarm
    }

    pub fn signal(&self) -> &SeriesHandle {
        &self.handles[&Role::Signal]
    }
}

impl Fragment for AlarmFragment {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self) -> &BTreeMap<Role, SeriesHandle> {
        &self.handles
    }

    fn own_ops(&self) -> OpSequence {
        let alarm = self.alarm;
        OpSequence::new(vec![Operation::call(
            self.signal().clone(),
            vec![("t", SeriesHandle::time())],
            move |i| {
                let t = i.get("t")?;
                let current = t.date_at(-1)?;
                let prev = if t.len() > 1 { Some(t.date_at(-2)?) } else { None };
                Ok(Value::Bool(alarm.is_triggered(prev, current)))
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::BacktestEngine;
    use crate::domain::table::Table;
    use chrono::NaiveDate;

    #[test]
    fn monthly_signal_over_a_year_of_days() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let index: Vec<NaiveDate> = (0..365).map(|i| start + chrono::Duration::days(i)).collect();
        let fragment = AlarmFragment::new("monthly", Alarm::Monthly);
        let mut engine = BacktestEngine::with_ops(Table::new(index), fragment.ops()).unwrap();
        let table = engine.run().unwrap();

        let fired: Vec<usize> = table
            .column(fragment.signal())
            .unwrap()
            .values()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.truthy())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(fired.len(), 12);
        assert_eq!(fired[0], 0);
        assert_eq!(fired[1], 31);
    }
}
