use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::str::FromStr;

use chrono::{DateTime, Local};
use cron::Schedule as CronSchedule;
use fetchd_core::config::Rule;

///
/// A `(nextFireTime, rule)` pair, min-ordered by fire time with insertion order as a
/// stable tie-breaker - two rules due at the same instant fire in the order they were
/// added, not in whatever order a hash map happened to iterate them.
///
pub struct ScheduleEntry {
    next_fire: DateTime<Local>,
    sequence: u64,
    pub rule: Rule,
}

impl ScheduleEntry {
    pub fn next_fire(&self) -> DateTime<Local> {
        self.next_fire
    }
}

impl PartialEq for ScheduleEntry {
    fn eq(&self, other: &Self) -> bool {
        self.next_fire == other.next_fire && self.sequence == other.sequence
    }
}
impl Eq for ScheduleEntry {}

impl Ord for ScheduleEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest fire time (and, on a tie, the
        // earliest insertion) sorts to the top.
        other.next_fire.cmp(&self.next_fire)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for ScheduleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///
/// Priority queue of due rules, ordered by next cron-evaluated fire time. At most one live
/// entry per rule exists at any instant: a rule's next entry is only added after its
/// current one is popped and re-triggered.
///
#[derive(Default)]
pub struct Schedule {
    heap: BinaryHeap<ScheduleEntry>,
    next_sequence: u64,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn peek(&self) -> Option<&ScheduleEntry> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<ScheduleEntry> {
        self.heap.pop()
    }

    ///
    /// Evaluate `rule`'s cron pattern against `base` (local time - cron scheduling is
    /// defined in terms of the machine's local clock) and insert it. Returns the computed
    /// fire time so callers can log it.
    ///
    pub fn add(&mut self, rule: Rule, base: DateTime<Local>) -> Result<DateTime<Local>, cron::error::Error> {
        let next_fire = next_fire_after(rule.cron_pattern(), base)?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduleEntry { next_fire, sequence, rule });
        Ok(next_fire)
    }
}

///
/// The next time `pattern` fires strictly after `base` - or exactly at `base` if the
/// pattern fires every second, matching the monotonicity property every other caller
/// (`add`, the tests) relies on.
///
pub fn next_fire_after(pattern: &str, base: DateTime<Local>) -> Result<DateTime<Local>, cron::error::Error> {
    let schedule = CronSchedule::from_str(pattern)?;
    Ok(schedule.after(&base).next().expect("cron schedule has no further occurrences"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchd_core::source::{empty::EmptySource, Source};

    fn rule(name: &str, cron: &str) -> Rule {
        Rule::new(name, cron, Source::Empty(EmptySource::default()))
    }

    #[test]
    fn schedule_monotonicity() {
        let base = Local::now();
        let next = next_fire_after("0 0 * * * *", base).unwrap();
        assert!(next > base);
    }

    #[test]
    fn pops_earliest_entry_first() {
        let mut schedule = Schedule::new();
        let base = Local::now();

        schedule.add(rule("hourly", "0 0 * * * *"), base).unwrap();
        schedule.add(rule("minutely", "0 * * * * *"), base).unwrap();

        let first = schedule.pop().unwrap();
        assert_eq!(first.rule.name(), "minutely");
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut schedule = Schedule::new();
        let base = Local::now();

        // Both rules fire every second, so they're due at (essentially) the same instant;
        // the earlier-added rule must come out first.
        schedule.add(rule("first", "* * * * * *"), base).unwrap();
        schedule.add(rule("second", "* * * * * *"), base).unwrap();

        assert_eq!(schedule.pop().unwrap().rule.name(), "first");
        assert_eq!(schedule.pop().unwrap().rule.name(), "second");
    }
}
