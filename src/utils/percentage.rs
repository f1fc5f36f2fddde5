use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;
use chrono::TimeDelta;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub const ZERO: Percentage = Percentage(0.);

    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` taken by `value`. An empty whole has no share at all.
pub fn duration_percentage(value: TimeDelta, whole: TimeDelta) -> Percentage {
    if whole <= TimeDelta::zero() {
        return Percentage::ZERO;
    }
    let share = value.num_milliseconds() as f64 / whole.num_milliseconds() as f64 * 100.;
    Percentage::new_opt(share).unwrap_or(Percentage::ZERO)
}

/// Productive time counts fully, unproductive time takes away half its weight. The result is
/// rounded and kept inside 0..=100.
pub fn productivity_score(
    productive: TimeDelta,
    unproductive: TimeDelta,
    total: TimeDelta,
) -> Percentage {
    if total <= TimeDelta::zero() {
        return Percentage::ZERO;
    }
    let weighted = productive.num_milliseconds() as f64 - unproductive.num_milliseconds() as f64 * 0.5;
    let score = (weighted / total.num_milliseconds() as f64 * 100.).round();
    Percentage(score.clamp(0., 100.))
}

/// Progress towards a daily goal, capped at 100%.
pub fn goal_progress(spent: TimeDelta, goal: TimeDelta) -> Percentage {
    let progress = *duration_percentage(spent, goal);
    Percentage(progress.min(100.))
}

/// Relative change between two periods in whole percents. Can be negative, so it's a plain
/// integer instead of a [Percentage].
pub fn percentage_change(old: f64, new: f64) -> i64 {
    if old == 0. {
        return if new > 0. { 100 } else { 0 };
    }
    ((new - old) / old * 100.).round() as i64
}
