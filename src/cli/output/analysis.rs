use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Days, NaiveDate, TimeDelta};

use crate::{
    classifier::Category,
    daemon::storage::entities::{DailyStatistics, DailyStatsMap},
    utils::percentage::{
        duration_percentage, goal_progress, percentage_change, productivity_score, Percentage,
    },
};

/// Inclusive range of local dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new_opt(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// The range of the same length that ends right before this one.
    pub fn previous(&self) -> Option<Self> {
        let end = self.start.pred_opt()?;
        let start = end.checked_sub_days(Days::new(self.days() - 1))?;
        Some(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTotals {
    pub total_time: TimeDelta,
    pub productive_time: TimeDelta,
    pub unproductive_time: TimeDelta,
    pub neutral_time: TimeDelta,
    pub productivity_score: Percentage,
    pub sites_visited: usize,
}

impl PeriodTotals {
    pub fn time_for(&self, category: Category) -> TimeDelta {
        match category {
            Category::Productive => self.productive_time,
            Category::Unproductive => self.unproductive_time,
            Category::Neutral => self.neutral_time,
        }
    }
}

/// Stored values can be anything, a sum that doesn't fit stays at the maximum.
fn add_capped(current: TimeDelta, added: TimeDelta) -> TimeDelta {
    current.checked_add(&added).unwrap_or(TimeDelta::MAX)
}

/// Sums every day of a period. Domains are counted once no matter on how many days they show up.
pub fn period_totals<'a>(days: impl IntoIterator<Item = &'a DailyStatistics>) -> PeriodTotals {
    let mut total_time = TimeDelta::zero();
    let mut productive_time = TimeDelta::zero();
    let mut unproductive_time = TimeDelta::zero();
    let mut neutral_time = TimeDelta::zero();
    let mut sites = BTreeSet::new();

    for day in days {
        total_time = add_capped(total_time, day.total_time);
        productive_time = add_capped(productive_time, day.productive_time);
        unproductive_time = add_capped(unproductive_time, day.unproductive_time);
        neutral_time = add_capped(neutral_time, day.neutral_time);
        sites.extend(day.sites.keys().map(String::as_str));
    }

    PeriodTotals {
        total_time,
        productive_time,
        unproductive_time,
        neutral_time,
        productivity_score: productivity_score(productive_time, unproductive_time, total_time),
        sites_visited: sites.len(),
    }
}

/// Change of every headline number relative to the previous period, in whole percents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodChange {
    pub total_time: i64,
    pub productive_time: i64,
    pub productivity_score: i64,
    pub sites_visited: i64,
}

impl PeriodChange {
    pub fn between(previous: &PeriodTotals, current: &PeriodTotals) -> Self {
        let ms = |v: TimeDelta| v.num_milliseconds() as f64;
        Self {
            total_time: percentage_change(ms(previous.total_time), ms(current.total_time)),
            productive_time: percentage_change(
                ms(previous.productive_time),
                ms(current.productive_time),
            ),
            productivity_score: percentage_change(
                *previous.productivity_score,
                *current.productivity_score,
            ),
            sites_visited: percentage_change(
                previous.sites_visited as f64,
                current.sites_visited as f64,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteUsage {
    pub domain: String,
    pub time: TimeDelta,
    pub visits: u64,
    pub category: Category,
    pub share: Percentage,
}

/// Site statistics merged across days, most time first. Sites below `min_percentage` of the
/// period are left out. The category is the one seen on the earliest day.
pub fn top_sites<'a>(
    days: impl IntoIterator<Item = &'a DailyStatistics>,
    min_percentage: Percentage,
    limit: usize,
) -> Vec<SiteUsage> {
    let mut map = HashMap::<&str, SiteUsage>::new();
    let mut total = TimeDelta::zero();

    for day in days {
        total = add_capped(total, day.total_time);
        for (domain, site) in &day.sites {
            let usage = map.entry(domain.as_str()).or_insert_with(|| SiteUsage {
                domain: domain.clone(),
                time: TimeDelta::zero(),
                visits: 0,
                category: site.category,
                share: Percentage::ZERO,
            });
            usage.time = add_capped(usage.time, site.time);
            usage.visits = usage.visits.saturating_add(site.visits);
        }
    }

    let mut usages = map
        .into_values()
        .map(|mut usage| {
            usage.share = duration_percentage(usage.time, total);
            usage
        })
        .filter(|usage| usage.share >= min_percentage)
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.domain.cmp(&b.domain)));
    usages.truncate(limit);
    usages
}

/// Monday of the week `date` falls into.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
}

/// Totals of every Monday-start week that has recorded days inside `range`, earliest first. The
/// first and last weeks only count the days that fall into the range.
pub fn weekly_breakdown(
    daily_stats: &DailyStatsMap,
    range: DateRange,
) -> Vec<(NaiveDate, PeriodTotals)> {
    let mut weeks = BTreeMap::<NaiveDate, Vec<&DailyStatistics>>::new();
    for (date, day) in daily_stats.range(range.start..=range.end) {
        if let Some(start) = week_start(*date) {
            weeks.entry(start).or_default().push(day);
        }
    }
    weeks
        .into_iter()
        .map(|(start, days)| (start, period_totals(days)))
        .collect()
}

/// The last seven days of `range` against the seven days before them.
fn weekly_change(daily_stats: &DailyStatsMap, range: DateRange) -> PeriodChange {
    let totals = |week: Option<DateRange>| match week {
        Some(week) => period_totals(daily_stats.range(week.start..=week.end).map(|(_, day)| day)),
        None => period_totals([]),
    };
    let current = range
        .end
        .checked_sub_days(Days::new(6))
        .and_then(|start| DateRange::new_opt(start, range.end));
    let previous = current.and_then(|week| week.previous());
    PeriodChange::between(&totals(previous), &totals(current))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSummary {
    pub range: DateRange,
    pub current: PeriodTotals,
    pub previous: PeriodTotals,
    pub change: PeriodChange,
    /// Time spent against `goal` for every day of the range.
    pub goal_progress: Percentage,
    pub most_productive_day: Option<(NaiveDate, Percentage)>,
    pub top_sites: Vec<SiteUsage>,
    pub weeks: Vec<(NaiveDate, PeriodTotals)>,
    pub weekly_change: PeriodChange,
}

pub struct SummaryOptions {
    pub goal: TimeDelta,
    pub min_percentage: Percentage,
    pub top: usize,
}

pub fn summarize(
    daily_stats: &DailyStatsMap,
    range: DateRange,
    options: &SummaryOptions,
) -> RangeSummary {
    let in_range = move |range: DateRange| {
        daily_stats
            .range(range.start..=range.end)
            .map(|(_, day)| day)
    };

    let current = period_totals(in_range(range));
    let previous = range
        .previous()
        .map(|previous| period_totals(in_range(previous)))
        .unwrap_or_else(|| period_totals([]));

    let progress = i32::try_from(range.days())
        .ok()
        .and_then(|days| options.goal.checked_mul(days))
        .map_or(Percentage::ZERO, |goal| goal_progress(current.total_time, goal));

    let most_productive_day = daily_stats
        .range(range.start..=range.end)
        .map(|(date, day)| {
            (
                *date,
                productivity_score(day.productive_time, day.unproductive_time, day.total_time),
            )
        })
        .filter(|(_, score)| *score > Percentage::ZERO)
        // Earliest day wins a tie.
        .fold(None, |best: Option<(NaiveDate, Percentage)>, candidate| match best {
            Some(best) if best.1 >= candidate.1 => Some(best),
            _ => Some(candidate),
        });

    RangeSummary {
        range,
        change: PeriodChange::between(&previous, &current),
        goal_progress: progress,
        most_productive_day,
        top_sites: top_sites(in_range(range), options.min_percentage, options.top),
        weeks: weekly_breakdown(daily_stats, range),
        weekly_change: weekly_change(daily_stats, range),
        current,
        previous,
    }
}
