use std::{fmt::Display, path::Path};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::debug;

use crate::{
    daemon::storage::store::JsonFileStore,
    utils::{percentage::Percentage, time::date_key},
};

use super::{
    output::{
        analysis::{summarize, DateRange, RangeSummary, SummaryOptions},
        format_duration, load_snapshot, Painter,
    },
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct SummaryCommand {
    #[arg(
        long = "start",
        short,
        help = "First day of the range. Examples are \"yesterday\", \"7 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of the range, included. Examples are \"today\", \"yesterday\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, default_value_t = 10, help = "How many sites to list")]
    top: usize,
    #[arg(short = 'p', long = "percentage", help = "Filter sites to have at least specified percentage", default_value_t = Percentage::ZERO)]
    min_percentage: Percentage,
}

/// Command to process `summary`. Prints headline numbers for a range of days, compares them with
/// the range of the same length right before it and lists the sites that took the most time.
pub async fn process_summary_command(
    SummaryCommand {
        start_date,
        end_date,
        date_style,
        top,
        min_percentage,
    }: SummaryCommand,
    dir: &Path,
) -> Result<()> {
    let range = parse_range(start_date, end_date, date_style)?;
    debug!("Summary for {range:?}");

    let store = JsonFileStore::new(dir.to_path_buf())?;
    let (snapshot, settings) = load_snapshot(&store).await?;

    let summary = summarize(
        &snapshot.daily_stats,
        range,
        &SummaryOptions {
            goal: settings.productivity_goal,
            min_percentage,
            top,
        },
    );
    print_summary(&summary, &Painter::for_stdout());
    Ok(())
}

/// Both ends default to today.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<DateRange> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();
    let parse = |value: Option<String>, name: &str| -> Result<NaiveDate> {
        match value.map(|s| parse_date_string(&s, now, dialect)) {
            Some(Ok(v)) => Ok(v.date_naive()),
            Some(Err(e)) => Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate {name} date {e}"),
                )
                .into()),
            None => Ok(now.date_naive()),
        }
    };
    let start = parse(start_date, "start")?;
    let end = parse(end_date, "end")?;

    DateRange::new_opt(start, end).ok_or_else(|| {
        Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Start {} is after end {}", date_key(start), date_key(end)),
            )
            .into()
    })
}

fn print_summary(summary: &RangeSummary, painter: &Painter) {
    let RangeSummary {
        range,
        current,
        change,
        ..
    } = summary;

    if range.start == range.end {
        println!("{}", painter.heading(&date_key(range.start)));
    } else {
        println!(
            "{}",
            painter.heading(&format!("{} - {}", date_key(range.start), date_key(range.end)))
        );
    }

    println!(
        "Total time\t{}\t{} vs previous period",
        format_duration(current.total_time),
        painter.change(change.total_time)
    );
    println!(
        "Productive\t{}\t{} vs previous period",
        format_duration(current.productive_time),
        painter.change(change.productive_time)
    );
    println!("Unproductive\t{}", format_duration(current.unproductive_time));
    println!("Neutral\t\t{}", format_duration(current.neutral_time));
    println!(
        "Productivity\t{:.0}%\t{} vs previous period",
        *current.productivity_score,
        painter.change(change.productivity_score)
    );
    println!(
        "Sites visited\t{}\t{} vs previous period",
        current.sites_visited,
        painter.change(change.sites_visited)
    );
    println!("Daily goal\t{:.0}%", *summary.goal_progress);
    if let Some((date, score)) = summary.most_productive_day {
        println!("Best day\t{}\t{:.0}%", date_key(date), *score);
    }

    if summary.weeks.len() > 1 {
        println!(
            "Last 7 days\t{} productivity\t{} focus time vs the 7 before",
            painter.change(summary.weekly_change.productivity_score),
            painter.change(summary.weekly_change.productive_time)
        );
        println!();
        println!("{}", painter.heading("Weeks"));
        for (start, week) in &summary.weeks {
            println!(
                "{}\t{}\t{:.0}%",
                date_key(*start),
                format_duration(week.total_time),
                *week.productivity_score
            );
        }
    }

    if summary.top_sites.is_empty() {
        return;
    }
    println!();
    println!("{}", painter.heading("Top sites"));
    for site in &summary.top_sites {
        println!(
            "{:.0}%\t{}\t{} visits\t{}",
            *site.share,
            format_duration(site.time),
            site.visits,
            painter.category(site.category, &site.domain)
        );
    }
}
