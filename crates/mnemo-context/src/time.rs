// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relative-date reference table.
//!
//! Models resolve "yesterday" or "last month" poorly on their own; the table
//! pins each relative expression to concrete dates in the user's timezone.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};

use crate::template::Lang;

/// Inclusive date range for one relative expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRow {
    pub label: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Compute the reference rows for `now`. Weeks start on Monday.
pub fn time_rows(now: DateTime<FixedOffset>, lang: Lang) -> Vec<TimeRow> {
    let today = now.date_naive();
    let labels = labels(lang);

    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = today.with_day(1).unwrap_or(today);
    let last_month_end = month_start.pred_opt().unwrap_or(month_start);
    let last_month_start = last_month_end.with_day(1).unwrap_or(last_month_end);
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

    let yesterday = today - Duration::days(1);
    let day_before = today - Duration::days(2);

    vec![
        TimeRow { label: labels[0], start: today, end: today },
        TimeRow { label: labels[1], start: yesterday, end: yesterday },
        TimeRow { label: labels[2], start: day_before, end: day_before },
        TimeRow { label: labels[3], start: week_start, end: week_start + Duration::days(6) },
        TimeRow {
            label: labels[4],
            start: week_start - Duration::days(7),
            end: week_start - Duration::days(1),
        },
        TimeRow { label: labels[5], start: month_start, end: month_end(today) },
        TimeRow { label: labels[6], start: last_month_start, end: last_month_end },
        TimeRow {
            label: labels[7],
            start: year_start,
            end: NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today),
        },
    ]
}

/// Render the reference rows as a Markdown table.
pub fn time_range_table(now: DateTime<FixedOffset>, lang: Lang) -> String {
    let (expr, range) = match lang {
        Lang::Zh => ("时间表述", "日期范围"),
        Lang::En => ("Expression", "Date range"),
    };

    let mut out = format!("| {expr} | {range} |\n| --- | --- |\n");
    for row in time_rows(now, lang) {
        if row.start == row.end {
            out.push_str(&format!("| {} | {} |\n", row.label, row.start));
        } else {
            out.push_str(&format!("| {} | {} ~ {} |\n", row.label, row.start, row.end));
        }
    }
    let current = match lang {
        Lang::Zh => "当前时间",
        Lang::En => "Current time",
    };
    out.push_str(&format!("\n{current}: {}", now.format("%Y-%m-%d %H:%M %:z (%A)")));
    out
}

fn labels(lang: Lang) -> [&'static str; 8] {
    match lang {
        Lang::Zh => ["今天", "昨天", "前天", "本周", "上周", "本月", "上月", "今年"],
        Lang::En => [
            "today",
            "yesterday",
            "the day before yesterday",
            "this week",
            "last week",
            "this month",
            "last month",
            "this year",
        ],
    }
}

fn month_end(day: NaiveDate) -> NaiveDate {
    let (y, m) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(day)
}
