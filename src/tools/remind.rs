//! Natural-language time expressions for reminders.
//!
//! Accepted forms, future-biased where a phrase is open to more than one reading:
//! - relative offsets: `in 10 minutes`, `after an hour`, `2 days from now`, `in half an hour`
//! - ISO dates and datetimes: `2026-12-31 15:00`, `2026-12-31`
//! - calendar phrases: `tomorrow at 8:30am`, `friday`, `tonight`, `5pm tomorrow`, `noon`
//!
//! Local phrases are interpreted in the configured timezone.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:in|after)\s+)?(?P<n>\d+|[a-z]+)\s*(?P<unit>[a-z]+)(?:\s+(?:from\s+now|later))?$",
    )
    .expect("valid regex")
});

static HALF_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:in|after)\s+)?half\s+an?\s+hour(?:\s+(?:from\s+now|later))?$")
        .expect("valid regex")
});

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<h>\d{1,2})(?::(?P<m>\d{2}))?(?P<mer>am|pm)?$").expect("valid regex")
});

static SPACED_MERIDIEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s+(am|pm)\b").expect("valid regex"));

const DEFAULT_DAY_HOUR: u32 = 9;
const TONIGHT_HOUR: u32 = 20;

/// Resolve a time expression relative to `now`. `None` when the expression
/// is not understood or lands outside the representable range. An explicit
/// past time is returned as is; callers decide what to do with it.
pub fn parse_when(expr: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = expr.trim().trim_end_matches(['.', '!']);
    if raw.is_empty() {
        return None;
    }

    parse_absolute(raw, tz).or_else(|| {
        let text = normalize(raw);
        parse_relative(&text, now).or_else(|| parse_calendar(&text, now, tz))
    })
}

fn normalize(raw: &str) -> String {
    let lower = raw
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace(',', " ");
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    SPACED_MERIDIEM_RE
        .replace_all(&collapsed, "${1}${2}")
        .into_owned()
}

fn parse_absolute(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    let naive = FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(DEFAULT_DAY_HOUR, 0, 0))
        })?;
    localize(naive, tz)
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if HALF_HOUR_RE.is_match(text) {
        return now.checked_add_signed(Duration::minutes(30));
    }
    let caps = RELATIVE_RE.captures(text)?;
    let n = parse_count(caps.name("n")?.as_str())?;
    // Counts come from model output; out-of-range offsets are unparseable.
    let offset = match caps.name("unit")?.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(n),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(n),
        "d" | "day" | "days" => Duration::try_days(n),
        "w" | "wk" | "wks" | "week" | "weeks" => Duration::try_weeks(n),
        _ => return None,
    }?;
    now.checked_add_signed(offset)
}

fn parse_count(word: &str) -> Option<i64> {
    if let Ok(n) = word.parse::<i64>() {
        return Some(n);
    }
    let n = match word {
        "a" | "an" | "one" => 1,
        "two" | "couple" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "fifteen" => 15,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        _ => return None,
    };
    Some(n)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Day {
    Today,
    Tonight,
    Tomorrow,
    On(Weekday),
}

/// A time of day, noting whether a bare hour could still mean either half of the day.
#[derive(Debug, Clone, Copy)]
struct Clock {
    time: NaiveTime,
    ambiguous: bool,
}

fn parse_calendar(text: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let mut day: Option<Day> = None;
    let mut clock: Option<Clock> = None;

    for word in text.split(' ') {
        match word {
            "at" | "on" | "by" | "around" | "this" | "next" | "the" | "in" | "o'clock" => {}
            "today" => day = Some(Day::Today),
            "tonight" => day = Some(Day::Tonight),
            "tomorrow" | "tmrw" | "tmr" => day = Some(Day::Tomorrow),
            "morning" => clock = clock.or(Some(fixed(DEFAULT_DAY_HOUR)?)),
            "afternoon" => clock = clock.or(Some(fixed(15)?)),
            "evening" => clock = clock.or(Some(fixed(18)?)),
            "night" => clock = clock.or(Some(fixed(21)?)),
            "noon" | "midday" => clock = Some(fixed(12)?),
            "midnight" => clock = Some(fixed(0)?),
            other => {
                if let Ok(weekday) = other.parse::<Weekday>() {
                    day = Some(Day::On(weekday));
                } else {
                    clock = Some(parse_clock(other)?);
                }
            }
        }
    }

    if day.is_none() && clock.is_none() {
        return None;
    }

    let local_now = now.with_timezone(&tz).naive_local();
    let today = local_now.date();

    match day {
        None => {
            let clock = clock?;
            let mut candidates = vec![clock.time];
            if clock.ambiguous {
                candidates.push(clock.time + Duration::hours(12));
            }
            let next = candidates
                .iter()
                .map(|t| today.and_time(*t))
                .find(|at| *at > local_now)
                .unwrap_or_else(|| (today + Duration::days(1)).and_time(clock.time));
            localize(next, tz)
        }
        Some(Day::Today) => localize(today.and_time(clock?.time), tz),
        Some(Day::Tonight) => {
            let time = match clock {
                Some(c) if c.time.hour() < 12 => c.time + Duration::hours(12),
                Some(c) => c.time,
                None => NaiveTime::from_hms_opt(TONIGHT_HOUR, 0, 0)?,
            };
            localize(today.and_time(time), tz)
        }
        Some(Day::Tomorrow) => {
            let time = clock.map_or(NaiveTime::from_hms_opt(DEFAULT_DAY_HOUR, 0, 0)?, |c| c.time);
            localize((today + Duration::days(1)).and_time(time), tz)
        }
        Some(Day::On(weekday)) => {
            let current = today.weekday().num_days_from_monday() as i64;
            let target = weekday.num_days_from_monday() as i64;
            let mut ahead = (target - current).rem_euclid(7);
            if ahead == 0 {
                ahead = 7;
            }
            let time = clock.map_or(NaiveTime::from_hms_opt(DEFAULT_DAY_HOUR, 0, 0)?, |c| c.time);
            localize((today + Duration::days(ahead)).and_time(time), tz)
        }
    }
}

fn fixed(hour: u32) -> Option<Clock> {
    Some(Clock {
        time: NaiveTime::from_hms_opt(hour, 0, 0)?,
        ambiguous: false,
    })
}

fn parse_clock(word: &str) -> Option<Clock> {
    let caps = CLOCK_RE.captures(word)?;
    let mut hour: u32 = caps.name("h")?.as_str().parse().ok()?;
    let minute: u32 = match caps.name("m") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let meridiem = caps.name("mer").map(|m| m.as_str());

    match meridiem {
        Some(mer) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour %= 12;
            if mer == "pm" {
                hour += 12;
            }
        }
        None if hour > 23 => return None,
        None => {}
    }

    Some(Clock {
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        ambiguous: meridiem.is_none() && (1..12).contains(&hour),
    })
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
