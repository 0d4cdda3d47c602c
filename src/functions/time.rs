//! Timestamp builtins: `default_time`, `default_time_with_fmt`, `datetime`,
//! `parse_date`, `adjust_timezone`, `parse_duration` and
//! `duration_precision`.

use chrono::{
    DateTime as ChronoDateTime, Datelike, FixedOffset, Month, NaiveDate, NaiveDateTime, Offset,
    SecondsFormat, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{literal_value, Args, CallContext, FailurePolicy, FuncError, Function, Param};
use crate::{ast::Node, config::Zone, value::Value};

const DEFAULT_TIME_PARAMS: &[Param] = &[Param::required("key"), Param::optional("timezone")];
const DEFAULT_TIME_WITH_FMT_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("fmt"),
    Param::optional("timezone"),
];
const DATETIME_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("precision"),
    Param::required("fmt"),
];
const DURATION_PARAMS: &[Param] = &[Param::required("key")];
const DURATION_PRECISION_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::required("old_precision"),
    Param::required("new_precision"),
];
const ADJUST_TIMEZONE_PARAMS: &[Param] = &[Param::required("key"), Param::optional("minute")];
const PARSE_DATE_PARAMS: &[Param] = &[
    Param::required("key"),
    Param::optional("yy"),
    Param::required("MM"),
    Param::required("dd"),
    Param::optional("hh"),
    Param::optional("mm"),
    Param::optional("ss"),
    Param::optional("ms"),
    Param::optional("us"),
    Param::optional("ns"),
    Param::optional("zone"),
];

const HOUR_NANOS: i128 = 3_600_000_000_000;
/// Widest gap between two UTC offsets (UTC-12 to UTC+14).
const MAX_ZONE_SHIFT_HOURS: i128 = 26;

/// Access-log timestamps, e.g. `06/Jan/2017:16:16:37 +0000`.
static ACCESS_LOG_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\w+/\d{4}:\d{2}:\d{2}:\d{2} [+-]\d{4}$").expect("access log time regex")
});

static DECIMAL_EPOCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{10})\.(\d{1,9})$").expect("decimal epoch regex"));

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f %z",
    "%d/%b/%Y:%H:%M:%S%.f %z",
    "%a %b %d %H:%M:%S %z %Y",
    "%d %b %y %H:%M %z",
    "%a, %d %b %Y %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y%m%d %H:%M:%S%.f",
    "%d/%b/%Y:%H:%M:%S%.f",
    "%d/%b/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S%.f",
    "%d %B %Y %H:%M:%S%.f",
    "%b %d, %Y %H:%M:%S%.f",
    "%B %d, %Y %H:%M:%S%.f",
    "%a %b %e %H:%M:%S%.f %Y",
    "%a, %d %b %Y %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

/// `default_time(key, [timezone])`
pub struct DefaultTime;

impl Function for DefaultTime {
    fn name(&self) -> &'static str {
        "default_time"
    }

    fn params(&self) -> &'static [Param] {
        DEFAULT_TIME_PARAMS
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailFast
    }

    fn summary(&self) -> &'static str {
        "Parse the timestamp in `key` (access-log, epoch, RFC 3339, RFC 2822 and common layouts) into Unix nanoseconds."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let zone = zone_arg(args, 1, ctx.services.zone)?;

        let text = ctx.text(&key)?;
        let nanos = parse_timestamp(&text, zone).map_err(|e| FuncError::runtime("default_time", e))?;
        ctx.record.set(key, Value::Integer(nanos));
        Ok(())
    }
}

/// `default_time_with_fmt(key, fmt, [timezone])`
pub struct DefaultTimeWithFmt;

impl Function for DefaultTimeWithFmt {
    fn name(&self) -> &'static str {
        "default_time_with_fmt"
    }

    fn params(&self) -> &'static [Param] {
        DEFAULT_TIME_WITH_FMT_PARAMS
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailFast
    }

    fn summary(&self) -> &'static str {
        "Parse `key` with the strftime layout `fmt` into Unix nanoseconds."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let fmt = args.string(1)?;
        let zone = zone_arg(args, 2, ctx.services.zone)?;

        let text = ctx.text(&key)?;
        let parsed = parse_with_format(text.trim(), &fmt, zone).ok_or_else(|| {
            FuncError::runtime(
                "default_time_with_fmt",
                format!("{:?} does not match layout {:?}", text, fmt),
            )
        })?;
        let nanos = to_nanos(&parsed).map_err(|e| FuncError::runtime("default_time_with_fmt", e))?;
        ctx.record.set(key, Value::Integer(nanos));
        Ok(())
    }
}

/// `datetime(key, precision, fmt)`
///
/// `precision` is the unit of the stored epoch (`s`, `ms`, `us`, `ns`);
/// `fmt` names one of the standard layouts listed in [`layout`].
pub struct DateTime;

impl Function for DateTime {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn params(&self) -> &'static [Param] {
        DATETIME_PARAMS
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::FailFast
    }

    fn summary(&self) -> &'static str {
        "Render the epoch in `key` (unit `precision`: s, ms, us, ns) with a named layout such as RFC3339 or ANSIC."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let precision = args.string(1)?;
        let fmt = args.string(2)?;

        let per_second: i64 = match precision.as_str() {
            "s" => 1,
            "ms" => 1_000,
            "us" => 1_000_000,
            "ns" => 1_000_000_000,
            other => {
                return Err(FuncError::invalid(
                    "datetime",
                    format!("unknown precision `{}`, expected s, ms, us or ns", other),
                ));
            }
        };
        let layout = layout(&fmt).ok_or_else(|| {
            FuncError::invalid("datetime", format!("format pattern `{}` is not supported", fmt))
        })?;

        let epoch = epoch_value(ctx.value(&key)?)
            .ok_or_else(|| FuncError::runtime("datetime", format!("`{}` is not an epoch number", key)))?;

        let secs = epoch.div_euclid(per_second);
        let nanos = epoch.rem_euclid(per_second) * (1_000_000_000 / per_second);
        let instant = ChronoDateTime::<Utc>::from_timestamp(secs, nanos as u32)
            .ok_or_else(|| FuncError::runtime("datetime", format!("epoch {} is out of range", epoch)))?;

        let rendered = layout.render(&ctx.services.zone.at(instant));
        ctx.record.set(key, Value::String(rendered));
        Ok(())
    }
}

/// `parse_duration(key)`
pub struct ParseDuration;

impl Function for ParseDuration {
    fn name(&self) -> &'static str {
        "parse_duration"
    }

    fn params(&self) -> &'static [Param] {
        DURATION_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Parse a duration such as `1h2m3.5s` or `100ms` in `key` into nanoseconds."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let text = ctx.text(&key)?;
        let nanos = parse_go_duration(&text).map_err(|e| FuncError::runtime("parse_duration", e))?;
        ctx.record.set(key, Value::Integer(nanos));
        Ok(())
    }
}

/// `parse_date(key, [yy], MM, dd, [hh], [mm], [ss], [ms], [us], [ns], [zone])`
///
/// Every component is either a literal or a key read from the record. A
/// missing year is the current year in the target zone; a two-digit year is
/// in the 2000s. `MM` also accepts month names (`Jan`, `january`).
pub struct ParseDate;

impl Function for ParseDate {
    fn name(&self) -> &'static str {
        "parse_date"
    }

    fn params(&self) -> &'static [Param] {
        PARSE_DATE_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Assemble a timestamp from date components (literals or keys) and store it in `key` as Unix nanoseconds."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let zone = match args.get(10) {
            Some(Node::String(tz)) => {
                Zone::parse(tz).map_err(|e| FuncError::invalid("parse_date", e.to_string()))?
            }
            Some(_) => match date_component(args, ctx, 10)? {
                Some(value) => Zone::parse(&value.as_string())
                    .map_err(|e| FuncError::runtime("parse_date", e.to_string()))?,
                None => ctx.services.zone,
            },
            None => ctx.services.zone,
        };

        let year = match date_component(args, ctx, 1)? {
            Some(value) => match date_number("yy", &value)? {
                n @ 0..=99 => 2000 + n,
                n => n,
            },
            None => i64::from(zone.at(Utc::now()).year()),
        };
        let month = match date_component(args, ctx, 2)? {
            Some(value) => month_number(&value)?,
            None => return Err(missing_component("MM")),
        };
        let day = match date_component(args, ctx, 3)? {
            Some(value) => date_number("dd", &value)?,
            None => return Err(missing_component("dd")),
        };

        let mut clock = [0i64; 6];
        for (slot, (index, name)) in clock
            .iter_mut()
            .zip([(4, "hh"), (5, "mm"), (6, "ss"), (7, "ms"), (8, "us"), (9, "ns")])
        {
            if let Some(value) = date_component(args, ctx, index)? {
                *slot = date_number(name, &value)?;
            }
        }
        let [hour, minute, second, millis, micros, nanos] = clock;
        let naive = assemble_date(year, month, day, clock).ok_or_else(|| {
            FuncError::runtime(
                "parse_date",
                format!(
                    "no such time: {}-{}-{} {}:{}:{} +{}ms{}us{}ns",
                    year, month, day, hour, minute, second, millis, micros, nanos
                ),
            )
        })?;

        let dt = zone.from_naive(&naive).ok_or_else(|| {
            FuncError::runtime("parse_date", format!("{} does not exist in the target zone", naive))
        })?;
        let nanos = to_nanos(&dt).map_err(|e| FuncError::runtime("parse_date", e))?;
        ctx.record.set(key, Value::Integer(nanos));
        Ok(())
    }
}

fn assemble_date(year: i64, month: i64, day: i64, clock: [i64; 6]) -> Option<NaiveDateTime> {
    let [hour, minute, second, millis, micros, nanos] = clock;
    let subsec = millis
        .checked_mul(1_000_000)?
        .checked_add(micros.checked_mul(1_000)?)?
        .checked_add(nanos)?;

    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?
    .and_hms_nano_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
        u32::try_from(subsec).ok().filter(|n| *n < 1_000_000_000)?,
    )
}

/// Value of one `parse_date` component: the literal itself, or the value of
/// the key it names. `nil` counts as absent.
fn date_component(args: &Args<'_>, ctx: &CallContext<'_>, index: usize) -> Result<Option<Value>, FuncError> {
    let Some(node) = args.get(index) else {
        return Ok(None);
    };
    let value = match literal_value(node) {
        Some(value) => value,
        None => ctx.value(&args.key(index)?)?.clone(),
    };
    Ok(Some(value).filter(|v| !v.is_null()))
}

fn date_number(name: &str, value: &Value) -> Result<i64, FuncError> {
    let n = match value {
        Value::Integer(n) => Some(*n),
        Value::Unsigned(n) => i64::try_from(*n).ok(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.ok_or_else(|| {
        FuncError::runtime("parse_date", format!("`{}` is not a number: {:?}", name, value.as_string()))
    })
}

fn month_number(value: &Value) -> Result<i64, FuncError> {
    if let Value::String(s) = value
        && let Ok(month) = s.trim().parse::<Month>()
    {
        return Ok(i64::from(month.number_from_month()));
    }
    date_number("MM", value)
}

fn missing_component(name: &str) -> FuncError {
    FuncError::runtime("parse_date", format!("`{}` has no value", name))
}

/// `adjust_timezone(key, [minute])`
///
/// For a nanosecond timestamp parsed in the wrong zone: shifts it by whole
/// hours so that it falls in the hour ending `minute` minutes (0 to 15,
/// default 2) after now.
pub struct AdjustTimezone;

impl Function for AdjustTimezone {
    fn name(&self) -> &'static str {
        "adjust_timezone"
    }

    fn params(&self) -> &'static [Param] {
        ADJUST_TIMEZONE_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Shift the nanosecond timestamp in `key` by whole hours so it lands within the last hour (plus `minute` minutes of tolerance, default 2)."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let minute = match args.get(1) {
            None => 2,
            Some(_) => match args.literal(1)? {
                Value::Integer(n @ 0..=15) => n,
                other => {
                    return Err(FuncError::invalid(
                        "adjust_timezone",
                        format!("minute must be an integer from 0 to 15, got {}", other),
                    ));
                }
            },
        };

        let ts = match ctx.value(&key)? {
            Value::Integer(n) => *n,
            Value::Unsigned(n) => i64::try_from(*n).map_err(|_| not_a_timestamp(&key))?,
            _ => return Err(not_a_timestamp(&key)),
        };
        let now = Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| FuncError::runtime("adjust_timezone", "current time is out of range"))?;

        let adjusted = adjust_to_recent_hour(ts, now, minute).ok_or_else(|| {
            FuncError::runtime(
                "adjust_timezone",
                format!("`{}` is more than {} hours away from now", key, MAX_ZONE_SHIFT_HOURS),
            )
        })?;
        ctx.record.set(key, Value::Integer(adjusted));
        Ok(())
    }
}

fn not_a_timestamp(key: &str) -> FuncError {
    FuncError::runtime("adjust_timezone", format!("`{}` is not a nanosecond timestamp", key))
}

/// Shift `ts` by whole hours into `(now + tolerance - 1h, now + tolerance]`.
/// `None` when that takes more than a day's worth of zone offsets.
fn adjust_to_recent_hour(ts: i64, now: i64, tolerance_minutes: i64) -> Option<i64> {
    let upper = i128::from(now) + i128::from(tolerance_minutes) * 60_000_000_000;
    let hours = (upper - i128::from(ts)).div_euclid(HOUR_NANOS);
    if hours.abs() > MAX_ZONE_SHIFT_HOURS {
        return None;
    }
    i64::try_from(i128::from(ts) + hours * HOUR_NANOS).ok()
}

/// `duration_precision(key, old_precision, new_precision)`
pub struct DurationPrecision;

impl Function for DurationPrecision {
    fn name(&self) -> &'static str {
        "duration_precision"
    }

    fn params(&self) -> &'static [Param] {
        DURATION_PRECISION_PARAMS
    }

    fn summary(&self) -> &'static str {
        "Convert the integer duration in `key` between units (s, ms, us, ns); coarser units truncate."
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let from = unit_nanos(&args.string(1)?)?;
        let to = unit_nanos(&args.string(2)?)?;

        let value = match ctx.value(&key)? {
            Value::Integer(n) => i128::from(*n),
            Value::Unsigned(n) => i128::from(*n),
            other => {
                return Err(FuncError::runtime(
                    "duration_precision",
                    format!("`{}` is not an integer duration: {}", key, other.type_name()),
                ));
            }
        };

        let converted = i64::try_from(value * from / to).map_err(|_| {
            FuncError::runtime("duration_precision", format!("`{}` overflows after conversion", key))
        })?;
        ctx.record.set(key, Value::Integer(converted));
        Ok(())
    }
}

fn unit_nanos(unit: &str) -> Result<i128, FuncError> {
    match unit {
        "s" => Ok(1_000_000_000),
        "ms" => Ok(1_000_000),
        "us" => Ok(1_000),
        "ns" => Ok(1),
        other => Err(FuncError::invalid(
            "duration_precision",
            format!("unknown precision `{}`, expected s, ms, us or ns", other),
        )),
    }
}

fn zone_arg(args: &Args<'_>, index: usize, default: Zone) -> Result<Zone, FuncError> {
    match args.opt_string(index)? {
        Some(tz) => Zone::parse(&tz).map_err(|e| FuncError::invalid(args.function(), e.to_string())),
        None => Ok(default),
    }
}

fn epoch_value(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n),
        Value::Unsigned(n) => i64::try_from(*n).ok(),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn to_nanos(dt: &ChronoDateTime<FixedOffset>) -> Result<i64, String> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| format!("{} is out of the nanosecond range", dt))
}

/// Parse a timestamp in any of the supported forms into Unix nanoseconds.
///
/// Tried in order: access-log time (`06/Jan/2017:16:16:37 +0000`), epoch
/// digits (unit chosen by length: up to 10 digits seconds, 13 millis, 16
/// micros, 19 nanos; exactly 8 digits is `YYYYMMDD`), RFC 3339, RFC 2822,
/// layouts with a numeric offset, then layouts without one interpreted in
/// `zone` (a trailing `UTC`/`GMT`/`Z` selects UTC instead). A syslog time
/// without a year (`Jan  2 15:04:05`) is placed in the current year.
///
/// ```
/// use datakit_pipeline::{config::Zone, functions::parse_timestamp};
///
/// let utc = Zone::parse("UTC").unwrap();
/// assert_eq!(parse_timestamp("06/Jan/2017:16:16:37 +0000", utc), Ok(1483719397000000000));
/// assert_eq!(parse_timestamp("1483719397", utc), Ok(1483719397000000000));
/// assert_eq!(parse_timestamp("2017-01-06 16:16:37", utc), Ok(1483719397000000000));
/// ```
pub fn parse_timestamp(text: &str, zone: Zone) -> Result<i64, String> {
    let s = text.trim();
    if s.is_empty() {
        return Err("empty timestamp".to_string());
    }
    let dt = parse_datetime(s, zone).ok_or_else(|| format!("unrecognized timestamp {:?}", text))?;
    to_nanos(&dt)
}

fn parse_datetime(s: &str, zone: Zone) -> Option<ChronoDateTime<FixedOffset>> {
    if ACCESS_LOG_TIME.is_match(s) {
        return ChronoDateTime::parse_from_str(s, "%d/%b/%Y:%H:%M:%S %z").ok();
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_epoch(s, zone);
    }

    if let Some(caps) = DECIMAL_EPOCH.captures(s) {
        let secs: i64 = caps[1].parse().ok()?;
        let nanos: u32 = format!("{:0<9}", &caps[2]).parse().ok()?;
        return ChronoDateTime::<Utc>::from_timestamp(secs, nanos).map(|dt| dt.fixed_offset());
    }

    if let Ok(dt) = ChronoDateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = ChronoDateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = ChronoDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let (s, zone) = match strip_utc(s) {
        Some(rest) => (rest, Zone::Fixed(Utc.fix())),
        None => (s.to_string(), zone),
    };

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
            return zone.from_naive(&naive);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&s, fmt) {
            return zone.from_naive(&date.and_hms_opt(0, 0, 0)?);
        }
    }

    let year = zone.at(Utc::now()).year();
    NaiveDateTime::parse_from_str(&format!("{} {}", year, s), "%Y %b %e %H:%M:%S%.f")
        .ok()
        .and_then(|naive| zone.from_naive(&naive))
}

fn parse_epoch(digits: &str, zone: Zone) -> Option<ChronoDateTime<FixedOffset>> {
    if digits.len() == 8 {
        let date = NaiveDate::parse_from_str(digits, "%Y%m%d").ok()?;
        return zone.from_naive(&date.and_hms_opt(0, 0, 0)?);
    }

    let n: i64 = digits.parse().ok()?;
    let (secs, nanos) = match digits.len() {
        0..=10 => (n, 0),
        11..=13 => (n / 1_000, (n % 1_000) * 1_000_000),
        14..=16 => (n / 1_000_000, (n % 1_000_000) * 1_000),
        17..=19 => (n / 1_000_000_000, n % 1_000_000_000),
        _ => return None,
    };
    ChronoDateTime::<Utc>::from_timestamp(secs, nanos as u32).map(|dt| dt.fixed_offset())
}

/// Remove a UTC marker (`... UTC`, `... GMT`, `... UTC 2021`, `...Z`).
fn strip_utc(s: &str) -> Option<String> {
    for token in [" UTC", " GMT"] {
        if let Some(rest) = s.strip_suffix(token) {
            return Some(rest.to_string());
        }
        let inner = format!("{} ", token);
        if s.contains(&inner) {
            return Some(s.replacen(&inner, " ", 1));
        }
    }
    match s.strip_suffix('Z') {
        Some(rest) if rest.ends_with(|c: char| c.is_ascii_digit()) => Some(rest.to_string()),
        _ => None,
    }
}

fn parse_with_format(s: &str, fmt: &str, zone: Zone) -> Option<ChronoDateTime<FixedOffset>> {
    if let Ok(dt) = ChronoDateTime::parse_from_str(s, fmt) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
        return zone.from_naive(&naive);
    }
    let date = NaiveDate::parse_from_str(s, fmt).ok()?;
    zone.from_naive(&date.and_hms_opt(0, 0, 0)?)
}

/// An output layout for `datetime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Strftime(&'static str),
    Rfc3339(SecondsFormat),
}

/// Look up a named layout: `ANSIC`, `UnixDate`, `RubyDate`, `RFC822`,
/// `RFC822Z`, `RFC850`, `RFC1123`, `RFC1123Z`, `RFC3339`, `RFC3339Nano`,
/// `Kitchen`, `Stamp`, `StampMilli`, `StampMicro`, `StampNano`.
pub fn layout(name: &str) -> Option<Layout> {
    let layout = match name {
        "ANSIC" => Layout::Strftime("%a %b %e %H:%M:%S %Y"),
        "UnixDate" => Layout::Strftime("%a %b %e %H:%M:%S %Z %Y"),
        "RubyDate" => Layout::Strftime("%a %b %d %H:%M:%S %z %Y"),
        "RFC822" => Layout::Strftime("%d %b %y %H:%M %Z"),
        "RFC822Z" => Layout::Strftime("%d %b %y %H:%M %z"),
        "RFC850" => Layout::Strftime("%A, %d-%b-%y %H:%M:%S %Z"),
        "RFC1123" => Layout::Strftime("%a, %d %b %Y %H:%M:%S %Z"),
        "RFC1123Z" => Layout::Strftime("%a, %d %b %Y %H:%M:%S %z"),
        "RFC3339" => Layout::Rfc3339(SecondsFormat::Secs),
        "RFC3339Nano" => Layout::Rfc3339(SecondsFormat::AutoSi),
        "Kitchen" => Layout::Strftime("%-I:%M%p"),
        "Stamp" => Layout::Strftime("%b %e %H:%M:%S"),
        "StampMilli" => Layout::Strftime("%b %e %H:%M:%S%.3f"),
        "StampMicro" => Layout::Strftime("%b %e %H:%M:%S%.6f"),
        "StampNano" => Layout::Strftime("%b %e %H:%M:%S%.9f"),
        _ => return None,
    };
    Some(layout)
}

impl Layout {
    /// Render `dt`. A zero offset prints its zone name as `UTC`.
    pub fn render(&self, dt: &ChronoDateTime<FixedOffset>) -> String {
        match self {
            Layout::Rfc3339(secs) => dt.to_rfc3339_opts(*secs, true),
            Layout::Strftime(fmt) if dt.offset().local_minus_utc() == 0 => {
                dt.format(&fmt.replace("%Z", "UTC")).to_string()
            }
            Layout::Strftime(fmt) => dt.format(fmt).to_string(),
        }
    }
}

/// Parse a duration written as a sequence of decimal numbers with units
/// (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`), optionally signed, into
/// nanoseconds. `"0"` needs no unit.
///
/// ```
/// use datakit_pipeline::functions::parse_go_duration;
///
/// assert_eq!(parse_go_duration("1h2m3.5s"), Ok(3_723_500_000_000));
/// assert_eq!(parse_go_duration("-2us"), Ok(-2_000));
/// assert!(parse_go_duration("10").is_err());
/// ```
pub fn parse_go_duration(text: &str) -> Result<i64, String> {
    let invalid = || format!("invalid duration {:?}", text);

    let s = text.trim();
    let (negative, mut rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let unit: i128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in duration {:?}", text)),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, text)),
        };
        rest = &rest[unit_len..];

        let whole: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut value = whole.checked_mul(unit).ok_or_else(invalid)?;
        if !frac_part.is_empty() {
            let digits = frac_part.len().min(18);
            let frac: i128 = frac_part[..digits].parse().map_err(|_| invalid())?;
            value += frac * unit / 10_i128.pow(digits as u32);
        }
        total = total.checked_add(value).ok_or_else(invalid)?;
    }

    let total = if negative { -total } else { total };
    i64::try_from(total).map_err(|_| invalid())
}
