//! Date parsing and display rules for the news sources.
//!
//! Every calendar quirk lives here: the GalNet date format, the in-game
//! UGT year offset and the per-source handling of `news_timestamp_use_ugt`.
//!
//! NOTE: the two sources read the UGT flag in opposite directions. GalNet
//! publishes dates already in UGT years, so the flag ON shows them as-is and
//! OFF converts back to the real-world year. The website feed publishes
//! real-world dates, so the flag ON adds the offset.

use chrono::{DateTime, Months, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::config::Config;

/// Years between the real-world calendar and Universal Galactic Time.
pub const UGT_YEAR_OFFSET: u32 = 1286;

/// GalNet API date format, e.g. `04 MAY 3306`.
pub const GALNET_DATE_FORMAT: &str = "%d %b %Y";

/// Display format for the `Post Date` field, e.g. `04 May 3306`.
pub const DISPLAY_DATE_FORMAT: &str = "%d %b %Y";

/// How dates are rendered in notifications. Built from a config snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayOptions {
    pub use_ugt: bool,
    pub timezone: Tz,
}

impl DisplayOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            use_ugt: cfg.news_timestamp_use_ugt,
            timezone: resolve_timezone(&cfg.timezone),
        }
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            use_ugt: true,
            timezone: Tz::UTC,
        }
    }
}

/// IANA timezone lookup; unknown names fall back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = name, "unknown timezone, using UTC");
            Tz::UTC
        }
    }
}

/// Parse a GalNet `DD MMM YYYY` date as midnight UTC. Month names are case-insensitive.
pub fn parse_galnet_date(raw: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), GALNET_DATE_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// GalNet `Post Date`: flag ON renders the (already UGT) date in the display
/// timezone, flag OFF subtracts the UGT offset.
pub fn galnet_display_date(date: DateTime<Utc>, opts: &DisplayOptions) -> String {
    if opts.use_ugt {
        return in_timezone(date, opts.timezone);
    }
    date.checked_sub_months(ugt_offset())
        .unwrap_or(date)
        .format(DISPLAY_DATE_FORMAT)
        .to_string()
}

/// Website feed `Post Date`: flag ON adds the UGT offset to the UTC date,
/// flag OFF renders the date in the display timezone.
pub fn feed_display_date(date: DateTime<Utc>, opts: &DisplayOptions) -> String {
    if !opts.use_ugt {
        return in_timezone(date, opts.timezone);
    }
    date.checked_add_months(ugt_offset())
        .unwrap_or(date)
        .format(DISPLAY_DATE_FORMAT)
        .to_string()
}

fn in_timezone(date: DateTime<Utc>, tz: Tz) -> String {
    date.with_timezone(&tz).format(DISPLAY_DATE_FORMAT).to_string()
}

// Month arithmetic clamps Feb 29 onto Feb 28 when the target year is not a leap year.
fn ugt_offset() -> Months {
    Months::new(UGT_YEAR_OFFSET * 12)
}
