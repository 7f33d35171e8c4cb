//! 將匯出檔中各種日期/時間格式轉為資料庫可存的標準字串。

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy)]
enum Layout {
    /// DD/MM/YYYY HH:mm:ss
    DayFirstSeconds,
    /// DD/MM/YYYY HH:mm
    DayFirstMinutes,
    /// DD/MM/YYYY 或 DD-MM-YYYY
    DayFirst,
    /// YYYY-MM-DD
    YearFirst,
}

struct Matcher {
    pattern: Regex,
    layout: Layout,
}

// 依序嘗試，第一個成功者勝出
static MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    let build = |pattern: &str, layout| Matcher {
        pattern: Regex::new(pattern).expect("date pattern is a valid regex"),
        layout,
    };
    vec![
        build(
            r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})\s+([0-9]{1,2}):([0-9]{1,2}):([0-9]{1,2})$",
            Layout::DayFirstSeconds,
        ),
        build(
            r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})\s+([0-9]{1,2}):([0-9]{1,2})$",
            Layout::DayFirstMinutes,
        ),
        build(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})$", Layout::DayFirst),
        build(r"^([0-9]{1,2})-([0-9]{1,2})-([0-9]{4})$", Layout::DayFirst),
        build(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$", Layout::YearFirst),
    ]
});

/// 標準化結果：純日期或完整時間戳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedDate {
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl NormalizedDate {
    /// `YYYY-MM-DD` 或 `YYYY-MM-DD HH:mm:ss`
    pub fn to_canonical(&self) -> String {
        match self {
            NormalizedDate::Date(d) => d.format("%Y-%m-%d").to_string(),
            NormalizedDate::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// 解析日期字串；空白或無法辨識時回傳 None，不會 panic。
pub fn parse_date(raw: &str) -> Option<NormalizedDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    MATCHERS.iter().find_map(|matcher| {
        let caps = matcher.pattern.captures(value)?;
        build(&caps, matcher.layout)
    })
}

pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.to_canonical())
}

fn build(caps: &Captures<'_>, layout: Layout) -> Option<NormalizedDate> {
    let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    let (year, month, day) = match layout {
        Layout::YearFirst => (num(1)?, num(2)?, num(3)?),
        _ => (num(3)?, num(2)?, num(1)?),
    };
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    // 不存在的日期 (例如 31/02) 會在這裡被拒絕
    let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;

    let time = match layout {
        Layout::DayFirstSeconds => Some(NaiveTime::from_hms_opt(num(4)?, num(5)?, num(6)?)?),
        Layout::DayFirstMinutes => Some(NaiveTime::from_hms_opt(num(4)?, num(5)?, 0)?),
        Layout::DayFirst | Layout::YearFirst => None,
    };

    Some(match time {
        Some(t) => NormalizedDate::Timestamp(date.and_time(t)),
        None => NormalizedDate::Date(date),
    })
}
