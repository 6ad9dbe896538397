use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::DateParseError;

/// `15 JUN 2020 3:45PM by PIB New Delhi`
static DATELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}) ([A-Z]{3}) (\d{4}) (\d{1,2}:\d{2}[AP]M) by PIB (.+)").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub struct Dateline {
    pub date: NaiveDateTime,
    pub place: String,
}

/// Parse the release date/place block. Whitespace runs are collapsed first,
/// the subhead is often split across lines in the page source.
pub fn parse(text: &str) -> Result<Dateline, DateParseError> {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let caps = DATELINE_RE.captures(&line).ok_or(DateParseError::NoMatch)?;

    let stamp = format!("{} {} {} {}", &caps[1], &caps[2], &caps[3], &caps[4]);
    let date = NaiveDateTime::parse_from_str(&stamp, "%d %b %Y %I:%M%p")
        .map_err(|e| DateParseError::Invalid(stamp.clone(), e))?;

    Ok(Dateline {
        date,
        place: caps[5].trim().to_string(),
    })
}

/// First line of `text` that carries a dateline.
pub fn find_in_lines(text: &str) -> Result<Dateline, DateParseError> {
    text.lines()
        .filter(|l| DATELINE_RE.is_match(l))
        .map(parse)
        .next()
        .unwrap_or(Err(DateParseError::NoMatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn afternoon_release() {
        let d = parse("15 JUN 2020 03:45PM by PIB New Delhi").unwrap();
        assert_eq!(d.place, "New Delhi");
        assert_eq!(d.date, at(2020, 6, 15, 15, 45));
    }

    #[test]
    fn posted_on_prefix_and_line_breaks() {
        let d = parse("Posted On:\r\n 1 MAR 2021\n 9:05AM by PIB Chennai ").unwrap();
        assert_eq!(d.place, "Chennai");
        assert_eq!(d.date, at(2021, 3, 1, 9, 5));
    }

    #[test]
    fn midnight_and_noon() {
        assert_eq!(parse("01 JAN 2020 12:00AM by PIB Delhi").unwrap().date, at(2020, 1, 1, 0, 0));
        assert_eq!(parse("01 JAN 2020 12:00PM by PIB Delhi").unwrap().date, at(2020, 1, 1, 12, 0));
    }

    #[test]
    fn mismatch() {
        assert!(matches!(parse("Posted On: yesterday"), Err(DateParseError::NoMatch)));
        assert!(matches!(parse("15 Jun 2020 03:45PM by PIB Delhi"), Err(DateParseError::NoMatch)));
    }

    #[test]
    fn impossible_date() {
        assert!(matches!(
            parse("31 FEB 2020 03:45PM by PIB Delhi"),
            Err(DateParseError::Invalid(..))
        ));
    }

    #[test]
    fn search_lines() {
        let text = "Ministry of Finance\nPosted On: 20 AUG 2019 6:30PM by PIB Delhi\nBody";
        assert_eq!(find_in_lines(text).unwrap().place, "Delhi");
        assert!(find_in_lines("Body only").is_err());
    }
}
