use chrono::{Local, NaiveDate};

static DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

pub fn date_from_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    None
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
