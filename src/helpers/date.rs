//! Date helper functions

use chrono::{DateTime, Locale, TimeZone};

/// Format a date using a date-fns style pattern in the given locale
///
/// The date is rendered in its own offset; no timezone conversion happens.
///
/// # Examples
/// ```ignore
/// format_date(&date, "d MMM yyyy", "pt-BR") // -> "15 mar 2021"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, pattern: &str, locale: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let chrono_format = pattern_to_chrono_format(pattern);
    date.format_localized(&chrono_format, resolve_locale(locale))
        .to_string()
}

/// Map a BCP-47 tag (`pt-BR`) onto a chrono locale, defaulting to `en_US`
pub fn resolve_locale(tag: &str) -> Locale {
    let normalized = tag.trim().replace('-', "_");
    Locale::try_from(normalized.as_str()).unwrap_or_else(|_| {
        tracing::debug!("Unknown locale {:?}, falling back to en_US", tag);
        Locale::en_US
    })
}

/// Convert a date-fns pattern to a chrono format string
///
/// Letters are read in runs (`MMM`, `yyyy`); text inside single quotes is
/// copied verbatim and `''` stands for a literal quote.
fn pattern_to_chrono_format(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                result.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        result.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                push_literal(&mut result, chars[i]);
                i += 1;
            }
            continue;
        }

        if c.is_ascii_alphabetic() {
            let mut run = 1;
            while i + run < chars.len() && chars[i + run] == c {
                run += 1;
            }
            match token(c, run) {
                Some(fmt) => result.push_str(fmt),
                None => (0..run).for_each(|_| push_literal(&mut result, c)),
            }
            i += run;
            continue;
        }

        push_literal(&mut result, c);
        i += 1;
    }

    result
}

fn token(letter: char, run: usize) -> Option<&'static str> {
    let fmt = match (letter, run) {
        // Year
        ('y', 2) => "%y",
        ('y', _) => "%Y",
        // Month
        ('M', 1) => "%-m",
        ('M', 2) => "%m",
        ('M', 3) => "%b",
        ('M', _) => "%B",
        // Day of month
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        // Day of week
        ('E', 1..=3) => "%a",
        ('E', _) => "%A",
        // Hour
        ('H', 1) => "%-H",
        ('H', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        // Minute
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        // Second
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        // AM/PM
        ('a', _) => "%p",
        _ => return None,
    };
    Some(fmt)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
