//! Month labels
//!
//! Billing exports key every cost column by a `"MonthName/Year"` label with
//! Portuguese month names. This module parses the spelling variants seen in
//! exports (accents dropped, abbreviations, mixed case) into a canonical
//! [`MonthLabel`] that sorts chronologically and can be advanced for
//! projections.

use chrono::Month;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

static MONTH_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^/\d]+?)\s*/\s*(\d{4})\s*$").unwrap()
});

/// Canonical Portuguese month names, January first
pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// A calendar month in a given year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthLabel {
    pub month: Month,
    pub year: i32,
}

impl MonthLabel {
    pub fn new(month: Month, year: i32) -> Self {
        Self { month, year }
    }

    /// Parse a `"MonthName/Year"` label, tolerating spelling variants
    pub fn parse(label: &str) -> Result<Self> {
        let caps = MONTH_LABEL_REGEX
            .captures(label)
            .ok_or_else(|| Error::Parse(format!("Invalid month label: '{}'", label)))?;

        let month = month_from_name(&caps[1])
            .ok_or_else(|| Error::Parse(format!("Unknown month name in label: '{}'", label)))?;
        let year = caps[2]
            .parse::<i32>()
            .map_err(|e| Error::Parse(format!("Invalid year in label '{}': {}", label, e)))?;

        Ok(Self { month, year })
    }

    /// Canonical month name, e.g. "Março"
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month.number_from_month() as usize - 1]
    }

    /// The following calendar month
    pub fn next(&self) -> Self {
        let year = if self.month == Month::December {
            self.year + 1
        } else {
            self.year
        };
        Self {
            month: self.month.succ(),
            year,
        }
    }

    fn sort_key(&self) -> (i32, u32) {
        (self.year, self.month.number_from_month())
    }
}

impl Ord for MonthLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for MonthLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month_name(), self.year)
    }
}

impl std::str::FromStr for MonthLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Normalize a label to its canonical form, if it parses
pub fn canonical_label(label: &str) -> Option<String> {
    MonthLabel::parse(label).ok().map(|m| m.to_string())
}

fn month_from_name(raw: &str) -> Option<Month> {
    let folded = fold_accents(raw.trim().trim_end_matches('.').trim());
    if folded.is_empty() {
        return None;
    }

    MONTH_NAMES.iter().enumerate().find_map(|(idx, name)| {
        let full = fold_accents(name);
        let abbrev: String = full.chars().take(3).collect();
        if folded == full || folded == abbrev {
            Month::try_from(idx as u8 + 1).ok()
        } else {
            None
        }
    })
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
