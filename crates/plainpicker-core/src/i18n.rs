use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Locale strings shown by the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18n {
    pub previous_month: String,
    pub next_month: String,
    pub months: Vec<String>,
    pub weekdays: Vec<String>,
    pub weekdays_short: Vec<String>,
}

impl Default for I18n {
    fn default() -> Self {
        Self {
            previous_month: "Previous Month".to_string(),
            next_month: "Next Month".to_string(),
            months: to_owned(&[
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ]),
            weekdays: to_owned(&[
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
            ]),
            weekdays_short: to_owned(&["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]),
        }
    }
}

/// Partial locale, merged field by field over an [`I18n`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nPatch {
    #[serde(default)]
    pub previous_month: Option<String>,
    #[serde(default)]
    pub next_month: Option<String>,
    #[serde(default)]
    pub months: Option<Vec<String>>,
    #[serde(default)]
    pub weekdays: Option<Vec<String>>,
    #[serde(default)]
    pub weekdays_short: Option<Vec<String>>,
}

impl I18n {
    /// Month name for a 0-based month index.
    pub fn month_name(&self, month: i32) -> &str {
        let idx = month.rem_euclid(12) as usize;
        self.months.get(idx).map(String::as_str).unwrap_or_default()
    }

    /// Weekday name, Sunday is 0.
    pub fn weekday_name(&self, day: u32) -> &str {
        self.weekdays
            .get((day % 7) as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn weekday_short(&self, day: u32) -> &str {
        self.weekdays_short
            .get((day % 7) as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn merged(&self, patch: &I18nPatch) -> Self {
        let mut out = self.clone();
        if let Some(value) = &patch.previous_month {
            out.previous_month = value.clone();
        }
        if let Some(value) = &patch.next_month {
            out.next_month = value.clone();
        }
        if let Some(months) = checked_list(patch.months.as_ref(), 12, "months") {
            out.months = months;
        }
        if let Some(weekdays) = checked_list(patch.weekdays.as_ref(), 7, "weekdays") {
            out.weekdays = weekdays;
        }
        if let Some(short) = checked_list(patch.weekdays_short.as_ref(), 7, "weekdays_short") {
            out.weekdays_short = short;
        }
        out
    }

    /// Loads a locale file and merges it over the built-in English strings.
    #[tracing::instrument]
    pub fn load_toml(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read locale file {}", path.display()))?;
        let patch = toml::from_str::<I18nPatch>(&raw)
            .with_context(|| format!("failed to parse locale file {}", path.display()))?;

        for (field, list, expected) in [
            ("months", &patch.months, 12),
            ("weekdays", &patch.weekdays, 7),
            ("weekdays_short", &patch.weekdays_short, 7),
        ] {
            if let Some(list) = list
                && list.len() != expected
            {
                return Err(anyhow!(
                    "locale file {}: {field} needs {expected} entries, got {}",
                    path.display(),
                    list.len()
                ));
            }
        }

        debug!(file = %path.display(), "loaded locale file");
        Ok(I18n::default().merged(&patch))
    }
}

fn checked_list(list: Option<&Vec<String>>, expected: usize, field: &str) -> Option<Vec<String>> {
    let list = list?;
    if list.len() != expected {
        warn!(field, expected, got = list.len(), "ignoring locale list with wrong length");
        return None;
    }
    Some(list.clone())
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{I18n, I18nPatch};

    #[test]
    fn patch_merges_field_by_field() {
        let base = I18n::default();
        let patch = I18nPatch {
            next_month: Some("Weiter".to_string()),
            weekdays_short: Some(vec!["x".to_string()]),
            ..I18nPatch::default()
        };
        let merged = base.merged(&patch);
        assert_eq!(merged.next_month, "Weiter");
        assert_eq!(merged.previous_month, "Previous Month");
        assert_eq!(merged.weekday_short(1), "Mon");
        assert_eq!(base.next_month, "Next Month");
    }

    #[test]
    fn loads_locale_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("de.toml");
        fs::write(
            &path,
            r#"
previous_month = "Vorheriger Monat"
next_month = "Nächster Monat"
months = ["Januar", "Februar", "März", "April", "Mai", "Juni", "Juli",
          "August", "September", "Oktober", "November", "Dezember"]
weekdays_short = ["So", "Mo", "Di", "Mi", "Do", "Fr", "Sa"]
"#,
        )
        .expect("write locale");

        let i18n = I18n::load_toml(&path).expect("load locale");
        assert_eq!(i18n.month_name(2), "März");
        assert_eq!(i18n.weekday_short(0), "So");
        assert_eq!(i18n.weekday_name(0), "Sunday");
    }

    #[test]
    fn rejects_short_month_list() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("bad.toml");
        fs::write(&path, "months = [\"Jan\"]\n").expect("write locale");
        assert!(I18n::load_toml(&path).is_err());
    }
}
