use std::collections::HashMap;

use chrono::{Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Source;
use crate::error::FetchError;
use crate::reporter::ResultHandler;

///
/// Wraps an inner `Source`, re-triggering it once per day in `[start_day, end_day]`
/// (relative to the current UTC date, inclusive both ends), after rendering each
/// configured `properties` template against that day's date and overwriting the matching
/// field on a fresh clone of the inner source.
///
/// The inner source is cloned per iteration rather than mutated in place - a clone settles
/// the question of what a concurrent reader of the shared source would see mid-iteration,
/// since there is no shared mutable state to read.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRangeSource {
    pub source: Box<Source>,
    pub properties: HashMap<String, String>,
    pub start_day: i64,
    pub end_day: i64,
}

impl DateRangeSource {
    pub fn trigger(&self, reporter: &dyn ResultHandler) -> Result<(), FetchError> {
        if self.start_day > self.end_day {
            return Err(FetchError::Remote {
                uri: "<date-range>".into(),
                reason: format!("start_day ({}) must not be after end_day ({})", self.start_day, self.end_day),
            });
        }

        let today = Utc::now().date_naive();

        for offset in self.start_day..=self.end_day {
            let date = today + Duration::days(offset);

            let mut source_json = serde_json::to_value(self.source.as_ref())
                .map_err(|e| FetchError::Remote { uri: "<date-range>".into(), reason: e.to_string() })?;

            if let Value::Object(map) = &mut source_json {
                for (property, template) in &self.properties {
                    let rendered = render_date_template(template, date);
                    map.insert(property.clone(), Value::String(rendered));
                }
            }

            let source: Source = serde_json::from_value(source_json)
                .map_err(|e| FetchError::Remote { uri: "<date-range>".into(), reason: e.to_string() })?;

            log::debug!("date-range triggering inner source for {}", date);
            source.trigger(reporter)?;
        }

        Ok(())
    }
}

fn render_date_template(template: &str, date: chrono::NaiveDate) -> String {
    template
        .replace("{year}", &format!("{:04}", date.year()))
        .replace("{month}", &format!("{:02}", date.month()))
        .replace("{day}", &format!("{:02}", date.day()))
        .replace("{julday}", &format!("{:03}", date.ordinal()))
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::RecordingHandler;
    use crate::source::empty::EmptySource;

    #[test]
    fn renders_date_tokens() {
        let date = chrono::NaiveDate::from_ymd_opt(2013, 8, 6).unwrap();
        assert_eq!(render_date_template("{year}{month}{day}", date), "20130806");
        assert_eq!(render_date_template("{julday}", date), "218");
    }

    #[test]
    fn triggers_inner_source_once_per_day_in_range() {
        let range = DateRangeSource {
            source: Box::new(Source::Empty(EmptySource::default())),
            properties: HashMap::new(),
            start_day: -1,
            end_day: 1,
        };

        let handler = RecordingHandler::default();
        range.trigger(&handler).unwrap();
        // EmptySource reports nothing, but a panic here would mean trigger() was called
        // the wrong number of times or errored partway through the range.
        assert!(handler.completes.lock().unwrap().is_empty());
    }

    #[test]
    fn rejects_inverted_range() {
        let range = DateRangeSource {
            source: Box::new(Source::Empty(EmptySource::default())),
            properties: HashMap::new(),
            start_day: 2,
            end_day: -2,
        };

        let handler = RecordingHandler::default();
        assert!(range.trigger(&handler).is_err());
    }
}
