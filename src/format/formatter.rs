use chrono::NaiveDateTime;
use std::collections::HashMap;

use serde_json::Value;

use crate::config::{DEFAULT_ALT_FMT, DEFAULT_TEXT_FMT, DEFAULT_TOOLTIP_FMT};
use crate::error::TemplateError;
use crate::format::template::Template;
use crate::geo::flag;
use crate::geo::types::{
    CLASS_FIELDS, ClassField, GeoInfo, LookupOutcome, PresentationRecord, timestamp,
};
use crate::utils::to_pretty_json;
use crate::{log_error, log_warn};

pub const EMPTY_TEXT: &str = "UNK";
pub const EMPTY_TOOLTIP: &str = "External IP request returns nothing";
pub const ERROR_TEXT: &str = "ERR";

/// Renders lookup outcomes into status bar records
#[derive(Debug, Clone)]
pub struct Formatter {
    text: Template,
    alt: Template,
    tooltip: Template,
}

impl Formatter {
    /// Parse the three output templates. Syntax errors surface here, before
    /// any lookup is made.
    pub fn new(text_fmt: &str, alt_fmt: &str, tooltip_fmt: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            text: Template::parse(text_fmt)?,
            alt: Template::parse(alt_fmt)?,
            tooltip: Template::parse(tooltip_fmt)?,
        })
    }

    pub fn with_defaults() -> Result<Self, TemplateError> {
        Self::new(DEFAULT_TEXT_FMT, DEFAULT_ALT_FMT, DEFAULT_TOOLTIP_FMT)
    }

    pub fn format(&self, outcome: &LookupOutcome) -> Result<PresentationRecord, TemplateError> {
        match outcome {
            LookupOutcome::Empty => Ok(empty_record()),
            LookupOutcome::Found(info) if info.is_empty() => Ok(empty_record()),
            LookupOutcome::Failed(err) => Ok(PresentationRecord {
                text: ERROR_TEXT.to_string(),
                alt: None,
                tooltip: err.reason.clone(),
                class: ClassField::error(),
            }),
            LookupOutcome::Found(info) => self.format_info(info),
        }
    }

    fn format_info(&self, info: &GeoInfo) -> Result<PresentationRecord, TemplateError> {
        let mut info = info.clone();
        enrich(&mut info, chrono::Local::now().naive_local());

        let values = placeholder_values(&info);

        Ok(PresentationRecord {
            text: self.text.render(&values)?,
            alt: Some(self.alt.render(&values)?),
            tooltip: self.tooltip.render(&values)?,
            class: ClassField::Tags(class_tags(&info)),
        })
    }
}

fn empty_record() -> PresentationRecord {
    PresentationRecord {
        text: EMPTY_TEXT.to_string(),
        alt: None,
        tooltip: EMPTY_TOOLTIP.to_string(),
        class: ClassField::error(),
    }
}

/// Derive `flag` from `country_code` and stamp `last_update` if unset.
///
/// A missing or malformed country code leaves the flag empty.
pub fn enrich(info: &mut GeoInfo, now: NaiveDateTime) {
    info.flag = match info.country_code.as_deref() {
        Some(code) => match flag::encode(code) {
            Ok(glyphs) => Some(glyphs),
            Err(e) => {
                log_warn!("skipping flag: {}", e);
                None
            }
        },
        None => None,
    };

    if info.last_update.is_none() {
        info.last_update = Some(now);
    }
}

/// Every value a template may reference: known fields (empty when absent),
/// provider extras, `last_update` and `full`
pub fn placeholder_values(info: &GeoInfo) -> HashMap<String, String> {
    let mut values: HashMap<String, String> = info
        .known_fields()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.unwrap_or_default().to_string()))
        .collect();

    for (name, value) in &info.extra {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        values.entry(name.clone()).or_insert(text);
    }

    values.insert(
        "last_update".to_string(),
        info.last_update
            .as_ref()
            .map(timestamp::to_text)
            .unwrap_or_default(),
    );

    let full = to_pretty_json(info).unwrap_or_else(|e| {
        log_error!("failed to serialize record for {{full}}: {}", e);
        String::new()
    });
    values.insert("full".to_string(), full);

    values
}

/// Classification tags in fixed priority order, whitespace replaced by `_`
pub fn class_tags(info: &GeoInfo) -> Vec<String> {
    CLASS_FIELDS
        .iter()
        .filter_map(|name| info.field(name))
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect()
        })
        .collect()
}
