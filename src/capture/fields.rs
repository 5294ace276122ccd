//! Receipt field extraction from recognized text.

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};

use super::{CaptureError, MetadataBundle};

/// Tag appended when the receipt reports a successful transfer.
pub const SUCCESS_TAG: &str = "Success";

/// Fields recognized on a transfer receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptFields {
    pub contact_name: Option<String>,
    /// Amount already prefixed with the currency code, e.g. `MVR100.00`.
    pub amount: Option<String>,
    pub account: Option<String>,
    pub reference: Option<String>,
    pub success: bool,
    /// Normalized to `YYYY-MM-DD_HH-MM-SS`.
    pub date_time: Option<String>,
}

impl ReceiptFields {
    /// True when nothing at all was recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contact_name.is_none()
            && self.date_time.is_none()
            && !self.success
            && self.detail_tags().is_empty()
    }

    /// Detail tags in filename order: amount, account, reference, status.
    #[must_use]
    pub fn detail_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = [&self.amount, &self.account, &self.reference]
            .into_iter()
            .flatten()
            .filter(|tag| !tag.is_empty())
            .cloned()
            .collect();
        if self.success {
            tags.push(SUCCESS_TAG.to_string());
        }
        tags
    }

    #[must_use]
    pub fn into_bundle(self) -> MetadataBundle {
        let detail_tags = self.detail_tags();
        MetadataBundle {
            contact_name: self.contact_name.unwrap_or_default(),
            detail_tags,
            date_time: self.date_time.unwrap_or_default(),
        }
    }
}

/// Pulls [`ReceiptFields`] out of OCR text with a fixed set of patterns.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    currency: String,
    contact_label: Regex,
    amount: Regex,
    labelled_amount: Regex,
    reference: Regex,
    account: Regex,
    success: Regex,
    day_first: Regex,
    year_first: Regex,
}

impl FieldExtractor {
    /// Build an extractor for amounts in `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new(currency: &str) -> Result<Self, CaptureError> {
        let cur = regex::escape(currency);
        Ok(Self {
            currency: currency.to_string(),
            contact_label: Regex::new(
                r"(?i)^(sent to|received from|to|from|name|contact)\s*(:)?\s*(.*)$",
            )?,
            amount: Regex::new(&format!(
                r"(?i)\b{cur}\s*\.?\s*([0-9][0-9,]*(?:\.[0-9]+)?)"
            ))?,
            labelled_amount: Regex::new(r"(?i)\bamount\b[^0-9\n]*([0-9][0-9,]*(?:\.[0-9]+)?)")?,
            reference: Regex::new(
                r"(?i)\b(?:reference|ref)\b\.?(?:\s*(?:no|number|#)\.?)?\s*[:#\-]?\s*([A-Za-z0-9][A-Za-z0-9\-]*)",
            )?,
            account: Regex::new(
                r"(?i)\b(?:account|a/c)\b\.?(?:\s*(?:no|number|#)\.?)?\s*[:#\-]?\s*([0-9Xx*][0-9Xx*\-]{3,})",
            )?,
            success: Regex::new(r"(?i)\bsuccess(?:ful(?:ly)?)?\b")?,
            day_first: Regex::new(
                r"\b(\d{1,2})/(\d{1,2})/(\d{4})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([AaPp][Mm]))?",
            )?,
            year_first: Regex::new(
                r"\b(\d{4})-(\d{2})-(\d{2})[ T_](\d{2})[:\-](\d{2})(?:[:\-](\d{2}))?",
            )?,
        })
    }

    /// Currency code used as amount prefix.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Recognize every field present in `text`.
    #[must_use]
    pub fn parse(&self, text: &str) -> ReceiptFields {
        ReceiptFields {
            contact_name: self.contact_name(text),
            amount: self.amount(text),
            account: first_group(&self.account, text),
            reference: first_group(&self.reference, text),
            success: self.success.is_match(text),
            date_time: self.date_time(text),
        }
    }

    /// Parse `text` into a bundle, or `None` when nothing was recognized.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<MetadataBundle> {
        let fields = self.parse(text);
        if fields.is_empty() {
            return None;
        }
        Some(fields.into_bundle())
    }

    fn contact_name(&self, text: &str) -> Option<String> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        while let Some(line) = lines.next() {
            let Some(caps) = self.contact_label.captures(line) else {
                continue;
            };
            let rest = caps.get(3).map_or("", |m| m.as_str().trim());
            if rest.is_empty() {
                // Label alone on its line: the name follows.
                return lines.next().map(str::to_string);
            }
            if caps.get(2).is_some() {
                return Some(rest.to_string());
            }
        }
        None
    }

    fn amount(&self, text: &str) -> Option<String> {
        let raw = first_group(&self.amount, text).or_else(|| first_group(&self.labelled_amount, text))?;
        Some(format!("{}{}", self.currency, raw.replace(',', "")))
    }

    fn date_time(&self, text: &str) -> Option<String> {
        let parsed = self
            .year_first
            .captures(text)
            .and_then(|c| build_date_time(&c, [1, 2, 3]))
            .or_else(|| {
                self.day_first
                    .captures(text)
                    .and_then(|c| build_date_time(&c, [3, 2, 1]))
            })?;
        Some(parsed.format("%Y-%m-%d_%H-%M-%S").to_string())
    }
}

fn first_group(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// `order` gives the capture indices of year, month and day. Hour, minute,
/// second and meridiem always follow at 4..=7.
fn build_date_time(caps: &Captures<'_>, order: [usize; 3]) -> Option<NaiveDateTime> {
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = i32::try_from(num(order[0])?).ok()?;
    let month = num(order[1])?;
    let day = num(order[2])?;
    let mut hour = num(4)?;
    let minute = num(5)?;
    let second = num(6).unwrap_or(0);

    if let Some(meridiem) = caps.get(7).map(|m| m.as_str().to_ascii_lowercase()) {
        match (meridiem.as_str(), hour) {
            ("pm", h) if h < 12 => hour += 12,
            ("am", 12) => hour = 0,
            _ => {}
        }
    }

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}
