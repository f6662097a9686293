//! Structural and business-rule validation
//!
//! Validation runs on the parsed rows as they came out of the file. It never
//! consults the column-type inference used for cleanup; every rule parses the
//! cells it needs itself. Problems are grouped by row in a
//! [`ValidationReport`]; warnings never make a report invalid.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use ratelink_core::{CancellationToken, DataType, ValidationReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::reader::{ParsedRow, ParsedTable};
use crate::schema::*;

/// ISO 4217 alphabetic codes in active use
const ISO_CURRENCIES: &str = "AED AFN ALL AMD ANG AOA ARS AUD AWG AZN BAM BBD BDT BGN BHD BIF BMD BND BOB \
BRL BSD BTN BWP BYN BZD CAD CDF CHF CLP CNY COP CRC CUP CVE CZK DJF DKK DOP DZD EGP ERN ETB EUR FJD FKP \
GBP GEL GHS GIP GMD GNF GTQ GYD HKD HNL HTG HUF IDR ILS INR IQD IRR ISK JMD JOD JPY KES KGS KHR KMF KPW \
KRW KWD KYD KZT LAK LBP LKR LRD LSL LYD MAD MDL MGA MKD MMK MNT MOP MRU MUR MVR MWK MXN MYR MZN NAD NGN \
NIO NOK NPR NZD OMR PAB PEN PGK PHP PKR PLN PYG QAR RON RSD RUB RWF SAR SBD SCR SDG SEK SGD SHP SLE SOS \
SRD SSP STN SVC SYP SZL THB TJS TMT TND TOP TRY TTD TWD TZS UAH UGX USD UYU UZS VES VND VUV WST XAF XCD \
XOF XPF YER ZAR ZMW ZWL";

/// Date layouts accepted in import files
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d.%m.%Y", "%b %d, %Y", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Thresholds for the business rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Warn when a proposed rate rises more than this over its historical rate
    pub max_increase_percent: Option<f64>,
    /// Historical rates keyed by attorney ID or attorney name (case-insensitive)
    pub historical_rates: HashMap<String, Decimal>,
    /// Decimal places allowed on rate amounts
    pub max_decimal_places: u32,
    /// Hours on one entry above which a warning is raised
    pub high_hours_threshold: f64,
    /// Billing dates older than this many days raise a stale-data warning.
    /// Values too large for a date span never warn.
    pub stale_after_days: i64,
    /// Reference date for future/stale checks; defaults to today (UTC)
    pub today: Option<NaiveDate>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_increase_percent: Some(10.0),
            historical_rates: HashMap::new(),
            max_decimal_places: 2,
            high_hours_threshold: 24.0,
            stale_after_days: 365,
            today: None,
        }
    }
}

impl ValidationOptions {
    pub fn with_max_increase_percent(mut self, percent: f64) -> Self {
        self.max_increase_percent = Some(percent);
        self
    }

    pub fn with_historical_rate(mut self, attorney: impl AsRef<str>, rate: Decimal) -> Self {
        self.historical_rates
            .insert(attorney.as_ref().trim().to_lowercase(), rate);
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn reference_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Resolves schema headers to the headers actually present in a file
#[derive(Debug, Clone, Default)]
pub struct Columns {
    actual: HashMap<String, String>,
}

impl Columns {
    pub fn new(headers: &[String]) -> Self {
        let actual = headers
            .iter()
            .map(|h| (header_key(h), h.clone()))
            .collect();
        Self { actual }
    }

    pub fn resolve(&self, header: &str) -> Option<&str> {
        self.actual.get(&header_key(header)).map(String::as_str)
    }

    /// Trimmed, non-empty text of a cell
    pub fn text<'r>(&self, row: &'r ParsedRow, header: &str) -> Option<&'r str> {
        let actual = self.resolve(header)?;
        row.get(actual)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn header_key(header: &str) -> String {
    header
        .trim()
        .trim_end_matches(OPTIONAL_MARKER)
        .trim()
        .to_lowercase()
}

/// Parse an amount, ignoring currency symbols and thousands separators
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse a date in any of the accepted layouts
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn is_iso_currency(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    code.len() == 3 && ISO_CURRENCIES.split_whitespace().any(|c| c == code)
}

/// Shared per-row context handed to the business rules
pub struct RowContext<'a> {
    pub row: &'a ParsedRow,
    pub columns: &'a Columns,
    pub options: &'a ValidationOptions,
    pub today: NaiveDate,
}

impl<'a> RowContext<'a> {
    pub fn text(&self, header: &str) -> Option<&'a str> {
        self.columns.text(self.row, header)
    }

    /// Parsed date, or an error on the row when the cell is present but unreadable
    fn date(&self, header: &str, report: &mut ValidationReport) -> Option<NaiveDate> {
        let text = self.text(header)?;
        let parsed = parse_date(text);
        if parsed.is_none() {
            report.add_error(self.row.number, format!("Invalid {} '{}'", header.to_lowercase(), text));
        }
        parsed
    }

    /// Parsed amount, or an error on the row when the cell is present but not numeric
    fn amount(&self, header: &str, label: &str, report: &mut ValidationReport) -> Option<Decimal> {
        let text = self.text(header)?;
        let parsed = parse_decimal(text);
        if parsed.is_none() {
            report.add_error(self.row.number, format!("{} must be a number (got '{}')", label, text));
        }
        parsed
    }
}

/// Business rules for one import kind
pub trait RowValidator: Send {
    fn validate_row(&mut self, ctx: &RowContext<'_>, report: &mut ValidationReport);
}

pub fn validator_for(kind: DataType) -> Box<dyn RowValidator> {
    match kind {
        DataType::Rate => Box::new(RateValidator),
        DataType::Attorney => Box::new(AttorneyValidator::default()),
        DataType::Billing => Box::new(BillingValidator),
        DataType::Matter => Box::new(MatterValidator),
    }
}

pub struct RateValidator;

impl RowValidator for RateValidator {
    fn validate_row(&mut self, ctx: &RowContext<'_>, report: &mut ValidationReport) {
        let row = ctx.row.number;

        if let Some(amount) = ctx.amount(RATE_AMOUNT, "Rate amount", report) {
            if amount.is_sign_negative() && !amount.is_zero() {
                report.add_error(row, "Rate amount cannot be negative");
            } else {
                if amount.normalize().scale() > ctx.options.max_decimal_places {
                    report.add_error(
                        row,
                        format!(
                            "Rate amount {} has more than {} decimal places",
                            amount, ctx.options.max_decimal_places
                        ),
                    );
                }
                check_rate_increase(ctx, amount, report);
            }
        }

        if let Some(code) = ctx.text(CURRENCY) {
            if !is_iso_currency(code) {
                report.add_error(row, format!("Invalid currency code '{}'", code));
            }
        }

        let effective = ctx.date(EFFECTIVE_DATE, report);
        let expiration = ctx.date(EXPIRATION_DATE, report);
        if let (Some(effective), Some(expiration)) = (effective, expiration) {
            if expiration <= effective {
                report.add_error(row, "Expiration date must be after effective date");
            }
        }
    }
}

fn check_rate_increase(ctx: &RowContext<'_>, proposed: Decimal, report: &mut ValidationReport) {
    let Some(limit) = ctx
        .options
        .max_increase_percent
        .and_then(|p| Decimal::try_from(p).ok())
    else {
        return;
    };

    let historical = ctx
        .text(HISTORICAL_RATE)
        .and_then(parse_decimal)
        .or_else(|| {
            [ATTORNEY_ID, ATTORNEY_NAME]
                .iter()
                .filter_map(|h| ctx.text(h))
                .find_map(|key| ctx.options.historical_rates.get(&key.to_lowercase()).copied())
        });

    let Some(historical) = historical.filter(|h| *h > Decimal::ZERO) else {
        return;
    };

    let increase = (proposed - historical) / historical * Decimal::ONE_HUNDRED;
    if increase > limit {
        report.add_warning(
            Some(ctx.row.number),
            format!(
                "Proposed rate {} is {}% above historical rate {} (limit {}%)",
                proposed,
                increase.round_dp(1),
                historical,
                limit
            ),
        );
    }
}

#[derive(Default)]
pub struct AttorneyValidator {
    seen: HashMap<String, usize>,
}

impl RowValidator for AttorneyValidator {
    fn validate_row(&mut self, ctx: &RowContext<'_>, report: &mut ValidationReport) {
        let row = ctx.row.number;

        let bar = ctx.date(BAR_ADMISSION_DATE, report);
        let graduation = ctx.date(GRADUATION_DATE, report);

        if matches!(bar, Some(d) if d > ctx.today) {
            report.add_error(row, "Bar admission date cannot be in the future");
        }
        if matches!(graduation, Some(d) if d > ctx.today) {
            report.add_error(row, "Graduation date cannot be in the future");
        }
        if let (Some(bar), Some(graduation)) = (bar, graduation) {
            if graduation > bar {
                report.add_error(row, "Graduation date cannot be after bar admission date");
            }
        }

        let name = ctx.text(ATTORNEY_NAME);
        let key = match ctx.text(ATTORNEY_ID) {
            Some(id) => Some(format!("id:{}", id.to_lowercase())),
            None => name.map(|n| {
                format!(
                    "name:{}|{}",
                    n.to_lowercase(),
                    ctx.text(FIRM_NAME).unwrap_or_default().to_lowercase()
                )
            }),
        };

        if let Some(key) = key {
            match self.seen.get(&key) {
                Some(first) => report.add_warning(
                    Some(row),
                    format!(
                        "Duplicate attorney '{}' (first seen on row {})",
                        name.unwrap_or("?"),
                        first
                    ),
                ),
                None => {
                    self.seen.insert(key, row);
                }
            }
        }
    }
}

pub struct BillingValidator;

impl RowValidator for BillingValidator {
    fn validate_row(&mut self, ctx: &RowContext<'_>, report: &mut ValidationReport) {
        let row = ctx.row.number;

        if let Some(hours) = ctx.amount(HOURS, "Hours", report) {
            if hours.is_sign_negative() && !hours.is_zero() {
                report.add_error(row, "Hours cannot be negative");
            } else if Decimal::try_from(ctx.options.high_hours_threshold)
                .map(|limit| hours > limit)
                .unwrap_or(false)
            {
                report.add_warning(Some(row), format!("Unusually high hours ({})", hours));
            }
        }

        if let Some(fees) = ctx.amount(FEES, "Fees", report) {
            if fees.is_sign_negative() && !fees.is_zero() {
                report.add_error(row, "Fees cannot be negative");
            }
        }

        if let Some(date) = ctx.date(BILLING_DATE, report) {
            if date > ctx.today {
                report.add_error(row, "Billing date cannot be in the future");
            } else if Duration::try_days(ctx.options.stale_after_days).is_some_and(|limit| ctx.today - date > limit) {
                report.add_warning(
                    Some(row),
                    format!(
                        "Billing date {} is more than {} days old (stale data)",
                        date, ctx.options.stale_after_days
                    ),
                );
            }
        }
    }
}

pub struct MatterValidator;

impl RowValidator for MatterValidator {
    fn validate_row(&mut self, ctx: &RowContext<'_>, report: &mut ValidationReport) {
        let open = ctx.date(OPEN_DATE, report);
        let close = ctx.date(CLOSE_DATE, report);
        if let (Some(open), Some(close)) = (open, close) {
            if close < open {
                report.add_error(ctx.row.number, "Close date cannot be before open date");
            }
        }
    }
}

/// Structural checks plus the business rules for `schema.kind`.
///
/// A cancelled run stops between rows and notes how far it got in the
/// report's warnings.
pub fn validate_table(
    table: &ParsedTable,
    schema: &ImportSchema,
    options: &ValidationOptions,
    cancel: Option<&CancellationToken>,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let columns = Columns::new(&table.headers);

    let missing: Vec<&str> = schema
        .required
        .iter()
        .map(String::as_str)
        .filter(|h| columns.resolve(h).is_none())
        .collect();
    for header in &missing {
        report.add_general_error(format!("Missing required column: {}", header));
    }

    if table.is_empty() {
        report.add_general_error("File contains no data rows");
    }

    let mut validator = validator_for(schema.kind);
    let today = options.reference_date();

    for (checked, row) in table.rows.iter().enumerate() {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            info!(checked, total = table.len(), "Validation cancelled");
            report.add_warning(
                None,
                format!("Validation cancelled after {} of {} rows", checked, table.len()),
            );
            break;
        }

        for header in &schema.required {
            if columns.resolve(header).is_some() && columns.text(row, header).is_none() {
                report.add_error(row.number, format!("Missing required value for '{}'", header));
            }
        }

        let ctx = RowContext {
            row,
            columns: &columns,
            options,
            today,
        };
        validator.validate_row(&ctx, &mut report);
    }

    report.suggestion = suggestion(&report, schema, !missing.is_empty());
    debug!(
        kind = %schema.kind,
        valid = report.valid,
        errors = report.error_count(),
        warnings = report.warnings.len(),
        "Validation finished"
    );
    report
}

fn suggestion(report: &ValidationReport, schema: &ImportSchema, missing_columns: bool) -> String {
    if missing_columns {
        return format!(
            "Add the missing required columns or start from the {} template",
            schema.kind
        );
    }

    let bad_rows = report
        .errors
        .keys()
        .filter(|k| matches!(k, ratelink_core::RowKey::Row(_)))
        .count();
    if bad_rows > 0 {
        return format!(
            "Fix {} error(s) in {} row(s) and upload the file again",
            report.error_count(),
            bad_rows
        );
    }
    if !report.valid {
        return "Upload a file with at least one data row".to_string();
    }
    if !report.warnings.is_empty() {
        return format!(
            "No blocking errors; review {} warning(s) before importing",
            report.warnings.len()
        );
    }
    "File is ready to import".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_delimited;
    use rstest::rstest;

    #[test]
    fn test_huge_stale_window_never_warns() {
        let table = read_delimited(
            b"Matter ID,Attorney Name,Billing Date,Hours,Fees\nM-1,Jane,1990-01-01,1,100\n",
            None,
        )
        .unwrap();
        let mut options = ValidationOptions::default().with_today(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        options.stale_after_days = i64::MAX;

        let report = validate_table(&table, &ImportSchema::for_kind(DataType::Billing), &options, None);
        assert!(report.valid);
        assert!(report.warnings.is_empty());

        options.stale_after_days = 365;
        let report = validate_table(&table, &ImportSchema::for_kind(DataType::Billing), &options, None);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("stale data"));
    }

    #[rstest]
    #[case("2025-01-15")]
    #[case("01/15/2025")]
    #[case("2025/01/15")]
    #[case("15.01.2025")]
    #[case("2025-01-15 09:30:00")]
    fn test_parse_date_layouts(#[case] text: &str) {
        assert_eq!(parse_date(text), NaiveDate::from_ymd_opt(2025, 1, 15));
    }

    #[rstest]
    #[case("$1,250.50", Some("1250.50"))]
    #[case(" 450 ", Some("450"))]
    #[case("-5", Some("-5"))]
    #[case("abc", None)]
    #[case("", None)]
    fn test_parse_decimal(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_decimal(text), expected.map(|e| Decimal::from_str(e).unwrap()));
    }

    #[rstest]
    #[case("USD", true)]
    #[case("eur", true)]
    #[case("XYZ", false)]
    #[case("US", false)]
    fn test_currency_codes(#[case] code: &str, #[case] valid: bool) {
        assert_eq!(is_iso_currency(code), valid);
    }
}
