//! Fixed lookup tables and field parsers used by the dispatch handlers

use super::ExtractError;
use crate::types::{Citizenship, EpochMillis, LegalForm, Status};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Registry date format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Country label for `ВидГражд = 1`
pub const HOME_COUNTRY: &str = "Российская Федерация";

/// How to treat a status code missing from [`status_for_code`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatusPolicy {
    /// Map to [`Status::ActiveUnknownCode`]
    #[default]
    Flag,
    /// Map to [`Status::Active`]
    Active,
}

/// Parse a `yyyy-MM-dd` date to epoch millis at UTC midnight
pub fn parse_date(field: &str, value: &str) -> Result<EpochMillis, ExtractError> {
    let invalid = || ExtractError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| invalid())?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

/// Status table for `КодСтатусЮЛ` / `КодСтатус`
pub fn status_for_code(code: &str) -> Option<Status> {
    let status = match code.trim() {
        "101" | "102" | "105" | "106" | "107" => Status::Liquidating,
        "113" | "114" | "115" | "116" | "117" => Status::Bankrupt,
        "701" | "702" | "801" => Status::Liquidated,
        other => match other.parse::<u16>() {
            Ok(121..=139) => Status::Reorganizing,
            _ => return None,
        },
    };
    Some(status)
}

pub fn map_status(code: &str, policy: UnknownStatusPolicy) -> Status {
    status_for_code(code).unwrap_or(match policy {
        UnknownStatusPolicy::Flag => Status::ActiveUnknownCode,
        UnknownStatusPolicy::Active => Status::Active,
    })
}

/// Sole proprietor legal form by `КодВидИП`
pub fn legal_form_for_code(code: &str) -> Option<LegalForm> {
    let (full, short) = match code.trim() {
        "1" => ("Индивидуальный предприниматель", "ИП"),
        "2" => ("Глава крестьянского (фермерского) хозяйства", "Глава КФХ"),
        _ => return None,
    };
    Some(LegalForm {
        full: full.to_string(),
        short: short.to_string(),
    })
}

/// Citizenship from `ВидГражд` and `НаимСтран`.
///
/// Code `1` always means the home country; every other code needs an explicit
/// country name and yields `None` without one.
pub fn citizenship(kind_code: &str, country: Option<&str>) -> Option<Citizenship> {
    let kind_code = kind_code.trim();
    let country = if kind_code == "1" {
        HOME_COUNTRY.to_string()
    } else {
        country.map(str::trim).filter(|c| !c.is_empty())?.to_string()
    };
    Some(Citizenship {
        kind_code: kind_code.to_string(),
        country,
    })
}

/// Short label for `МуниципРайон@ВидКод`
pub fn municipal_area_kind(code: &str) -> Option<&'static str> {
    match code.trim() {
        "1" => Some("м.р-н"),
        "2" => Some("г.о."),
        "3" => Some("м.о."),
        _ => None,
    }
}

/// Short label for `ГородСелПоселен@ВидКод`
pub fn settlement_kind(code: &str) -> Option<&'static str> {
    match code.trim() {
        "1" => Some("г.п."),
        "2" => Some("с.п."),
        "3" => Some("меж.тер."),
        "4" => Some("вн.р-н"),
        _ => None,
    }
}

/// Join an optional kind label and a name: `"ул. Ленина"`, or just the name
pub fn with_kind(kind: Option<&str>, name: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [kind, name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Parse a registry decimal (`"10000.00"`, `"10000,5"`)
pub fn parse_amount(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_epoch_millis() {
        assert_eq!(parse_date("ДатаОГРН", "2015-06-01").unwrap(), 1_433_116_800_000);
        assert_eq!(parse_date("ДатаОГРН", "1970-01-01").unwrap(), 0);
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        for bad in ["01.06.2015", "2015-13-01", "", "2015-06"] {
            let err = parse_date("ДатаОГРН", bad).unwrap_err();
            assert!(matches!(err, ExtractError::InvalidDate { .. }), "{bad}");
        }
    }

    #[test]
    fn test_status_table() {
        assert_eq!(status_for_code("101"), Some(Status::Liquidating));
        assert_eq!(status_for_code("114"), Some(Status::Bankrupt));
        assert_eq!(status_for_code("129"), Some(Status::Reorganizing));
        assert_eq!(status_for_code("701"), Some(Status::Liquidated));
        assert_eq!(status_for_code("999"), None);
    }

    #[test]
    fn test_unknown_status_policy() {
        assert_eq!(map_status("999", UnknownStatusPolicy::Flag), Status::ActiveUnknownCode);
        assert_eq!(map_status("999", UnknownStatusPolicy::Active), Status::Active);
        assert_eq!(map_status("801", UnknownStatusPolicy::Active), Status::Liquidated);
    }

    #[test]
    fn test_citizenship_rule() {
        let home = citizenship("1", Some("ignored")).unwrap();
        assert_eq!(home.country, HOME_COUNTRY);

        let foreign = citizenship("2", Some("Республика Беларусь")).unwrap();
        assert_eq!(foreign.country, "Республика Беларусь");

        assert!(citizenship("2", None).is_none());
    }

    #[test]
    fn test_with_kind_and_amount() {
        assert_eq!(with_kind(Some("ул."), Some("Ленина")).as_deref(), Some("ул. Ленина"));
        assert_eq!(with_kind(None, Some("Ленина")).as_deref(), Some("Ленина"));
        assert_eq!(with_kind(Some(" "), None), None);
        assert_eq!(parse_amount("10000,50"), Some(10000.5));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_legal_form_table() {
        assert_eq!(legal_form_for_code("1").unwrap().short, "ИП");
        assert!(legal_form_for_code("9").is_none());
    }
}
