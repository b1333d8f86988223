//! Core types for registry entity records
//!
//! An [`EntityRecord`] is the normalized document produced for one `<СвЮЛ>`
//! (legal entity) or `<СвИП>` (sole proprietor) subtree. Records are immutable
//! once built; see [`crate::extract::RecordBuilder`] for how they are assembled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary state registration number (ОГРН / ОГРНИП)
pub type RegistrationNumber = String;

/// Epoch milliseconds (UTC)
pub type EpochMillis = i64;

// ============================================================================
// Discriminators
// ============================================================================

/// Which registry an entity comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    /// Legal entity (EGRUL)
    Legal,
    /// Sole proprietor (EGRIP)
    Individual,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legal => "LEGAL",
            Self::Individual => "INDIVIDUAL",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized registry status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Active,
    /// The status code was present but not in the status table
    ActiveUnknownCode,
    Liquidating,
    Liquidated,
    Bankrupt,
    Reorganizing,
}

// ============================================================================
// Record components
// ============================================================================

/// Long and short display forms of the entity name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayName {
    pub long: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
}

/// Activity classification code (OKVED)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCode {
    /// Main activity or secondary
    pub main: bool,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Classifier version (2001 or 2014)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Surname, given name and patronymic of a natural person
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
}

impl PersonName {
    /// Space-joined full name, skipping absent parts
    pub fn full(&self) -> String {
        [&self.surname, &self.given, &self.patronymic]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.full().is_empty()
    }
}

/// Legal address: composed human-readable value plus normalized parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Founder variant, decided by the tag path the identity arrived under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FounderVariant {
    DomesticLegal,
    ForeignLegal,
    /// Russian Federation, a federal subject or a municipality acting through an organ
    PublicBody,
    NaturalPerson,
}

impl FounderVariant {
    pub fn kind(&self) -> FounderKind {
        match self {
            Self::NaturalPerson => FounderKind::Physical,
            _ => FounderKind::Legal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FounderKind {
    Legal,
    Physical,
}

/// Ownership share in the charter capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Share {
    Percent { value: f64 },
    Decimal { value: f64 },
    Fraction { numerator: u64, denominator: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Founder {
    pub variant: FounderVariant,
    pub kind: FounderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ogrn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nominal_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<Share>,
}

/// Charter capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capital {
    pub kind: String,
    pub amount: f64,
}

/// A government office (tax, pension fund, social insurance)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorities {
    /// Registering authority (СвРегОрг)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<Authority>,
    /// Tax office holding the entity on record (СвНО)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting: Option<Authority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pension_fund: Option<Authority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_insurance: Option<Authority>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<EpochMillis>,
    /// Code of the issuing office
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_authority: Option<String>,
}

impl RegistrationDocument {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.series.is_none()
            && self.number.is_none()
            && self.issue_date.is_none()
            && self.issue_authority.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationDocuments {
    /// Tax registration certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_report: Option<RegistrationDocument>,
    /// Pension fund registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pension_fund: Option<RegistrationDocument>,
}

impl RegistrationDocuments {
    pub fn is_empty(&self) -> bool {
        self.tax_report.is_none() && self.pension_fund.is_none()
    }
}

/// Email as published in the registry, split at the last `@`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub value: String,
    pub local: String,
    pub domain: String,
}

impl Email {
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_string();
        let (local, domain) = match value.rsplit_once('@') {
            Some((local, domain)) => (local.to_string(), domain.to_string()),
            None => (value.clone(), String::new()),
        };
        Self { value, local, domain }
    }
}

/// Sole proprietor legal form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalForm {
    pub full: String,
    pub short: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizenship {
    /// ВидГражд: 1 = Russian citizen, 2 = foreign citizen, 3 = stateless
    pub kind_code: String,
    pub country: String,
}

// ============================================================================
// Entity record
// ============================================================================

/// Normalized registry entity, ready for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    /// Headline display value
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_reg_code: Option<String>,
    pub primary_registration_number: RegistrationNumber,
    pub registration_date: EpochMillis,
    pub status: Status,
    pub display_name: DisplayName,
    #[serde(default)]
    pub main_classification_codes: Vec<ActivityCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub authorities: Authorities,

    // Legal entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founders: Option<Vec<Founder>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<Capital>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_documents: Option<RegistrationDocuments>,

    // Sole proprietors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<PersonName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_form: Option<LegalForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citizenship: Option<Citizenship>,
}

impl EntityRecord {
    /// Storage key: kind plus registration number
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.primary_registration_number)
    }
}
