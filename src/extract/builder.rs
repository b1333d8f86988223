//! Incremental assembly of one entity record
//!
//! A [`RecordBuilder`] lives for exactly one entity subtree. List fields append,
//! scalar fields are last-write-wins (absent values never erase earlier ones),
//! and the registering authority is first-write-wins. Founders are staged in an
//! owned [`FounderDraft`] and only reach the record through
//! [`RecordBuilder::commit_founder`].

use super::dictionaries::{map_status, parse_date, UnknownStatusPolicy};
use super::ExtractError;
use crate::types::{
    ActivityCode, Address, Authorities, Authority, Capital, Citizenship, DisplayName, Email,
    EntityKind, EntityRecord, EpochMillis, Founder, FounderVariant, LegalForm, PersonName,
    RegistrationDocument, RegistrationDocuments, Share, Status,
};
use tracing::{debug, warn};

/// Address components in composition order
#[derive(Debug, Default, Clone)]
struct AddressParts {
    postal_code: Option<String>,
    region_code: Option<String>,
    region: Option<String>,
    municipal_area: Option<String>,
    settlement: Option<String>,
    locality: Option<String>,
    district: Option<String>,
    street: Option<String>,
    building: Vec<String>,
    apartment: Option<String>,
    room: Option<String>,
}

impl AddressParts {
    fn compose(self) -> Option<Address> {
        let building = (!self.building.is_empty()).then(|| self.building.join(", "));
        let value = [
            self.postal_code.as_deref(),
            self.region.as_deref(),
            self.municipal_area.as_deref(),
            self.settlement.as_deref(),
            self.locality.as_deref(),
            self.district.as_deref(),
            self.street.as_deref(),
            building.as_deref(),
            self.apartment.as_deref(),
            self.room.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        if value.is_empty() {
            return None;
        }

        Some(Address {
            value,
            postal_code: self.postal_code,
            region_code: self.region_code,
            region: self.region,
        })
    }
}

/// Founder being assembled from sibling tags inside one founder wrapper
#[derive(Debug, Default, Clone)]
pub struct FounderDraft {
    variant: Option<FounderVariant>,
    ogrn: Option<String>,
    inn: Option<String>,
    name: Option<String>,
    person: Option<PersonName>,
    nominal_value: Option<f64>,
    share: Option<Share>,
}

impl FounderDraft {
    /// No identifying or share data staged yet (the variant alone does not count)
    pub fn is_empty(&self) -> bool {
        self.ogrn.is_none()
            && self.inn.is_none()
            && self.name.is_none()
            && self.person.is_none()
            && self.nominal_value.is_none()
            && self.share.is_none()
    }

    fn into_founder(self) -> Founder {
        let variant = self.variant.unwrap_or(if self.person.is_some() {
            FounderVariant::NaturalPerson
        } else {
            FounderVariant::DomesticLegal
        });
        Founder {
            variant,
            kind: variant.kind(),
            ogrn: self.ogrn,
            inn: self.inn,
            name: self.name,
            person: self.person,
            nominal_value: self.nominal_value,
            share: self.share,
        }
    }
}

/// Mutable accumulator for one entity
#[derive(Debug)]
pub struct RecordBuilder {
    kind: EntityKind,
    status_policy: UnknownStatusPolicy,

    value: Option<String>,
    tax_id: Option<String>,
    tax_reg_code: Option<String>,
    registration_number: Option<String>,
    registration_date: Option<EpochMillis>,
    status: Status,
    long_name: Option<String>,
    short_name: Option<String>,
    activities: Vec<ActivityCode>,
    manager_name: Option<String>,
    manager_title: Option<String>,
    emails: Vec<Email>,
    authorities: Authorities,

    kpp: Option<String>,
    address: AddressParts,
    founders: Vec<Founder>,
    founder: FounderDraft,
    capital: Option<Capital>,
    tax_report_doc: RegistrationDocument,
    pension_doc: RegistrationDocument,

    person_name: Option<PersonName>,
    legal_form: Option<LegalForm>,
    citizenship: Option<Citizenship>,
}

fn assign(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
    }
}

/// Parse an optional secondary date; malformed values are logged and skipped
fn optional_date(field: &str, value: Option<&str>) -> Option<EpochMillis> {
    let value = value?;
    match parse_date(field, value) {
        Ok(millis) => Some(millis),
        Err(e) => {
            warn!("Skipping field: {}", e);
            None
        }
    }
}

impl RecordBuilder {
    pub fn new(kind: EntityKind) -> Self {
        Self::with_status_policy(kind, UnknownStatusPolicy::default())
    }

    pub fn with_status_policy(kind: EntityKind, status_policy: UnknownStatusPolicy) -> Self {
        Self {
            kind,
            status_policy,
            value: None,
            tax_id: None,
            tax_reg_code: None,
            registration_number: None,
            registration_date: None,
            status: Status::Active,
            long_name: None,
            short_name: None,
            activities: Vec::new(),
            manager_name: None,
            manager_title: None,
            emails: Vec::new(),
            authorities: Authorities::default(),
            kpp: None,
            address: AddressParts::default(),
            founders: Vec::new(),
            founder: FounderDraft::default(),
            capital: None,
            tax_report_doc: RegistrationDocument::default(),
            pension_doc: RegistrationDocument::default(),
            person_name: None,
            legal_form: None,
            citizenship: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn registration_number(&self) -> Option<&str> {
        self.registration_number.as_deref()
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Primary registration number and date; the date is parsed here so a
    /// malformed value fails at the tag that carried it.
    pub fn set_registration(&mut self, number: &str, date: &str) -> Result<(), ExtractError> {
        let millis = parse_date("registration_date", date)?;
        self.registration_number = Some(number.trim().to_string());
        self.registration_date = Some(millis);
        Ok(())
    }

    pub fn set_tax_id(&mut self, tax_id: Option<String>) {
        assign(&mut self.tax_id, tax_id);
    }

    pub fn set_kpp(&mut self, kpp: Option<String>) {
        assign(&mut self.kpp, kpp);
    }

    pub fn set_value(&mut self, value: Option<String>) {
        assign(&mut self.value, value);
    }

    pub fn set_long_name(&mut self, name: Option<String>) {
        assign(&mut self.long_name, name);
    }

    pub fn set_short_name(&mut self, name: Option<String>) {
        assign(&mut self.short_name, name);
    }

    pub fn set_status_code(&mut self, code: &str) {
        self.status = map_status(code, self.status_policy);
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn add_activity(
        &mut self,
        main: bool,
        code: String,
        name: Option<String>,
        version: Option<String>,
    ) {
        self.activities.push(ActivityCode {
            main,
            code,
            name,
            version,
        });
    }

    pub fn add_email(&mut self, raw: &str) {
        if !raw.trim().is_empty() {
            self.emails.push(Email::parse(raw));
        }
    }

    // ------------------------------------------------------------------
    // Management
    // ------------------------------------------------------------------

    pub fn set_manager_name(&mut self, name: Option<String>) {
        assign(&mut self.manager_name, name);
    }

    pub fn set_manager_title(&mut self, title: Option<String>) {
        assign(&mut self.manager_title, title);
    }

    // ------------------------------------------------------------------
    // Address
    // ------------------------------------------------------------------

    pub fn set_postal_code(&mut self, value: Option<String>) {
        assign(&mut self.address.postal_code, value);
    }

    pub fn set_region_code(&mut self, value: Option<String>) {
        assign(&mut self.address.region_code, value);
    }

    pub fn set_region(&mut self, value: Option<String>) {
        assign(&mut self.address.region, value);
    }

    pub fn set_municipal_area(&mut self, value: Option<String>) {
        assign(&mut self.address.municipal_area, value);
    }

    pub fn set_settlement(&mut self, value: Option<String>) {
        assign(&mut self.address.settlement, value);
    }

    pub fn set_locality(&mut self, value: Option<String>) {
        assign(&mut self.address.locality, value);
    }

    pub fn set_district(&mut self, value: Option<String>) {
        assign(&mut self.address.district, value);
    }

    pub fn set_street(&mut self, value: Option<String>) {
        assign(&mut self.address.street, value);
    }

    /// Buildings accumulate: `дом 5, корпус 2`
    pub fn add_building(&mut self, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.address.building.push(value);
        }
    }

    pub fn set_apartment(&mut self, value: Option<String>) {
        assign(&mut self.address.apartment, value);
    }

    pub fn set_room(&mut self, value: Option<String>) {
        assign(&mut self.address.room, value);
    }

    // ------------------------------------------------------------------
    // Authorities and registration documents
    // ------------------------------------------------------------------

    /// First registering authority wins; later duplicates are ignored
    pub fn set_registration_authority(&mut self, authority: Authority) {
        if self.authorities.registration.is_none() {
            self.authorities.registration = Some(authority);
        }
    }

    pub fn set_reporting_authority(&mut self, authority: Authority) {
        self.tax_reg_code = Some(authority.code.clone());
        self.authorities.reporting = Some(authority);
    }

    pub fn set_pension_fund_authority(&mut self, authority: Authority) {
        self.authorities.pension_fund = Some(authority);
    }

    pub fn set_social_insurance_authority(&mut self, authority: Authority) {
        self.authorities.social_insurance = Some(authority);
    }

    /// Merge into the staged tax registration document
    pub fn stage_tax_report_doc(&mut self, date: Option<&str>, authority_code: Option<String>) {
        if let Some(millis) = optional_date("tax_report.issue_date", date) {
            self.tax_report_doc.issue_date = Some(millis);
        }
        assign(&mut self.tax_report_doc.issue_authority, authority_code);
    }

    /// Merge into the staged pension fund registration document
    pub fn stage_pension_doc(
        &mut self,
        number: Option<String>,
        date: Option<&str>,
        authority_code: Option<String>,
    ) {
        assign(&mut self.pension_doc.number, number);
        if let Some(millis) = optional_date("pension_fund.issue_date", date) {
            self.pension_doc.issue_date = Some(millis);
        }
        assign(&mut self.pension_doc.issue_authority, authority_code);
    }

    pub fn set_capital(&mut self, kind: Option<String>, amount: f64) {
        self.capital = Some(Capital {
            kind: kind.unwrap_or_default(),
            amount,
        });
    }

    // ------------------------------------------------------------------
    // Founders
    // ------------------------------------------------------------------

    /// Start staging a founder of the given variant
    pub fn begin_founder(&mut self, variant: FounderVariant) {
        if !self.founder.is_empty() {
            debug!("Discarding uncommitted founder draft: {:?}", self.founder);
        }
        self.founder = FounderDraft {
            variant: Some(variant),
            ..FounderDraft::default()
        };
    }

    pub fn stage_founder_identity(
        &mut self,
        ogrn: Option<String>,
        inn: Option<String>,
        name: Option<String>,
    ) {
        assign(&mut self.founder.ogrn, ogrn);
        assign(&mut self.founder.inn, inn);
        assign(&mut self.founder.name, name);
    }

    /// Name the founder only if nothing named it yet
    pub fn stage_founder_fallback_name(&mut self, name: Option<String>) {
        if self.founder.name.is_none() {
            assign(&mut self.founder.name, name);
        }
    }

    /// Natural-person founder; merges with an identifier staged from another tag
    pub fn stage_founder_person(&mut self, person: PersonName, inn: Option<String>) {
        if !person.is_empty() {
            self.founder.person = Some(person);
        }
        assign(&mut self.founder.inn, inn);
    }

    pub fn stage_founder_nominal_value(&mut self, value: f64) {
        self.founder.nominal_value = Some(value);
    }

    pub fn stage_founder_share(&mut self, share: Share) {
        self.founder.share = Some(share);
    }

    pub fn founder_draft(&self) -> &FounderDraft {
        &self.founder
    }

    /// Append the staged founder if it has any data, then clear the staging slot.
    /// Returns whether a founder was appended.
    pub fn commit_founder(&mut self) -> bool {
        let draft = std::mem::take(&mut self.founder);
        if draft.is_empty() {
            return false;
        }
        self.founders.push(draft.into_founder());
        true
    }

    // ------------------------------------------------------------------
    // Sole proprietors
    // ------------------------------------------------------------------

    pub fn set_person_name(&mut self, name: PersonName) {
        self.person_name = Some(name);
    }

    pub fn set_legal_form(&mut self, form: Option<LegalForm>) {
        if form.is_some() {
            self.legal_form = form;
        }
    }

    pub fn legal_form(&self) -> Option<&LegalForm> {
        self.legal_form.as_ref()
    }

    pub fn set_citizenship(&mut self, citizenship: Citizenship) {
        self.citizenship = Some(citizenship);
    }

    // ------------------------------------------------------------------

    /// Produce the immutable record
    pub fn build(self) -> Result<EntityRecord, ExtractError> {
        let primary_registration_number = self
            .registration_number
            .ok_or(ExtractError::MissingField("primary_registration_number"))?;
        let registration_date = self
            .registration_date
            .ok_or(ExtractError::MissingField("registration_date"))?;

        if !self.founder.is_empty() {
            debug!(
                "Dropping founder draft never closed in {}",
                primary_registration_number
            );
        }

        let long = self.long_name.unwrap_or_default();
        let value = self.value.unwrap_or_else(|| long.clone());

        let non_empty = |doc: RegistrationDocument| (!doc.is_empty()).then_some(doc);
        let documents = RegistrationDocuments {
            tax_report: non_empty(self.tax_report_doc),
            pension_fund: non_empty(self.pension_doc),
        };

        Ok(EntityRecord {
            kind: self.kind,
            value,
            tax_id: self.tax_id,
            tax_reg_code: self.tax_reg_code,
            primary_registration_number,
            registration_date,
            status: self.status,
            display_name: DisplayName {
                long,
                short: self.short_name,
            },
            main_classification_codes: self.activities,
            manager_name: self.manager_name,
            manager_title: self.manager_title,
            emails: self.emails,
            authorities: self.authorities,
            kpp: self.kpp,
            address: self.address.compose(),
            founders: (!self.founders.is_empty()).then_some(self.founders),
            capital: self.capital,
            registration_documents: (!documents.is_empty()).then_some(documents),
            person_name: self.person_name,
            legal_form: self.legal_form,
            citizenship: self.citizenship,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn legal() -> RecordBuilder {
        let mut builder = RecordBuilder::new(EntityKind::Legal);
        builder.set_registration("1027700123456", "2015-06-01").unwrap();
        builder
    }

    #[test]
    fn test_scalar_last_write_wins_and_absent_keeps_value() {
        let mut builder = legal();
        builder.set_tax_id(s("7701234567"));
        builder.set_tax_id(s("7709999999"));
        builder.set_tax_id(None);
        let record = builder.build().unwrap();
        assert_eq!(record.tax_id.as_deref(), Some("7709999999"));
    }

    #[test]
    fn test_address_composition_order_and_omission() {
        let mut builder = legal();
        builder.set_street(s("ул. Ленина"));
        builder.set_postal_code(s("101000"));
        builder.add_building(s("дом 5"));
        builder.add_building(s("корпус 2"));
        builder.set_region(s("ГОРОД МОСКВА"));
        builder.set_room(s("ком. 3"));

        let address = builder.build().unwrap().address.unwrap();
        assert_eq!(
            address.value,
            "101000, ГОРОД МОСКВА, ул. Ленина, дом 5, корпус 2, ком. 3"
        );
        assert_eq!(address.postal_code.as_deref(), Some("101000"));
        assert_eq!(address.region.as_deref(), Some("ГОРОД МОСКВА"));
    }

    #[test]
    fn test_no_address_components_yields_no_address() {
        let mut builder = legal();
        builder.set_street(Some("   ".to_string()));
        let record = builder.build().unwrap();
        assert!(record.address.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("address").is_none());
        assert!(json.get("founders").is_none());
        assert!(json.get("registration_documents").is_none());
    }

    #[test]
    fn test_empty_founder_never_committed() {
        let mut builder = legal();
        builder.begin_founder(FounderVariant::DomesticLegal);
        assert!(!builder.commit_founder());
        assert!(builder.build().unwrap().founders.is_none());
    }

    #[test]
    fn test_founder_committed_once_and_cleared() {
        let mut builder = legal();
        builder.begin_founder(FounderVariant::NaturalPerson);
        builder.stage_founder_person(
            PersonName {
                surname: s("Петров"),
                given: s("Пётр"),
                patronymic: None,
            },
            None,
        );
        builder.stage_founder_person(PersonName::default(), s("770100000001"));
        builder.stage_founder_share(Share::Percent { value: 50.0 });
        assert!(builder.commit_founder());
        assert!(builder.founder_draft().is_empty());
        assert!(!builder.commit_founder());

        let founders = builder.build().unwrap().founders.unwrap();
        assert_eq!(founders.len(), 1);
        let founder = &founders[0];
        assert_eq!(founder.inn.as_deref(), Some("770100000001"));
        assert_eq!(founder.person.as_ref().unwrap().full(), "Петров Пётр");
        assert_eq!(founder.share, Some(Share::Percent { value: 50.0 }));
    }

    #[test]
    fn test_registration_authority_first_write_wins() {
        let mut builder = legal();
        builder.set_registration_authority(Authority {
            code: "7746".to_string(),
            ..Authority::default()
        });
        builder.set_registration_authority(Authority {
            code: "0000".to_string(),
            ..Authority::default()
        });
        let record = builder.build().unwrap();
        assert_eq!(record.authorities.registration.unwrap().code, "7746");
    }

    #[test]
    fn test_bad_registration_date_fails_fast() {
        let mut builder = RecordBuilder::new(EntityKind::Legal);
        let err = builder.set_registration("1", "01.06.2015").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidDate { .. }));
        assert!(matches!(builder.build(), Err(ExtractError::MissingField(_))));
    }

    #[test]
    fn test_documents_merge_and_bad_secondary_date_skipped() {
        let mut builder = legal();
        builder.stage_tax_report_doc(Some("2015-06-02"), None);
        builder.stage_tax_report_doc(None, s("7701"));
        builder.stage_pension_doc(s("087-000-000001"), Some("not-a-date"), None);

        let docs = builder.build().unwrap().registration_documents.unwrap();
        let tax = docs.tax_report.unwrap();
        assert_eq!(tax.issue_date, Some(1_433_203_200_000));
        assert_eq!(tax.issue_authority.as_deref(), Some("7701"));
        let pension = docs.pension_fund.unwrap();
        assert_eq!(pension.number.as_deref(), Some("087-000-000001"));
        assert_eq!(pension.issue_date, None);
    }

    #[test]
    fn test_reporting_authority_sets_tax_reg_code() {
        let mut builder = legal();
        builder.set_reporting_authority(Authority {
            code: "7704".to_string(),
            name: s("ИФНС № 4"),
            address: None,
        });
        assert_eq!(builder.build().unwrap().tax_reg_code.as_deref(), Some("7704"));
    }
}
