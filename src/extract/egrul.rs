//! Dispatch table for the legal-entity registry (EGRUL)

use super::builder::RecordBuilder;
use super::common;
use super::dictionaries::{municipal_area_kind, parse_amount, settlement_kind, with_kind};
use super::dispatch::{Guard, Rule, Schema, TextRule};
use super::tokenizer::Attrs;
use super::ExtractError;
use crate::types::{EntityKind, FounderVariant, Share};
use tracing::warn;

pub const ENTITY_TAG: &str = "СвЮЛ";

const ADDRESS: &str = "СвАдресЮЛ";
const MANAGER: &str = "СведДолжнФЛ";
const FOUNDERS: &str = "СвУчредит";

pub static SCHEMA: Schema = Schema {
    kind: EntityKind::Legal,
    entity_tag: ENTITY_TAG,
    start: start_entity,
    rules: RULES,
    text_rules: TEXT_RULES,
};

static RULES: &[Rule] = &[
    // Identity and naming
    Rule::open("СвУчетНО", Guard::Always, tax_registration),
    Rule::open("СвНаимЮЛ", Guard::Always, names),
    Rule::open("СвНаимЮЛСокр", Guard::Always, short_name),
    Rule::open("СвСтатус", Guard::Always, status),
    // Management
    Rule::open("СвФЛ", Guard::Within(MANAGER), manager_name),
    Rule::open("СвДолжн", Guard::Within(MANAGER), manager_title),
    // Legal address
    Rule::open("СвАдрЮЛФИАС", Guard::Within(ADDRESS), postal_code),
    Rule::open("МуниципРайон", Guard::Within(ADDRESS), municipal_area),
    Rule::open("ГородСелПоселен", Guard::Within(ADDRESS), settlement),
    Rule::open("НаселенПункт", Guard::Within(ADDRESS), locality),
    Rule::open("ЭлПланСтруктур", Guard::Within(ADDRESS), district),
    Rule::open("ЭлУлДорСети", Guard::Within(ADDRESS), street),
    Rule::open("Здание", Guard::Within(ADDRESS), building),
    Rule::open("ПомещЗдания", Guard::Within(ADDRESS), apartment),
    Rule::open("ПомещКвартиры", Guard::Within(ADDRESS), room),
    // Classification and contacts
    Rule::open("СвОКВЭДОсн", Guard::Always, common::main_activity),
    Rule::open("СвОКВЭДДоп", Guard::Always, common::extra_activity),
    Rule::open("СвАдрЭлПочты", Guard::Always, common::email),
    // Authorities and registration documents
    Rule::open("СвРегОрг", Guard::Always, common::registration_authority),
    Rule::open("СвНО", Guard::Within("СвУчетНО"), common::reporting_authority),
    Rule::open("СвРегПФ", Guard::Always, common::pension_registration),
    Rule::open("СвОргПФ", Guard::Within("СвРегПФ"), common::pension_fund_office),
    Rule::open("СвОргФСС", Guard::Within("СвРегФСС"), common::social_insurance_office),
    Rule::open("СвУстКап", Guard::Always, capital),
    // Founders: each wrapper stages one founder and commits it on close
    Rule::wrapper("УчрЮЛРос", Guard::Within(FOUNDERS), begin_domestic, commit_founder),
    Rule::wrapper("УчрЮЛИн", Guard::Within(FOUNDERS), begin_foreign, commit_founder),
    Rule::wrapper("УчрРФСубМО", Guard::Within(FOUNDERS), begin_public_body, commit_founder),
    Rule::wrapper("УчрФЛ", Guard::Within(FOUNDERS), begin_person, commit_founder),
    // Identity tags count only as direct children of the wrapper; the same tags
    // also describe pledgees (СвОбрем) and estate executors (ЛицоУпрНасл) further down
    Rule::open("НаимИННЮЛ", Guard::Parents(&[FOUNDERS, "УчрЮЛРос"]), founder_legal_identity),
    Rule::open("НаимИННЮЛ", Guard::Parents(&[FOUNDERS, "УчрЮЛИн"]), founder_legal_identity),
    Rule::open("СвРегИн", Guard::Parents(&[FOUNDERS, "УчрЮЛИн"]), founder_foreign_registration),
    Rule::open("ВидНаимУчр", Guard::Parents(&[FOUNDERS, "УчрРФСубМО"]), founder_public_body_name),
    Rule::open(
        "НаимИННЮЛ",
        Guard::Parents(&[FOUNDERS, "УчрРФСубМО", "СвОргОсущПр"]),
        founder_acting_organ,
    ),
    Rule::open("СвФЛ", Guard::Parents(&[FOUNDERS, "УчрФЛ"]), founder_person),
    Rule::open("ДоляУстКап", Guard::Within(FOUNDERS), founder_nominal_value),
    Rule::open("ДробПрост", Guard::Within(FOUNDERS), founder_fraction),
];

static TEXT_RULES: &[TextRule] = &[
    TextRule::new("НаимРегион", Guard::Within(ADDRESS), region_name),
    TextRule::new("Регион", Guard::Within(ADDRESS), region_code),
    TextRule::new("Процент", Guard::Within(FOUNDERS), founder_percent),
    TextRule::new("ДробДесят", Guard::Within(FOUNDERS), founder_decimal),
];

// ----------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------

fn start_entity(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let ogrn = attrs.require(ENTITY_TAG, "ОГРН")?;
    let date = attrs.require(ENTITY_TAG, "ДатаОГРН")?;
    b.set_registration(ogrn, date)?;
    b.set_tax_id(attrs.string("ИНН"));
    b.set_kpp(attrs.string("КПП"));
    Ok(())
}

fn tax_registration(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_tax_id(attrs.string("ИНН"));
    b.set_kpp(attrs.string("КПП"));
    b.stage_tax_report_doc(attrs.get("ДатаПостУч"), None);
    Ok(())
}

fn names(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let full = attrs.string("НаимЮЛПолн");
    b.set_value(full.clone());
    b.set_long_name(full);
    b.set_short_name(attrs.string("НаимЮЛСокр"));
    Ok(())
}

fn short_name(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_short_name(attrs.string("НаимСокр"));
    Ok(())
}

fn status(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    if let Some(code) = attrs.get("КодСтатусЮЛ") {
        b.set_status_code(code);
    }
    Ok(())
}

fn manager_name(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let name = common::person_name(attrs);
    if !name.is_empty() {
        b.set_manager_name(Some(name.full()));
    }
    Ok(())
}

fn manager_title(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_manager_title(attrs.string("НаимДолжн"));
    Ok(())
}

fn capital(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let Some(raw) = attrs.get("СумКап") else {
        return Ok(());
    };
    match parse_amount(raw) {
        Some(amount) => b.set_capital(attrs.string("НаимВидКап"), amount),
        None => warn!("Skipping capital with malformed amount {:?}", raw),
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Address
// ----------------------------------------------------------------------

fn postal_code(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_postal_code(attrs.string("Индекс"));
    Ok(())
}

fn municipal_area(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let kind = attrs.get("ВидКод").and_then(municipal_area_kind);
    b.set_municipal_area(with_kind(kind, attrs.get("Наим")));
    Ok(())
}

fn settlement(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let kind = attrs.get("ВидКод").and_then(settlement_kind);
    b.set_settlement(with_kind(kind, attrs.get("Наим")));
    Ok(())
}

fn locality(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_locality(with_kind(attrs.get("Вид"), attrs.get("Наим")));
    Ok(())
}

fn district(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_district(with_kind(attrs.get("Тип"), attrs.get("Наим")));
    Ok(())
}

fn street(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_street(with_kind(attrs.get("Тип"), attrs.get("Наим")));
    Ok(())
}

fn building(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.add_building(with_kind(attrs.get("Тип"), attrs.get("Номер")));
    Ok(())
}

fn apartment(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_apartment(with_kind(attrs.get("Тип"), attrs.get("Номер")));
    Ok(())
}

fn room(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_room(with_kind(attrs.get("Тип"), attrs.get("Номер")));
    Ok(())
}

fn region_name(b: &mut RecordBuilder, text: &str) -> Result<(), ExtractError> {
    b.set_region(Some(text.to_string()));
    Ok(())
}

fn region_code(b: &mut RecordBuilder, text: &str) -> Result<(), ExtractError> {
    b.set_region_code(Some(text.to_string()));
    Ok(())
}

// ----------------------------------------------------------------------
// Founders
// ----------------------------------------------------------------------

fn begin_domestic(b: &mut RecordBuilder, _: &Attrs) -> Result<(), ExtractError> {
    b.begin_founder(FounderVariant::DomesticLegal);
    Ok(())
}

fn begin_foreign(b: &mut RecordBuilder, _: &Attrs) -> Result<(), ExtractError> {
    b.begin_founder(FounderVariant::ForeignLegal);
    Ok(())
}

fn begin_public_body(b: &mut RecordBuilder, _: &Attrs) -> Result<(), ExtractError> {
    b.begin_founder(FounderVariant::PublicBody);
    Ok(())
}

fn begin_person(b: &mut RecordBuilder, _: &Attrs) -> Result<(), ExtractError> {
    b.begin_founder(FounderVariant::NaturalPerson);
    Ok(())
}

fn commit_founder(b: &mut RecordBuilder) -> Result<(), ExtractError> {
    b.commit_founder();
    Ok(())
}

fn founder_legal_identity(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.stage_founder_identity(
        attrs.string("ОГРН"),
        attrs.string("ИНН"),
        attrs.string("НаимЮЛПолн"),
    );
    Ok(())
}

/// Foreign founders carry their home-registry number instead of an ОГРН
fn founder_foreign_registration(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    b.stage_founder_identity(attrs.string("РегНомер"), None, None);
    Ok(())
}

fn founder_public_body_name(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.stage_founder_identity(None, None, attrs.string("НаимМО"));
    Ok(())
}

/// Organ acting for a public-body founder: its identifiers, and its name only
/// when the body itself was not named
fn founder_acting_organ(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.stage_founder_identity(attrs.string("ОГРН"), attrs.string("ИНН"), None);
    b.stage_founder_fallback_name(attrs.string("НаимЮЛПолн"));
    Ok(())
}

fn founder_person(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.stage_founder_person(common::person_name(attrs), attrs.string("ИННФЛ"));
    Ok(())
}

fn founder_nominal_value(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let Some(raw) = attrs.get("НоминСтоим") else {
        return Ok(());
    };
    match parse_amount(raw) {
        Some(value) => b.stage_founder_nominal_value(value),
        None => warn!("Skipping founder nominal value {:?}", raw),
    }
    Ok(())
}

fn founder_fraction(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let numerator = attrs.get("Числит").and_then(|v| v.trim().parse::<u64>().ok());
    let denominator = attrs.get("Знаменат").and_then(|v| v.trim().parse::<u64>().ok());
    match (numerator, denominator) {
        (Some(numerator), Some(denominator)) if denominator > 0 => {
            b.stage_founder_share(Share::Fraction {
                numerator,
                denominator,
            });
        }
        _ => warn!(
            "Skipping malformed founder share {:?}/{:?}",
            attrs.get("Числит"),
            attrs.get("Знаменат")
        ),
    }
    Ok(())
}

fn founder_percent(b: &mut RecordBuilder, text: &str) -> Result<(), ExtractError> {
    match parse_amount(text) {
        Some(value) => b.stage_founder_share(Share::Percent { value }),
        None => warn!("Skipping founder share percent {:?}", text),
    }
    Ok(())
}

fn founder_decimal(b: &mut RecordBuilder, text: &str) -> Result<(), ExtractError> {
    match parse_amount(text) {
        Some(value) => b.stage_founder_share(Share::Decimal { value }),
        None => warn!("Skipping founder share fraction {:?}", text),
    }
    Ok(())
}
