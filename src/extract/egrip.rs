//! Dispatch table for the sole-proprietor registry (EGRIP)

use super::builder::RecordBuilder;
use super::common;
use super::dictionaries::{citizenship, legal_form_for_code};
use super::dispatch::{Guard, Rule, Schema};
use super::tokenizer::Attrs;
use super::ExtractError;
use crate::types::EntityKind;
use tracing::warn;

pub const ENTITY_TAG: &str = "СвИП";

pub static SCHEMA: Schema = Schema {
    kind: EntityKind::Individual,
    entity_tag: ENTITY_TAG,
    start: start_entity,
    rules: RULES,
    text_rules: &[],
};

static RULES: &[Rule] = &[
    Rule::open("ФИОРус", Guard::Within("СвФЛ"), person_name),
    Rule::open("СвГражд", Guard::Always, citizenship_info),
    Rule::open("СвУчетНО", Guard::Always, tax_registration),
    Rule::open("СвНО", Guard::Within("СвУчетНО"), common::reporting_authority),
    Rule::open("СвСтатус", Guard::Always, status),
    Rule::open("СвОКВЭДОсн", Guard::Always, common::main_activity),
    Rule::open("СвОКВЭДДоп", Guard::Always, common::extra_activity),
    Rule::open("СвАдрЭлПочты", Guard::Always, common::email),
    Rule::open("СвРегОрг", Guard::Always, common::registration_authority),
    Rule::open("СвРегПФ", Guard::Always, common::pension_registration),
    Rule::open("СвОргПФ", Guard::Within("СвРегПФ"), common::pension_fund_office),
    Rule::open("СвОргФСС", Guard::Within("СвРегФСС"), common::social_insurance_office),
];

fn start_entity(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let ogrnip = attrs.require(ENTITY_TAG, "ОГРНИП")?;
    let date = attrs.require(ENTITY_TAG, "ДатаОГРНИП")?;
    b.set_registration(ogrnip, date)?;
    b.set_tax_id(attrs.string("ИННФЛ"));
    if let Some(code) = attrs.get("КодВидИП") {
        let form = legal_form_for_code(code);
        if form.is_none() {
            warn!("Unknown sole proprietor kind code {:?}", code);
        }
        b.set_legal_form(form);
    }
    Ok(())
}

/// Proprietor name; display names carry the legal-form prefix when known
fn person_name(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let name = common::person_name(attrs);
    if name.is_empty() {
        return Ok(());
    }
    let fio = name.full();
    let (value, long, short) = match b.legal_form() {
        Some(form) => (
            format!("{} {}", form.short, fio),
            format!("{} {}", form.full, fio),
            format!("{} {}", form.short, fio),
        ),
        None => (fio.clone(), fio.clone(), fio),
    };
    b.set_value(Some(value));
    b.set_long_name(Some(long));
    b.set_short_name(Some(short));
    b.set_person_name(name);
    Ok(())
}

fn citizenship_info(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    let Some(kind_code) = attrs.get("ВидГражд") else {
        return Ok(());
    };
    match citizenship(kind_code, attrs.get("НаимСтран")) {
        Some(found) => b.set_citizenship(found),
        None => warn!("Skipping citizenship {:?} without country name", kind_code),
    }
    Ok(())
}

fn tax_registration(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    b.set_tax_id(attrs.string("ИННФЛ"));
    b.stage_tax_report_doc(attrs.get("ДатаПостУч"), None);
    Ok(())
}

fn status(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    if let Some(code) = attrs.get("КодСтатус") {
        b.set_status_code(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::dictionaries::HOME_COUNTRY;
    use crate::types::Status;

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        pairs.iter().copied().collect()
    }

    fn started(kind_code: &str) -> RecordBuilder {
        let mut b = RecordBuilder::new(EntityKind::Individual);
        start_entity(
            &mut b,
            &attrs(&[
                ("ОГРНИП", "304770000000011"),
                ("ДатаОГРНИП", "2004-01-15"),
                ("ИННФЛ", "770100000001"),
                ("КодВидИП", kind_code),
            ]),
        )
        .unwrap();
        b
    }

    #[test]
    fn test_name_prefixed_with_legal_form() {
        let mut b = started("1");
        person_name(
            &mut b,
            &attrs(&[("Фамилия", "Иванов"), ("Имя", "Иван"), ("Отчество", "Иванович")]),
        )
        .unwrap();

        let record = b.build().unwrap();
        assert_eq!(record.value, "ИП Иванов Иван Иванович");
        assert_eq!(
            record.display_name.long,
            "Индивидуальный предприниматель Иванов Иван Иванович"
        );
        assert_eq!(
            record.display_name.short.as_deref(),
            Some("ИП Иванов Иван Иванович")
        );
        assert_eq!(record.person_name.unwrap().surname.as_deref(), Some("Иванов"));
        assert_eq!(record.tax_id.as_deref(), Some("770100000001"));
    }

    #[test]
    fn test_unknown_legal_form_uses_bare_name() {
        let mut b = started("7");
        person_name(&mut b, &attrs(&[("Фамилия", "Петров"), ("Имя", "Пётр")])).unwrap();
        let record = b.build().unwrap();
        assert_eq!(record.value, "Петров Пётр");
        assert!(record.legal_form.is_none());
    }

    #[test]
    fn test_citizenship_rule() {
        let mut b = started("1");
        citizenship_info(&mut b, &attrs(&[("ВидГражд", "1")])).unwrap();
        assert_eq!(b.build().unwrap().citizenship.unwrap().country, HOME_COUNTRY);

        let mut b = started("1");
        citizenship_info(&mut b, &attrs(&[("ВидГражд", "2")])).unwrap();
        assert!(b.build().unwrap().citizenship.is_none());
    }

    #[test]
    fn test_status_uses_proprietor_attribute() {
        let mut b = started("2");
        status(&mut b, &attrs(&[("КодСтатусЮЛ", "101")])).unwrap();
        assert_eq!(b.build().unwrap().status, Status::Active);

        let mut b = started("2");
        status(&mut b, &attrs(&[("КодСтатус", "801")])).unwrap();
        assert_eq!(b.build().unwrap().status, Status::Liquidated);
    }
}
