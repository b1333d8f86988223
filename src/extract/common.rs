//! Handlers shared by both registry schemas

use super::builder::RecordBuilder;
use super::tokenizer::Attrs;
use super::ExtractError;
use crate::types::{Authority, PersonName};
use tracing::warn;

pub(crate) fn person_name(attrs: &Attrs) -> PersonName {
    PersonName {
        surname: attrs.string("Фамилия"),
        given: attrs.string("Имя"),
        patronymic: attrs.string("Отчество"),
    }
}

fn authority(attrs: &Attrs, code: &str, name: &str) -> Option<Authority> {
    Some(Authority {
        code: attrs.string(code)?,
        name: attrs.string(name),
        address: None,
    })
}

fn activity(builder: &mut RecordBuilder, attrs: &Attrs, main: bool) {
    let Some(code) = attrs.string("КодОКВЭД") else {
        warn!("Skipping activity code without КодОКВЭД");
        return;
    };
    builder.add_activity(
        main,
        code,
        attrs.string("НаимОКВЭД"),
        attrs.string("ПрВерсОКВЭД"),
    );
}

pub(crate) fn main_activity(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    activity(b, attrs, true);
    Ok(())
}

pub(crate) fn extra_activity(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    activity(b, attrs, false);
    Ok(())
}

pub(crate) fn email(b: &mut RecordBuilder, attrs: &Attrs) -> Result<(), ExtractError> {
    if let Some(raw) = attrs.get("E-mail") {
        b.add_email(raw);
    }
    Ok(())
}

/// `СвРегОрг`: registering authority, first occurrence wins
pub(crate) fn registration_authority(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    if let Some(mut found) = authority(attrs, "КодНО", "НаимНО") {
        found.address = attrs.string("АдрРО");
        b.set_registration_authority(found);
    }
    Ok(())
}

/// `СвНО` inside `СвУчетНО`: the tax office holding the entity on record
pub(crate) fn reporting_authority(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    if let Some(found) = authority(attrs, "КодНО", "НаимНО") {
        b.stage_tax_report_doc(None, Some(found.code.clone()));
        b.set_reporting_authority(found);
    }
    Ok(())
}

/// `СвРегПФ`: pension fund registration number and date
pub(crate) fn pension_registration(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    b.stage_pension_doc(attrs.string("РегНомПФ"), attrs.get("ДатаРег"), None);
    Ok(())
}

pub(crate) fn pension_fund_office(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    if let Some(found) = authority(attrs, "КодПФ", "НаимПФ") {
        b.stage_pension_doc(None, None, Some(found.code.clone()));
        b.set_pension_fund_authority(found);
    }
    Ok(())
}

pub(crate) fn social_insurance_office(
    b: &mut RecordBuilder,
    attrs: &Attrs,
) -> Result<(), ExtractError> {
    if let Some(found) = authority(attrs, "КодФСС", "НаимФСС") {
        b.set_social_insurance_authority(found);
    }
    Ok(())
}
