//! Entity extraction state machine

use super::builder::RecordBuilder;
use super::context::ContextStack;
use super::dictionaries::UnknownStatusPolicy;
use super::dispatch::{DispatchTable, Registry};
use super::tokenizer::{Attrs, TagEvent, TagTokenizer};
use super::ExtractError;
use crate::types::{EntityKind, EntityRecord};
use std::io::BufRead;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    Idle,
    InEntity(EntityKind),
}

/// Reconstructs entity records from one member's tag stream.
///
/// Owns exactly one [`ContextStack`] and at most one in-flight [`RecordBuilder`].
/// Opening an entity tag flushes the previous entity; [`TagEvent::End`] flushes
/// the last one.
pub struct EntityExtractor {
    table: DispatchTable,
    status_policy: UnknownStatusPolicy,
    ctx: ContextStack,
    builder: Option<RecordBuilder>,
    records: Vec<EntityRecord>,
}

impl EntityExtractor {
    pub fn new(registry: Registry) -> Self {
        Self {
            table: DispatchTable::new(registry.schema()),
            status_policy: UnknownStatusPolicy::default(),
            ctx: ContextStack::new(),
            builder: None,
            records: Vec::new(),
        }
    }

    pub fn with_status_policy(mut self, policy: UnknownStatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    pub fn state(&self) -> ExtractorState {
        match self.builder {
            Some(ref builder) => ExtractorState::InEntity(builder.kind()),
            None => ExtractorState::Idle,
        }
    }

    /// Apply one tag event
    pub fn feed(&mut self, event: TagEvent) -> Result<(), ExtractError> {
        match event {
            TagEvent::Open { name, attrs } => self.open(&name, &attrs),
            TagEvent::Text(text) => self.text(&text),
            TagEvent::Close(name) => self.close(&name),
            TagEvent::End => self.flush(),
        }
    }

    fn open(&mut self, name: &str, attrs: &Attrs) -> Result<(), ExtractError> {
        if self.table.is_entity_tag(name) {
            return self.start_entity(name, attrs);
        }

        self.ctx.push(name);
        if !self.in_entity_subtree() {
            return Ok(());
        }
        let Some(builder) = self.builder.as_mut() else {
            return Ok(());
        };
        for rule in self.table.matching(name, &self.ctx) {
            if let Some(handler) = rule.on_open {
                handler(builder, attrs)?;
            }
        }
        Ok(())
    }

    fn start_entity(&mut self, name: &str, attrs: &Attrs) -> Result<(), ExtractError> {
        self.flush()?;
        self.ctx.clear();
        self.ctx.push(name);

        let schema = self.table.schema();
        let mut builder = RecordBuilder::with_status_policy(schema.kind, self.status_policy);
        (schema.start)(&mut builder, attrs)?;
        self.builder = Some(builder);
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ExtractError> {
        if !self.in_entity_subtree() {
            return Ok(());
        }
        let (Some(builder), Some(tag)) = (self.builder.as_mut(), self.ctx.current()) else {
            return Ok(());
        };
        for rule in self.table.matching_text(tag, &self.ctx) {
            (rule.handler)(builder, text)?;
        }
        Ok(())
    }

    /// Close handlers see the closing tag still on the stack
    fn close(&mut self, name: &str) -> Result<(), ExtractError> {
        if self.in_entity_subtree() {
            if let Some(builder) = self.builder.as_mut() {
                for rule in self.table.matching(name, &self.ctx) {
                    if let Some(handler) = rule.on_close {
                        handler(builder)?;
                    }
                }
            }
        }
        self.ctx.pop(name);
        Ok(())
    }

    fn in_entity_subtree(&self) -> bool {
        self.ctx.contains(self.table.schema().entity_tag)
    }

    /// Finalize the in-flight record, if any
    pub fn flush(&mut self) -> Result<(), ExtractError> {
        if let Some(builder) = self.builder.take() {
            self.records.push(builder.build()?);
        }
        Ok(())
    }

    /// Discard the in-flight record after a stream error.
    ///
    /// Returns the registration number of the dropped record, when it got that far.
    pub fn abandon(&mut self) -> Option<String> {
        self.ctx.clear();
        let builder = self.builder.take()?;
        let number = builder
            .registration_number()
            .unwrap_or("<unknown>")
            .to_string();
        debug!("Abandoned in-flight record {}", number);
        Some(number)
    }

    /// Drain the records completed so far
    pub fn take_records(&mut self) -> Vec<EntityRecord> {
        std::mem::take(&mut self.records)
    }

    /// Flush and return every completed record
    pub fn finish(mut self) -> Result<Vec<EntityRecord>, ExtractError> {
        self.flush()?;
        Ok(self.records)
    }

    /// Tokenize a decoded stream to the end and return its records
    pub fn extract_from<R: BufRead>(mut self, input: R) -> Result<Vec<EntityRecord>, ExtractError> {
        for event in TagTokenizer::new(input) {
            self.feed(event?)?;
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FounderKind, Status};

    fn extract(registry: Registry, xml: &str) -> Vec<EntityRecord> {
        EntityExtractor::new(registry)
            .extract_from(xml.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_round_trip_single_entity() {
        let records = extract(
            Registry::Egrul,
            r#"<Файл><Документ>
                <СвЮЛ ИНН="7701234567" ОГРН="1027700123456" ДатаОГРН="2015-06-01">
                    <СвНаимЮЛ НаимЮЛПолн="ОБЩЕСТВО С ОГРАНИЧЕННОЙ ОТВЕТСТВЕННОСТЬЮ РОМАШКА"/>
                </СвЮЛ>
            </Документ></Файл>"#,
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.registration_date, 1_433_116_800_000);
        assert_eq!(record.tax_id.as_deref(), Some("7701234567"));
        assert_eq!(record.primary_registration_number, "1027700123456");
        assert_eq!(
            record.display_name.long,
            "ОБЩЕСТВО С ОГРАНИЧЕННОЙ ОТВЕТСТВЕННОСТЬЮ РОМАШКА"
        );
        assert_eq!(record.status, Status::Active);
    }

    #[test]
    fn test_siblings_do_not_leak() {
        let records = extract(
            Registry::Egrul,
            r#"<Файл>
                <Документ><СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01" КПП="770101001">
                    <СвАдресЮЛ><СвАдрЮЛФИАС Индекс="101000"/></СвАдресЮЛ>
                    <СведДолжнФЛ><СвФЛ Фамилия="Иванов"/></СведДолжнФЛ>
                    <СвСтатус КодСтатусЮЛ="101"/>
                </СвЮЛ></Документ>
                <Документ><СвЮЛ ОГРН="2" ДатаОГРН="2016-01-01">
                    <СвФЛ Фамилия="Сидоров"/>
                </СвЮЛ></Документ>
            </Файл>"#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].manager_name.as_deref(), Some("Иванов"));
        assert!(records[0].address.is_some());
        assert_eq!(records[0].status, Status::Liquidating);

        let second = &records[1];
        assert_eq!(second.primary_registration_number, "2");
        assert!(second.kpp.is_none());
        assert!(second.address.is_none());
        assert!(second.manager_name.is_none());
        assert_eq!(second.status, Status::Active);
    }

    #[test]
    fn test_unclosed_manager_block_does_not_leak_into_next_entity() {
        let mut extractor = EntityExtractor::new(Registry::Egrul);
        extractor
            .feed(TagEvent::open("СвЮЛ", &[("ОГРН", "1"), ("ДатаОГРН", "2015-06-01")]))
            .unwrap();
        extractor.feed(TagEvent::open("СведДолжнФЛ", &[])).unwrap();
        extractor
            .feed(TagEvent::open("СвЮЛ", &[("ОГРН", "2"), ("ДатаОГРН", "2015-06-01")]))
            .unwrap();
        extractor
            .feed(TagEvent::open("СвФЛ", &[("Фамилия", "Петров")]))
            .unwrap();
        let records = extractor.finish().unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[1].manager_name.is_none());
    }

    #[test]
    fn test_flush_without_entity_is_noop() {
        let mut extractor = EntityExtractor::new(Registry::Egrul);
        assert_eq!(extractor.state(), ExtractorState::Idle);
        extractor.flush().unwrap();
        extractor.feed(TagEvent::End).unwrap();
        extractor.feed(TagEvent::End).unwrap();
        assert!(extractor.finish().unwrap().is_empty());

        assert!(extract(Registry::Egrul, "<Файл><Документ/></Файл>").is_empty());
    }

    #[test]
    fn test_manager_and_founder_person_resolved_by_ancestor() {
        let records = extract(
            Registry::Egrul,
            r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01">
                <СведДолжнФЛ>
                    <СвФЛ Фамилия="Иванов" Имя="Иван" Отчество="Иванович"/>
                    <СвДолжн НаимДолжн="ГЕНЕРАЛЬНЫЙ ДИРЕКТОР"/>
                </СведДолжнФЛ>
                <СвУчредит>
                    <УчрФЛ>
                        <СвФЛ Фамилия="Петров" Имя="Пётр" ИННФЛ="770100000001"/>
                        <ДоляУстКап НоминСтоим="10000"><РазмерДоли><Процент>100</Процент></РазмерДоли></ДоляУстКап>
                    </УчрФЛ>
                </СвУчредит>
            </СвЮЛ>"#,
        );

        let record = &records[0];
        assert_eq!(record.manager_name.as_deref(), Some("Иванов Иван Иванович"));
        assert_eq!(record.manager_title.as_deref(), Some("ГЕНЕРАЛЬНЫЙ ДИРЕКТОР"));

        let founders = record.founders.as_ref().unwrap();
        assert_eq!(founders.len(), 1);
        assert_eq!(founders[0].kind, FounderKind::Physical);
        assert_eq!(founders[0].inn.as_deref(), Some("770100000001"));
        assert_eq!(founders[0].person.as_ref().unwrap().full(), "Петров Пётр");
        assert_eq!(founders[0].nominal_value, Some(10000.0));
    }

    #[test]
    fn test_founders_committed_on_wrapper_close() {
        let records = extract(
            Registry::Egrul,
            r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01">
                <СвУчредит>
                    <УчрЮЛРос><НаимИННЮЛ ОГРН="1027700000001" ИНН="7700000001" НаимЮЛПолн="АО АЛЬФА"/></УчрЮЛРос>
                    <УчрЮЛРос></УчрЮЛРос>
                    <УчрЮЛИн><НаимИННЮЛ НаимЮЛПолн="BETA LTD"/><СвРегИн РегНомер="HE123"/></УчрЮЛИн>
                </СвУчредит>
            </СвЮЛ>"#,
        );

        let founders = records[0].founders.as_ref().unwrap();
        assert_eq!(founders.len(), 2);
        assert_eq!(founders[0].name.as_deref(), Some("АО АЛЬФА"));
        assert_eq!(founders[1].name.as_deref(), Some("BETA LTD"));
        assert_eq!(founders[1].ogrn.as_deref(), Some("HE123"));
    }

    #[test]
    fn test_nested_executor_and_pledgee_do_not_replace_founder() {
        let records = extract(
            Registry::Egrul,
            r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01">
                <СвУчредит>
                    <УчрФЛ>
                        <СвФЛ Фамилия="Петров" Имя="Пётр" ИННФЛ="770100000001"/>
                        <ЛицоУпрНасл>
                            <СвФЛ Фамилия="Душеприказчиков" Имя="Иван" ИННФЛ="770100000999"/>
                        </ЛицоУпрНасл>
                    </УчрФЛ>
                    <УчрЮЛРос>
                        <НаимИННЮЛ ОГРН="1027700000001" ИНН="7700000001" НаимЮЛПолн="АО АЛЬФА"/>
                        <СвОбрем ВидОбрем="ЗАЛОГ">
                            <СвЗалогДержЮЛ>
                                <НаимИННЮЛ ОГРН="1027700000777" ИНН="7700000777" НаимЮЛПолн="БАНК ЗАЛОГОДЕРЖАТЕЛЬ"/>
                            </СвЗалогДержЮЛ>
                        </СвОбрем>
                    </УчрЮЛРос>
                </СвУчредит>
            </СвЮЛ>"#,
        );

        let founders = records[0].founders.as_ref().unwrap();
        assert_eq!(founders.len(), 2);

        assert_eq!(founders[0].kind, FounderKind::Physical);
        assert_eq!(founders[0].inn.as_deref(), Some("770100000001"));
        assert_eq!(founders[0].person.as_ref().unwrap().full(), "Петров Пётр");

        assert_eq!(founders[1].kind, FounderKind::Legal);
        assert_eq!(founders[1].name.as_deref(), Some("АО АЛЬФА"));
        assert_eq!(founders[1].ogrn.as_deref(), Some("1027700000001"));
        assert_eq!(founders[1].inn.as_deref(), Some("7700000001"));
    }

    #[test]
    fn test_region_text_only_inside_address() {
        let records = extract(
            Registry::Egrul,
            r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01">
                <НаимРегион>НЕ АДРЕС</НаимРегион>
                <СвАдресЮЛ><СвАдрЮЛФИАС Индекс="101000"><Регион>77</Регион><НаимРегион>ГОРОД МОСКВА</НаимРегион></СвАдрЮЛФИАС></СвАдресЮЛ>
            </СвЮЛ>"#,
        );

        let address = records[0].address.as_ref().unwrap();
        assert_eq!(address.value, "101000, ГОРОД МОСКВА");
        assert_eq!(address.region.as_deref(), Some("ГОРОД МОСКВА"));
        assert_eq!(address.region_code.as_deref(), Some("77"));
    }

    #[test]
    fn test_registration_authority_first_write_wins() {
        let records = extract(
            Registry::Egrul,
            r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01">
                <СвРегОрг КодНО="7746" НаимНО="МИФНС № 46"/>
                <СвРегОрг КодНО="7700" НаимНО="ДРУГАЯ"/>
                <СвОКВЭД><СвОКВЭДОсн КодОКВЭД="62.01" НаимОКВЭД="Разработка" ПрВерсОКВЭД="2014"/>
                <СвОКВЭДДоп КодОКВЭД="62.02"/></СвОКВЭД>
            </СвЮЛ>"#,
        );

        let record = &records[0];
        assert_eq!(record.authorities.registration.as_ref().unwrap().code, "7746");
        let codes = &record.main_classification_codes;
        assert_eq!(codes.len(), 2);
        assert!(codes[0].main);
        assert_eq!(codes[0].version.as_deref(), Some("2014"));
        assert!(!codes[1].main);
    }

    #[test]
    fn test_egrip_flow() {
        let records = extract(
            Registry::Egrip,
            r#"<Файл><Документ>
                <СвИП ОГРНИП="304770000000011" ДатаОГРНИП="2004-01-15" ИННФЛ="770100000001" КодВидИП="1">
                    <СвФЛ><ФИОРус Фамилия="Иванов" Имя="Иван"/></СвФЛ>
                    <СвГражд ВидГражд="2" НаимСтран="РЕСПУБЛИКА БЕЛАРУСЬ"/>
                    <СвСтатус><СвСтатус КодСтатус="201"/></СвСтатус>
                    <СвАдрЭлПочты E-mail="ivanov@example.ru"/>
                </СвИП>
            </Документ></Файл>"#,
        );

        let record = &records[0];
        assert_eq!(record.kind, EntityKind::Individual);
        assert_eq!(record.value, "ИП Иванов Иван");
        assert_eq!(record.citizenship.as_ref().unwrap().country, "РЕСПУБЛИКА БЕЛАРУСЬ");
        assert_eq!(record.status, Status::ActiveUnknownCode);
        assert_eq!(record.emails[0].domain, "example.ru");
    }

    #[test]
    fn test_unknown_status_policy_active() {
        let records = EntityExtractor::new(Registry::Egrul)
            .with_status_policy(UnknownStatusPolicy::Active)
            .extract_from(
                r#"<СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01"><СвСтатус КодСтатусЮЛ="999"/></СвЮЛ>"#
                    .as_bytes(),
            )
            .unwrap();
        assert_eq!(records[0].status, Status::Active);
    }

    #[test]
    fn test_bad_registration_date_aborts_member() {
        let result = EntityExtractor::new(Registry::Egrul)
            .extract_from(r#"<СвЮЛ ОГРН="1" ДатаОГРН="01.06.2015"/>"#.as_bytes());
        assert!(matches!(result, Err(ExtractError::InvalidDate { .. })));
    }

    #[test]
    fn test_completed_records_survive_stream_error() {
        let mut extractor = EntityExtractor::new(Registry::Egrul);
        let xml = r#"<Файл><СвЮЛ ОГРН="1" ДатаОГРН="2015-06-01"/><СвЮЛ ОГРН="2" ДатаОГРН="2015-06-01"><a></b>"#;
        let mut failed = false;
        for event in TagTokenizer::new(xml.as_bytes()) {
            if event.and_then(|e| extractor.feed(e)).is_err() {
                failed = true;
                break;
            }
        }

        assert!(failed);
        assert_eq!(extractor.abandon().as_deref(), Some("2"));
        let records = extractor.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_registration_number, "1");
    }
}
