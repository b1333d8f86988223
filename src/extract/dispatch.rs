//! Data-driven tag dispatch
//!
//! A [`Schema`] is a static table of [`Rule`]s and [`TextRule`]s. Each rule pairs a
//! tag name with an ancestor [`Guard`] and plain function handlers, which keeps
//! the tag cases testable in isolation from the tokenizer and the state machine.

use super::builder::RecordBuilder;
use super::context::ContextStack;
use super::tokenizer::Attrs;
use super::{egrip, egrul, ExtractError};
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type OpenHandler = fn(&mut RecordBuilder, &Attrs) -> Result<(), ExtractError>;
pub type CloseHandler = fn(&mut RecordBuilder) -> Result<(), ExtractError>;
pub type TextHandler = fn(&mut RecordBuilder, &str) -> Result<(), ExtractError>;

/// Ancestor condition a rule needs before it fires
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    Always,
    Within(&'static str),
    WithinAll(&'static [&'static str]),
    /// The tag's direct parents, outermost first; deeper nesting does not match
    Parents(&'static [&'static str]),
}

impl Guard {
    pub fn matches(&self, ctx: &ContextStack) -> bool {
        match self {
            Guard::Always => true,
            Guard::Within(tag) => ctx.contains(tag),
            Guard::WithinAll(tags) => ctx.contains_all(tags),
            Guard::Parents(path) => ctx.parents_end_with(path),
        }
    }
}

/// Open/close handlers for one tag under one guard
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub tag: &'static str,
    pub guard: Guard,
    pub on_open: Option<OpenHandler>,
    pub on_close: Option<CloseHandler>,
}

impl Rule {
    pub const fn open(tag: &'static str, guard: Guard, handler: OpenHandler) -> Self {
        Self {
            tag,
            guard,
            on_open: Some(handler),
            on_close: None,
        }
    }

    /// Rule for a staging wrapper: begin on open, commit on close
    pub const fn wrapper(
        tag: &'static str,
        guard: Guard,
        on_open: OpenHandler,
        on_close: CloseHandler,
    ) -> Self {
        Self {
            tag,
            guard,
            on_open: Some(on_open),
            on_close: Some(on_close),
        }
    }
}

/// Handler for element text, keyed by the innermost open tag
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub tag: &'static str,
    pub guard: Guard,
    pub handler: TextHandler,
}

impl TextRule {
    pub const fn new(tag: &'static str, guard: Guard, handler: TextHandler) -> Self {
        Self {
            tag,
            guard,
            handler,
        }
    }
}

/// Complete dispatch table for one registry
#[derive(Debug)]
pub struct Schema {
    pub kind: EntityKind,
    /// Top-level tag that starts a new entity
    pub entity_tag: &'static str,
    /// Applied to the entity tag's attributes on a fresh builder
    pub start: OpenHandler,
    pub rules: &'static [Rule],
    pub text_rules: &'static [TextRule],
}

/// Name-indexed view over a [`Schema`]
pub struct DispatchTable {
    schema: &'static Schema,
    rules: HashMap<&'static str, Vec<&'static Rule>>,
    text_rules: HashMap<&'static str, Vec<&'static TextRule>>,
}

impl DispatchTable {
    pub fn new(schema: &'static Schema) -> Self {
        let mut rules: HashMap<&'static str, Vec<&'static Rule>> = HashMap::new();
        for rule in schema.rules {
            rules.entry(rule.tag).or_default().push(rule);
        }
        let mut text_rules: HashMap<&'static str, Vec<&'static TextRule>> = HashMap::new();
        for rule in schema.text_rules {
            text_rules.entry(rule.tag).or_default().push(rule);
        }
        Self {
            schema,
            rules,
            text_rules,
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn is_entity_tag(&self, tag: &str) -> bool {
        tag == self.schema.entity_tag
    }

    /// Rules for `tag` whose guard holds, in table order
    pub fn matching<'a>(
        &'a self,
        tag: &str,
        ctx: &'a ContextStack,
    ) -> impl Iterator<Item = &'static Rule> + 'a {
        self.rules
            .get(tag)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |rule| rule.guard.matches(ctx))
    }

    pub fn matching_text<'a>(
        &'a self,
        tag: &str,
        ctx: &'a ContextStack,
    ) -> impl Iterator<Item = &'static TextRule> + 'a {
        self.text_rules
            .get(tag)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |rule| rule.guard.matches(ctx))
    }
}

/// Which registry the run ingests; selects one dispatch table for the whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    /// Legal entities
    #[default]
    Egrul,
    /// Sole proprietors
    Egrip,
}

impl Registry {
    pub fn schema(&self) -> &'static Schema {
        match self {
            Registry::Egrul => &egrul::SCHEMA,
            Registry::Egrip => &egrip::SCHEMA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Registry::Egrul => "egrul",
            Registry::Egrip => "egrip",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Registry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "egrul" => Ok(Registry::Egrul),
            "egrip" => Ok(Registry::Egrip),
            other => Err(format!("unknown registry type '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards() {
        let mut ctx = ContextStack::new();
        ctx.push("СвЮЛ");
        ctx.push("СвУчредит");
        ctx.push("УчрФЛ");

        assert!(Guard::Always.matches(&ctx));
        assert!(Guard::Within("УчрФЛ").matches(&ctx));
        assert!(!Guard::Within("СведДолжнФЛ").matches(&ctx));
        assert!(Guard::WithinAll(&["СвУчредит", "УчрФЛ"]).matches(&ctx));
        assert!(!Guard::WithinAll(&["СвУчредит", "УчрЮЛРос"]).matches(&ctx));
    }

    #[test]
    fn test_same_tag_resolved_by_ancestor() {
        let table = DispatchTable::new(Registry::Egrul.schema());

        let mut manager = ContextStack::new();
        manager.push("СвЮЛ");
        manager.push("СведДолжнФЛ");
        assert_eq!(table.matching("СвФЛ", &manager).count(), 1);

        let mut founder = ContextStack::new();
        founder.push("СвЮЛ");
        founder.push("СвУчредит");
        founder.push("УчрФЛ");
        assert_eq!(table.matching("СвФЛ", &founder).count(), 1);

        let mut neither = ContextStack::new();
        neither.push("СвЮЛ");
        assert_eq!(table.matching("СвФЛ", &neither).count(), 0);
        assert_eq!(table.matching("НеизвестныйТег", &neither).count(), 0);
    }

    #[test]
    fn test_registry_selection() {
        assert_eq!(Registry::Egrul.schema().entity_tag, "СвЮЛ");
        assert_eq!(Registry::Egrip.schema().entity_tag, "СвИП");
        assert_eq!(Registry::Egrip.schema().kind, EntityKind::Individual);
        assert_eq!("EGRIP".parse::<Registry>(), Ok(Registry::Egrip));
        assert!("ogrn".parse::<Registry>().is_err());
    }
}
