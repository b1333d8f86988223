//! SAX-style tag tokenizer over quick-xml
//!
//! Registry members are windows-1251 documents. [`decode_reader`] transcodes the
//! raw member bytes to UTF-8 before tokenization, so the tokenizer itself only
//! ever sees Unicode text.

use super::ExtractError;
use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{BufRead, BufReader, Read};

/// Attributes of an open tag, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs(Vec<(String, String)>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Owned copy of an attribute value
    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn require(&self, tag: &str, name: &str) -> Result<&str, ExtractError> {
        self.get(name).ok_or_else(|| ExtractError::MissingAttribute {
            tag: tag.to_string(),
            attribute: name.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attrs(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One event of the tag stream
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    Open { name: String, attrs: Attrs },
    Text(String),
    Close(String),
    End,
}

impl TagEvent {
    pub fn open(name: &str, attrs: &[(&str, &str)]) -> Self {
        TagEvent::Open {
            name: name.to_string(),
            attrs: attrs.iter().copied().collect(),
        }
    }

    pub fn close(name: &str) -> Self {
        TagEvent::Close(name.to_string())
    }

    pub fn text(text: &str) -> Self {
        TagEvent::Text(text.to_string())
    }
}

/// Wrap a raw byte stream so it yields UTF-8 decoded from `encoding`
pub fn decode_reader<R: Read>(
    input: R,
    encoding: &'static Encoding,
) -> BufReader<DecodeReaderBytes<R, Vec<u8>>> {
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(input);
    BufReader::with_capacity(1024 * 1024, decoder) // 1MB buffer
}

/// Resolve an encoding label such as `windows-1251` or `cp1251`
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Streaming tokenizer emitting [`TagEvent`]s in document order.
///
/// Self-closing elements produce an `Open` immediately followed by a `Close`.
/// Text is trimmed and whitespace-only text is dropped.
pub struct TagTokenizer<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending_close: Option<String>,
    finished: bool,
}

impl<R: BufRead> TagTokenizer<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(8192),
            pending_close: None,
            finished: false,
        }
    }

    /// Read the next event; returns [`TagEvent::End`] at end of input
    pub fn next_event(&mut self) -> Result<TagEvent, ExtractError> {
        if let Some(name) = self.pending_close.take() {
            return Ok(TagEvent::Close(name));
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => {
                    return Ok(TagEvent::Open {
                        name: tag_name(e.name().as_ref()),
                        attrs: read_attrs(e)?,
                    });
                }
                Event::Empty(ref e) => {
                    let name = tag_name(e.name().as_ref());
                    let attrs = read_attrs(e)?;
                    self.pending_close = Some(name.clone());
                    return Ok(TagEvent::Open { name, attrs });
                }
                Event::End(ref e) => {
                    return Ok(TagEvent::Close(tag_name(e.name().as_ref())));
                }
                Event::Text(ref e) => {
                    let text = e.unescape()?;
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(TagEvent::Text(text.to_string()));
                    }
                }
                Event::CData(ref e) => {
                    let text = String::from_utf8_lossy(e.as_ref());
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(TagEvent::Text(text.to_string()));
                    }
                }
                Event::Eof => return Ok(TagEvent::End),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for TagTokenizer<R> {
    type Item = Result<TagEvent, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let event = self.next_event();
        if matches!(event, Ok(TagEvent::End) | Err(_)) {
            self.finished = true;
        }
        Some(event)
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn read_attrs(start: &BytesStart<'_>) -> Result<Attrs, ExtractError> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ExtractError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Attrs(attrs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(xml: &str) -> Vec<TagEvent> {
        TagTokenizer::new(xml.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_self_closing_emits_open_and_close() {
        let events = tokenize(r#"<Файл><СвСтатус КодСтатусЮЛ="101"/></Файл>"#);
        assert_eq!(
            events,
            vec![
                TagEvent::open("Файл", &[]),
                TagEvent::open("СвСтатус", &[("КодСтатусЮЛ", "101")]),
                TagEvent::close("СвСтатус"),
                TagEvent::close("Файл"),
                TagEvent::End,
            ]
        );
    }

    #[test]
    fn test_text_is_trimmed_and_unescaped() {
        let events = tokenize("<НаимРегион>\n   ГОРОД &quot;МОСКВА&quot;  \n</НаимРегион>");
        assert_eq!(events[1], TagEvent::text("ГОРОД \"МОСКВА\""));
    }

    #[test]
    fn test_empty_attribute_reads_as_absent() {
        let events = tokenize(r#"<СвЮЛ ОГРН="1" КПП=""/>"#);
        let TagEvent::Open { attrs, .. } = &events[0] else {
            panic!("expected open tag");
        };
        assert_eq!(attrs.get("ОГРН"), Some("1"));
        assert_eq!(attrs.get("КПП"), None);
        assert!(attrs.require("СвЮЛ", "КПП").is_err());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let result: Result<Vec<_>, _> = TagTokenizer::new("<a><b></a>".as_bytes()).collect();
        assert!(matches!(result, Err(ExtractError::Xml(_))));
    }

    #[test]
    fn test_decode_windows_1251() {
        let encoding = encoding_for_label("windows-1251").unwrap();
        let (bytes, _, _) = encoding.encode(r#"<СвНаимЮЛ НаимЮЛПолн="ООО РОМАШКА"/>"#);
        let reader = decode_reader(bytes.as_ref(), encoding);
        let events: Vec<_> = TagTokenizer::new(reader).collect::<Result<_, _>>().unwrap();
        assert_eq!(
            events[0],
            TagEvent::open("СвНаимЮЛ", &[("НаимЮЛПолн", "ООО РОМАШКА")])
        );
    }
}
