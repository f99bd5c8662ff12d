//! Generic element tree built from a quick-xml event stream.
//!
//! Element names keep their namespace prefix as written (`gml:Envelope`), so
//! lookups go through [`XmlNode::get_either`] which accepts both spellings.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// First child element named exactly `name`.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// First child named `prefixed`, falling back to `bare`.
    pub fn get_either(&self, prefixed: &str, bare: &str) -> Option<&XmlNode> {
        self.child(prefixed).or_else(|| self.child(bare))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn from_start(start: &BytesStart) -> Result<Self, ParseError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::MalformedMarkup(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::MalformedMarkup(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }
}

/// Parses `xml` into a tree rooted at a nameless document node.
pub fn parse_markup(xml: &str) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![XmlNode::default()];

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::MalformedMarkup(format!(
                "error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(start) => stack.push(XmlNode::from_start(&start)?),
            Event::Empty(start) => {
                let node = XmlNode::from_start(&start)?;
                current(&mut stack)?.children.push(node);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| ParseError::MalformedMarkup("unexpected end tag".into()))?;
                current(&mut stack)?.children.push(node);
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ParseError::MalformedMarkup(e.to_string()))?;
                current(&mut stack)?.text.push_str(&text);
            }
            Event::CData(data) => {
                let data = data.into_inner();
                current(&mut stack)?
                    .text
                    .push_str(&String::from_utf8_lossy(&data));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|node| node.name.clone()).unwrap_or_default();
        return Err(ParseError::MalformedMarkup(format!(
            "element <{open}> is not closed"
        )));
    }

    stack
        .pop()
        .ok_or_else(|| ParseError::MalformedMarkup("empty document".into()))
}

fn current(stack: &mut [XmlNode]) -> Result<&mut XmlNode, ParseError> {
    stack
        .last_mut()
        .ok_or_else(|| ParseError::MalformedMarkup("unbalanced elements".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <dataset:Dataset xmlns:dataset="x">
              <dataset:DEM>
                <dataset:mesh>53394611</dataset:mesh>
                <gml:Envelope srsName="fguuid:jgd2011.bl"/>
              </dataset:DEM>
            </dataset:Dataset>"#;

        let root = parse_markup(xml).unwrap();
        let dataset = root.get_either("dataset:Dataset", "Dataset").unwrap();
        let dem = dataset.get_either("dataset:DEM", "DEM").unwrap();
        assert_eq!(dem.get_either("dataset:mesh", "mesh").unwrap().text, "53394611");

        let envelope = dem.child("gml:Envelope").unwrap();
        assert_eq!(envelope.attribute("srsName"), Some("fguuid:jgd2011.bl"));
    }

    #[test]
    fn test_get_either_falls_back_to_bare_name() {
        let root = parse_markup("<Dataset><DEM><mesh>1</mesh></DEM></Dataset>").unwrap();
        let dataset = root.get_either("dataset:Dataset", "Dataset").unwrap();
        assert!(dataset.get_either("dataset:DEM", "DEM").is_some());
        assert!(dataset.get_either("dataset:Other", "Other").is_none());
    }

    #[test]
    fn test_text_keeps_inner_newlines_and_unescapes() {
        let root = parse_markup("<a>\n  x,1\ny,2 &amp; z\n</a>").unwrap();
        assert_eq!(root.child("a").unwrap().text, "x,1\ny,2 & z");
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let err = parse_markup("<a><b></a>").unwrap_err();
        assert!(matches!(err, ParseError::MalformedMarkup(_)));
    }

    #[test]
    fn test_unclosed_element_is_malformed() {
        let err = parse_markup("<a><b>text</b>").unwrap_err();
        assert!(matches!(err, ParseError::MalformedMarkup(_)));
    }
}
