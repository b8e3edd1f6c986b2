//! Location-path filtering of XML RPC replies.
//!
//! Supports the path subset useful on Junos replies: absolute child steps
//! (`/rpc-reply/route-information`), descendant steps (`//rt-entry`), a mix of
//! both (`//route-table/rt`) and the `*` wildcard. Names are compared without
//! namespace prefixes. Predicates and axes are rejected.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::error::ParameterError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    /// Reached through `//` rather than `/`.
    descendant: bool,
}

impl Step {
    fn matches(&self, name: &str) -> bool {
        self.name == "*" || self.name == name
    }
}

/// A compiled location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    steps: Vec<Step>,
}

impl XPath {
    /// Compiles `expression`, or explains why it is not supported.
    ///
    /// A relative path such as `rt-entry` is treated like `//rt-entry`.
    pub fn parse(expression: &str) -> Result<Self, ParameterError> {
        let invalid = |reason: &str| {
            ParameterError::InvalidXPath(format!("'{expression}': {reason}"))
        };

        let expression = expression.trim();
        if expression.is_empty() {
            return Err(invalid("empty expression"));
        }

        let mut steps = Vec::new();
        let mut rest = expression;
        let mut descendant = !expression.starts_with('/');

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix("//") {
                descendant = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix('/') {
                rest = stripped;
            }

            let end = rest.find('/').unwrap_or(rest.len());
            let name = &rest[..end];
            if name.is_empty() {
                return Err(invalid("empty step"));
            }
            if name.contains(['[', ']', '@', '(', ')', ':']) || name == "." || name == ".." {
                return Err(invalid("only element names and '*' are supported"));
            }

            steps.push(Step {
                name: name.to_string(),
                descendant,
            });
            descendant = false;
            rest = &rest[end..];
        }

        Ok(Self { steps })
    }

    /// Whether the element reached through `ancestry` (root first) is selected.
    fn selects(&self, ancestry: &[String]) -> bool {
        selects(&self.steps, ancestry)
    }

    /// Returns every selected element of `xml`, outermost matches only,
    /// re-serialized with indentation.
    pub fn select(&self, xml: &str) -> Result<Vec<String>> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut ancestry: Vec<String> = Vec::new();
        let mut matches = Vec::new();
        // Writer plus the depth at which the captured element started.
        let mut capture: Option<(Writer<Vec<u8>>, usize)> = None;

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("Malformed XML at byte {}", reader.buffer_position()))?;

            match event {
                Event::Eof => break,
                Event::Start(ref start) => {
                    ancestry.push(local_name(start)?);
                    if capture.is_none() && self.selects(&ancestry) {
                        capture = Some((Writer::new_with_indent(Vec::new(), b' ', 2), ancestry.len()));
                    }
                    if let Some((writer, _)) = capture.as_mut() {
                        writer.write_event(&event)?;
                    }
                }
                Event::End(_) => {
                    let depth = ancestry.len();
                    ancestry.pop();
                    if let Some((mut writer, start_depth)) = capture.take() {
                        writer.write_event(&event)?;
                        if depth == start_depth {
                            matches.push(into_string(writer)?);
                        } else {
                            capture = Some((writer, start_depth));
                        }
                    }
                }
                Event::Empty(ref start) => {
                    if let Some((writer, _)) = capture.as_mut() {
                        writer.write_event(&event)?;
                    } else {
                        ancestry.push(local_name(start)?);
                        if self.selects(&ancestry) {
                            let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
                            writer.write_event(&event)?;
                            matches.push(into_string(writer)?);
                        }
                        ancestry.pop();
                    }
                }
                _ => {
                    if let Some((writer, _)) = capture.as_mut() {
                        writer.write_event(&event)?;
                    }
                }
            }
        }

        debug!("XPath matched {} element(s)", matches.len());
        Ok(matches)
    }
}

fn selects(steps: &[Step], ancestry: &[String]) -> bool {
    let (Some((step, parent_steps)), Some((name, parents))) =
        (steps.split_last(), ancestry.split_last())
    else {
        return false;
    };

    if !step.matches(name) {
        return false;
    }

    match (parent_steps.is_empty(), step.descendant) {
        (true, true) => true,
        (true, false) => parents.is_empty(),
        (false, false) => selects(parent_steps, parents),
        (false, true) => (1..=parents.len()).any(|end| selects(parent_steps, &parents[..end])),
    }
}

fn local_name(start: &BytesStart<'_>) -> Result<String> {
    let name = start.local_name();
    let name = std::str::from_utf8(name.as_ref()).context("Invalid UTF-8 in tag name")?;
    Ok(name.to_string())
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).context("Serialized XML is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"
    <rpc-reply xmlns:junos="http://xml.juniper.net/junos/*/junos">
        <route-information>
            <route-table>
                <table-name>inet.0</table-name>
                <rt><rt-destination>10.0.0.0/24</rt-destination></rt>
                <rt><rt-destination>10.0.1.0/24</rt-destination></rt>
            </route-table>
        </route-information>
        <cli><banner/></cli>
    </rpc-reply>"#;

    #[test]
    fn test_descendant_step() {
        let xpath = XPath::parse("//rt-destination").unwrap();
        let matches = xpath.select(REPLY).unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].contains("10.0.0.0/24"));
        assert!(matches[1].contains("10.0.1.0/24"));
    }

    #[test]
    fn test_absolute_path() {
        let xpath = XPath::parse("/rpc-reply/route-information/route-table/table-name").unwrap();
        let matches = xpath.select(REPLY).unwrap();
        assert_eq!(matches, vec!["<table-name>inet.0</table-name>"]);
    }

    #[test]
    fn test_absolute_path_must_start_at_root() {
        let xpath = XPath::parse("/route-information").unwrap();
        assert!(xpath.select(REPLY).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_steps_and_wildcard() {
        let xpath = XPath::parse("//route-table/*/rt-destination").unwrap();
        assert_eq!(xpath.select(REPLY).unwrap().len(), 2);
    }

    #[test]
    fn test_outermost_match_only() {
        let xpath = XPath::parse("//*").unwrap();
        let matches = xpath.select(REPLY).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].starts_with("<rpc-reply"));
    }

    #[test]
    fn test_self_closing_element() {
        let xpath = XPath::parse("//banner").unwrap();
        assert_eq!(xpath.select(REPLY).unwrap(), vec!["<banner/>"]);
    }

    #[test]
    fn test_unsupported_expressions() {
        assert!(XPath::parse("").is_err());
        assert!(XPath::parse("//rt[1]").is_err());
        assert!(XPath::parse("//@name").is_err());
        assert!(XPath::parse("/a//").is_err());
    }

    #[test]
    fn test_malformed_xml() {
        let xpath = XPath::parse("//a").unwrap();
        assert!(xpath.select("<a><b></a>").is_err());
    }
}
