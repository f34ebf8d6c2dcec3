//! YIN (XML) module reader.
//!
//! YIN maps every statement to an element in the YIN namespace; the argument
//! is either an attribute or a nested text element, controlled per keyword by
//! the `yin-element` flag in the keyword table. Elements in other namespaces
//! are extension instances and are retained for the compiler.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use super::{build_parsed, RawStmt};
use crate::ast::ParsedModule;
use crate::lexer::{keyword, Diagnostic, Severity, Span};

/// The YIN namespace prefix convention is irrelevant here: statement elements
/// are recognized by local name, extension elements by the presence of a
/// prefix.
#[derive(Debug)]
struct XmlElem {
    /// Qualified name as written (`prefix:local` or `local`).
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlElem>,
    text: String,
    span: Span,
}

/// Parse a YIN document into a module.
#[must_use]
pub fn parse_module_yin(source: &[u8]) -> ParsedModule {
    parse_yin(source, false)
}

/// Parse a YIN document into a submodule.
#[must_use]
pub fn parse_submodule_yin(source: &[u8]) -> ParsedModule {
    parse_yin(source, true)
}

fn parse_yin(source: &[u8], want_submodule: bool) -> ParsedModule {
    let mut diagnostics = Vec::new();
    let root = match read_tree(source, &mut diagnostics) {
        Some(root) => root,
        None => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                span: Span::new(0, 0),
                message: "no root element in YIN document".into(),
            });
            let mut module = ParsedModule::default();
            module.diagnostics = diagnostics;
            return module;
        }
    };

    let raw = elem_to_stmt(root, &mut diagnostics);
    build_parsed(source, raw, want_submodule, diagnostics)
}

fn read_tree(source: &[u8], diagnostics: &mut Vec<Diagnostic>) -> Option<XmlElem> {
    let mut reader = XmlReader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElem> = Vec::new();
    let mut root = None;

    loop {
        let pos = reader.buffer_position() as u32;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut attrs = Vec::new();
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    // Namespace declarations are transport, not statements.
                    if key == "xmlns" || key.starts_with("xmlns:") {
                        continue;
                    }
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_default();
                    attrs.push((key, value));
                }
                stack.push(XmlElem {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: String::new(),
                    span: Span::new(pos, pos),
                });
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut attrs = Vec::new();
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    if key == "xmlns" || key.starts_with("xmlns:") {
                        continue;
                    }
                    let value = attr
                        .unescape_value()
                        .map(|v| v.into_owned())
                        .unwrap_or_default();
                    attrs.push((key, value));
                }
                let elem = XmlElem {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: String::new(),
                    span: Span::new(pos, pos),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => root = Some(elem),
                }
            }
            Ok(Event::End(_)) => {
                let Some(done) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => {
                        root = Some(done);
                        break;
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    if let Ok(value) = text.unescape() {
                        top.text.push_str(&value);
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    span: Span::new(pos, pos),
                    message: format!("malformed XML: {err}"),
                });
                return None;
            }
        }
    }

    root
}

/// Convert an element tree into the generic statement form shared with the
/// canonical parser.
fn elem_to_stmt(elem: XmlElem, diagnostics: &mut Vec<Diagnostic>) -> RawStmt {
    let local = elem.name.rsplit(':').next().unwrap_or(&elem.name);
    let kind = if elem.name.contains(':') {
        None
    } else {
        keyword::lookup(local)
    };

    let (arg, skip_child) = match kind {
        Some(stmt_kind) => match keyword::argument_name(stmt_kind) {
            Some(arg_name) if keyword::yin_element(stmt_kind) => {
                // Argument lives in a nested text element, e.g.
                // <description><text>...</text></description>.
                let found = elem
                    .children
                    .iter()
                    .position(|child| child.name == arg_name);
                match found {
                    Some(idx) => (Some(elem.children[idx].text.clone()), Some(idx)),
                    None => {
                        diagnostics.push(Diagnostic {
                            severity: Severity::Error,
                            span: elem.span,
                            message: format!(
                                "expected \"{arg_name}\" value element of \"{local}\""
                            ),
                        });
                        (None, None)
                    }
                }
            }
            Some(arg_name) => {
                let value = elem
                    .attrs
                    .iter()
                    .find(|(key, _)| key == arg_name)
                    .map(|(_, value)| value.clone());
                if value.is_none() {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        span: elem.span,
                        message: format!(
                            "expected \"{arg_name}\" attribute of \"{local}\""
                        ),
                    });
                }
                (value, None)
            }
            None => {
                // Argument-less statements must not carry stray attributes.
                if !elem.attrs.is_empty() {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Error,
                        span: elem.span,
                        message: format!("unexpected attribute on \"{local}\""),
                    });
                }
                (None, None)
            }
        },
        None => {
            // Extension instance: argument is the first attribute, or the
            // element text when there are no attributes.
            let value = elem
                .attrs
                .first()
                .map(|(_, value)| value.clone())
                .or_else(|| (!elem.text.is_empty()).then(|| elem.text.clone()));
            (value, None)
        }
    };

    let children = elem
        .children
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != skip_child)
        .map(|(_, child)| elem_to_stmt(child, diagnostics))
        .collect();

    RawStmt {
        keyword: elem.name.clone(),
        kind,
        arg,
        children,
        span: elem.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::lexer::Severity;

    const YIN_MODULE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<module name="a"
        xmlns="urn:ietf:params:xml:ns:yang:yin:1"
        xmlns:a="urn:a">
  <namespace uri="urn:a"/>
  <prefix value="a"/>
  <description>
    <text>test module</text>
  </description>
  <leaf name="x">
    <type name="int8">
      <range value="0..10"/>
    </type>
  </leaf>
</module>
"#;

    #[test]
    fn test_parse_yin_module() {
        let module = parse_module_yin(YIN_MODULE.as_bytes());
        let errors: Vec<_> = module
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        assert_eq!(module.name, "a");
        assert_eq!(module.namespace.as_deref(), Some("urn:a"));
        assert_eq!(module.prefix.as_deref(), Some("a"));
        assert_eq!(module.description.as_deref(), Some("test module"));

        let AstNode::Leaf(leaf) = &module.body[0] else {
            panic!("expected a leaf");
        };
        assert_eq!(leaf.common.name, "x");
        assert_eq!(leaf.ty.name, "int8");
        assert_eq!(leaf.ty.range.as_deref(), Some("0..10"));
    }

    #[test]
    fn test_yin_missing_argument_attribute() {
        let source = br#"<module name="a" xmlns="urn:ietf:params:xml:ns:yang:yin:1">
  <namespace/>
  <prefix value="a"/>
</module>"#;
        let module = parse_module_yin(source);
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.message.contains("\"uri\" attribute")));
    }

    #[test]
    fn test_yin_argument_element_required() {
        let source = br#"<module name="a" xmlns="urn:ietf:params:xml:ns:yang:yin:1">
  <namespace uri="urn:a"/>
  <prefix value="a"/>
  <description text="wrong place"/>
</module>"#;
        let module = parse_module_yin(source);
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.message.contains("\"text\" value element")));
    }

    #[test]
    fn test_yin_extension_instance_retained() {
        let source = br#"<module name="a" xmlns="urn:ietf:params:xml:ns:yang:yin:1"
         xmlns:md="urn:ietf:params:xml:ns:yang:ietf-yang-metadata">
  <namespace uri="urn:a"/>
  <prefix value="a"/>
  <md:annotation name="note"/>
</module>"#;
        let module = parse_module_yin(source);
        let errors: Vec<_> = module
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(module.ext_instances.len(), 1);
        assert_eq!(module.ext_instances[0].keyword, "annotation");
        assert_eq!(module.ext_instances[0].argument.as_deref(), Some("note"));
    }

    #[test]
    fn test_malformed_xml_reported() {
        let module = parse_module_yin(b"<module name='a'><namespace");
        assert!(module
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error));
    }
}
