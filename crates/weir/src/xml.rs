//! BPMN 2.0 XML serialisation: semantic model plus diagram interchange.
//!
//! Export writes the document directly; import walks quick-xml events.
//! The two are designed as inverses over everything the model carries:
//! element and edge topology, DI geometry, event definitions, Camunda
//! attributes, and the verbatim extension-attribute bag.

mod export;
mod import;

pub use export::export_xml;
pub use import::import_xml;

/// Escapes text for XML attribute and text content.
pub(crate) fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
