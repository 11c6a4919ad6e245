//! Minimal XML output tree for batch responses.
//!
//! The gateway only ever writes elements, attributes and text, so a small
//! builder beats pulling in a full DOM. Serialization offers a compact form
//! and an indented pretty form for human consumption.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child_count(&self) -> usize {
        self.children().count()
    }

    /// Serialize as a standalone document, with XML declaration.
    pub fn to_document(&self, pretty: bool) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        if pretty {
            out.push('\n');
        }
        self.write(&mut out, pretty, 0);
        if pretty {
            out.push('\n');
        }
        out
    }

    /// Serialize this element alone, without declaration.
    pub fn to_fragment(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, false, 0);
        out
    }

    fn write(&self, out: &mut String, pretty: bool, depth: usize) {
        if pretty && depth > 0 {
            out.push('\n');
            for _ in 0..depth {
                out.push_str("    ");
            }
        }
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        let element_children = self
            .children
            .iter()
            .any(|node| matches!(node, XmlNode::Element(_)));
        for node in &self.children {
            match node {
                XmlNode::Element(element) => element.write(out, pretty, depth + 1),
                XmlNode::Text(text) => out.push_str(&escape_text(text)),
            }
        }
        if pretty && element_children {
            out.push('\n');
            for _ in 0..depth {
                out.push_str("    ");
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_element() {
        assert_eq!(XmlElement::new("batchResponse").to_fragment(), "<batchResponse/>");
    }

    #[test]
    fn test_attributes_and_text() {
        let element = XmlElement::new("errorResponse")
            .attr("type", "malformedRequest")
            .child(XmlElement::new("message").text("bad things"));
        assert_eq!(
            element.to_fragment(),
            "<errorResponse type=\"malformedRequest\"><message>bad things</message></errorResponse>"
        );
    }

    #[test]
    fn test_escaping() {
        let element = XmlElement::new("value")
            .attr("note", "a\"b<c>&'d")
            .text("x < y & z > w");
        assert_eq!(
            element.to_fragment(),
            "<value note=\"a&quot;b&lt;c&gt;&amp;&apos;d\">x &lt; y &amp; z &gt; w</value>"
        );
    }

    #[test]
    fn test_pretty_printing() {
        let element = XmlElement::new("batchResponse")
            .child(XmlElement::new("addResponse").child(XmlElement::new("resultCode").attr("code", "0")))
            .child(XmlElement::new("message").text("hi"));
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<batchResponse>\n",
            "    <addResponse>\n",
            "        <resultCode code=\"0\"/>\n",
            "    </addResponse>\n",
            "    <message>hi</message>\n",
            "</batchResponse>\n",
        );
        assert_eq!(element.to_document(true), expected);
    }

    #[test]
    fn test_compact_document() {
        let element = XmlElement::new("batchResponse").child(XmlElement::new("delResponse"));
        assert_eq!(
            element.to_document(false),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><batchResponse><delResponse/></batchResponse>"
        );
    }

    #[test]
    fn test_child_accessors() {
        let element = XmlElement::new("a")
            .child(XmlElement::new("b"))
            .child(XmlElement::new("c"))
            .attr("k", "v");
        assert_eq!(element.child_count(), 2);
        assert_eq!(element.attribute("k"), Some("v"));
        assert_eq!(element.attribute("missing"), None);
        let names: Vec<_> = element.children().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }
}
