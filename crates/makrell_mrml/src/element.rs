use std::fmt::{self, Write};

/// A piece of element content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// Character data.
    Text(String),
    /// A child element.
    Element(Element),
}

/// A markup element: a name, attributes in definition order and mixed
/// content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
}

impl Element {
    /// An empty element.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in the order they were first set.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// The value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute. A repeated name keeps its first position.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, old)) => *old = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Text and child elements in document order.
    #[must_use]
    pub fn content(&self) -> &[Content] {
        &self.content
    }

    /// Appends text, merging it with text right before it. Empty text is
    /// dropped.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.content.last_mut() {
            Some(Content::Text(last)) => last.push_str(text),
            _ => self.content.push(Content::Text(text.to_string())),
        }
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: Element) {
        self.content.push(Content::Element(child));
    }

    /// Child elements, in order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.content.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// The element's own text, without that of its children.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text(t) => Some(t.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }

    /// Renders the element as XML. Elements without content are written
    /// self-closing as `<name />`.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {key}=\"{}\"", escape_attribute(value));
        }
        if self.content.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for item in &self.content {
            match item {
                Content::Text(text) => out.push_str(&escape_text(text)),
                Content::Element(child) => child.write_xml(out),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in escape_text(value).chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#09;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_elements_self_close() {
        assert_eq!(Element::new("br").to_xml(), "<br />");
    }

    #[test]
    fn adjacent_text_merges() {
        let mut p = Element::new("p");
        p.push_text("a");
        p.push_text("");
        p.push_text("b");
        let mut em = Element::new("em");
        em.push_text("c");
        p.push_child(em);
        p.push_text("d");
        assert_eq!(p.content().len(), 3);
        assert_eq!(p.text(), "abd");
        assert_eq!(p.children().map(Element::name).collect::<Vec<_>>(), ["em"]);
        assert_eq!(p.to_string(), "<p>ab<em>c</em>d</p>");
    }

    #[test]
    fn repeated_attributes_keep_their_position() {
        let mut a = Element::new("a");
        a.set_attribute("href", "x");
        a.set_attribute("title", "t");
        a.set_attribute("href", "y");
        assert_eq!(a.attribute("href"), Some("y"));
        assert_eq!(a.to_xml(), r#"<a href="y" title="t" />"#);
    }

    #[test]
    fn markup_characters_are_escaped() {
        let mut a = Element::new("a");
        a.set_attribute("q", "\"1 & 2\"\n");
        a.push_text("x < y > z");
        assert_eq!(a.to_xml(), r#"<a q="&quot;1 &amp; 2&quot;&#10;">x &lt; y &gt; z</a>"#);
    }
}
