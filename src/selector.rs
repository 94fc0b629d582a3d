//! Element selectors
//!
//! Most selectors render to CSS. Text containment has no CSS equivalent and is
//! evaluated in the page instead (see [`Page::query`](crate::page::Page::query)).

use std::fmt;

/// How to find elements on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Every element with this tag name
    Tag(String),
    /// The element with this id
    Id(String),
    /// Raw CSS selector
    Css(String),
    /// `tag` elements whose `attr` contains `value`
    AttrContains {
        tag: String,
        attr: String,
        value: String,
    },
    /// Elements matching `scope` (CSS) whose text contains any of `needles`.
    /// Matching is case-sensitive. With the `*` scope only an element's own
    /// text nodes count, so ancestors of a match are not matches themselves.
    Text { scope: String, needles: Vec<String> },
    /// Elements matching any of the parts
    AnyOf(Vec<Selector>),
}

impl Selector {
    pub fn tag(name: &str) -> Self {
        Selector::Tag(name.to_string())
    }

    pub fn id(id: &str) -> Self {
        Selector::Id(id.to_string())
    }

    pub fn css(css: &str) -> Self {
        Selector::Css(css.to_string())
    }

    pub fn attr_contains(tag: &str, attr: &str, value: &str) -> Self {
        Selector::AttrContains {
            tag: tag.to_string(),
            attr: attr.to_string(),
            value: value.to_string(),
        }
    }

    /// Any element whose own text contains one of `needles`
    pub fn text_any(needles: &[&str]) -> Self {
        Selector::Text {
            scope: "*".to_string(),
            needles: needles.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// A `<button>` whose label contains `label`
    pub fn button(label: &str) -> Self {
        Self::buttons(&[label])
    }

    /// A `<button>` whose label contains any of `labels`
    pub fn buttons(labels: &[&str]) -> Self {
        Selector::Text {
            scope: "button".to_string(),
            needles: labels.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Union of `parts`; nested unions are flattened
    pub fn any_of(parts: Vec<Selector>) -> Self {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Selector::AnyOf(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Selector::AnyOf(flat)
    }

    /// CSS form of the selector, or `None` if any part needs text matching
    pub fn to_css(&self) -> Option<String> {
        match self {
            Selector::Tag(tag) => Some(tag.clone()),
            Selector::Id(id) => Some(format!("[id={}]", css_string(id))),
            Selector::Css(css) => Some(css.clone()),
            Selector::AttrContains { tag, attr, value } => {
                Some(format!("{}[{}*={}]", tag, attr, css_string(value)))
            }
            Selector::Text { .. } => None,
            Selector::AnyOf(parts) => parts
                .iter()
                .map(Selector::to_css)
                .collect::<Option<Vec<_>>>()
                .map(|css| css.join(", ")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Text { scope, needles } => {
                write!(f, "{} containing {}", scope, needles.join(" | "))
            }
            Selector::AnyOf(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
            other => f.write_str(&other.to_css().unwrap_or_default()),
        }
    }
}

/// Quote a value as a CSS string literal
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
