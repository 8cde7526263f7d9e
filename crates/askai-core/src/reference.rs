//! Page references with optional paragraph fragments: `"Page#p1-3,7"`, `"Page#par4"`.

use crate::parnum;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which fragment prefix a reference is written with.
///
/// Search results are emitted as `#p…`; links into rendered pages use `#par…`.
/// Both parse to the same thing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentStyle {
    #[default]
    P,
    Par,
}

impl FragmentStyle {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::P => "p",
            Self::Par => "par",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceReference {
    pub page: String,
    /// Sorted, unique paragraph numbers; `None` means the whole page.
    pub paragraphs: Option<Vec<usize>>,
    pub style: FragmentStyle,
}

impl SourceReference {
    pub fn whole_page(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            paragraphs: None,
            style: FragmentStyle::P,
        }
    }

    pub fn with_paragraphs(
        page: impl Into<String>,
        paragraphs: impl IntoIterator<Item = usize>,
        style: FragmentStyle,
    ) -> Self {
        let set: BTreeSet<usize> = paragraphs.into_iter().collect();
        Self {
            page: page.into(),
            paragraphs: Some(set.into_iter().collect()),
            style,
        }
    }

    /// Parse `"<page>"` or `"<page>#<fragment>"`.
    ///
    /// Only `p<range>` / `par<range>` fragments select paragraphs; any other
    /// fragment (a section anchor) refers to the whole page. A paragraph fragment
    /// whose range is malformed is an error rather than "whole page".
    pub fn parse(s: &str) -> Result<Self> {
        let (page, fragment) = match s.split_once('#') {
            Some((page, fragment)) => (page.trim(), Some(fragment.trim())),
            None => (s.trim(), None),
        };
        if page.is_empty() {
            return Err(Error::InvalidPage(format!("{s:?}: empty page name")));
        }

        let Some((style, range)) = fragment.and_then(paragraph_fragment) else {
            return Ok(Self::whole_page(page));
        };
        let indices = parnum::unpack(range)?;
        Ok(Self::with_paragraphs(page, indices, style))
    }

    /// The paragraph range string, if this reference selects paragraphs.
    pub fn range_string(&self) -> Option<String> {
        self.paragraphs.as_deref().map(parnum::pack)
    }

    pub fn with_style(mut self, style: FragmentStyle) -> Self {
        self.style = style;
        self
    }
}

/// Recognize `p<range>` or `par<range>`.
pub fn paragraph_fragment(fragment: &str) -> Option<(FragmentStyle, &str)> {
    let (style, rest) = if let Some(rest) = fragment.strip_prefix("par") {
        (FragmentStyle::Par, rest)
    } else if let Some(rest) = fragment.strip_prefix('p') {
        (FragmentStyle::P, rest)
    } else {
        return None;
    };
    parnum::looks_like_range(rest).then_some((style, rest))
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.page)?;
        if let Some(range) = self.range_string() {
            write!(f, "#{}{}", self.style.prefix(), range)?;
        }
        Ok(())
    }
}

impl FromStr for SourceReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceReference {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<SourceReference> for String {
    fn from(r: SourceReference) -> Self {
        r.to_string()
    }
}
