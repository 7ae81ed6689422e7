//! Annotation parsing.
//!
//! An annotation is a comma-separated list: an optional output name followed
//! by rule tokens, e.g. `"email,omitempty_update,lowercase,email"`.

use crate::options::Method;

/// Prefix forcing the transformation namespace for a rule token.
pub const TRANSFORM_PREFIX: &str = "transform=";

/// Structural token enabling element traversal.
pub const DIVE: &str = "dive";

/// Structural token dropping zero values from the output.
pub const OMIT_EMPTY: &str = "omitempty";

/// A parsed field annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation<'a> {
    /// `""` or `"-"`: the field is not part of the output.
    Skip,
    Field {
        /// Output name override; `None` keeps the declared name.
        rename: Option<&'a str>,
        /// Remaining tokens, trimmed, in declared order.
        tokens: Vec<&'a str>,
    },
}

/// Parses an annotation string. Pure; never fails.
pub fn parse(annotation: &str) -> Annotation<'_> {
    let annotation = annotation.trim();
    if annotation.is_empty() || annotation == "-" {
        return Annotation::Skip;
    }

    let mut parts = annotation.split(',').map(str::trim);
    let rename = parts.next().filter(|name| !name.is_empty());
    let tokens = parts.filter(|token| !token.is_empty()).collect();

    Annotation::Field { rename, tokens }
}

/// Reference to a rule by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleRef<'a> {
    pub name: &'a str,
    pub param: Option<&'a str>,
    /// Declared with the `transform=` prefix.
    pub forced_transform: bool,
}

/// Classified rule token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleToken<'a> {
    /// `omitempty` (any method) or `omitempty_<method>`.
    OmitEmpty(Option<Method>),
    Dive,
    Rule(RuleRef<'a>),
}

impl<'a> RuleToken<'a> {
    pub fn classify(token: &'a str) -> Self {
        if let Some(rest) = token.strip_prefix(TRANSFORM_PREFIX) {
            let (name, param) = split_param(rest);
            return Self::Rule(RuleRef {
                name,
                param,
                forced_transform: true,
            });
        }

        if token == DIVE {
            return Self::Dive;
        }
        if token == OMIT_EMPTY {
            return Self::OmitEmpty(None);
        }
        if let Some((OMIT_EMPTY, method)) = Method::split_suffix(token) {
            return Self::OmitEmpty(Some(method));
        }

        let (name, param) = split_param(token);
        Self::Rule(RuleRef {
            name,
            param,
            forced_transform: false,
        })
    }
}

/// Splits `name=param` on the first `=`.
fn split_param(token: &str) -> (&str, Option<&str>) {
    match token.split_once('=') {
        Some((name, param)) => (name.trim(), Some(param.trim())),
        None => (token, None),
    }
}

/// Which methods drop zero values. Several omit tokens combine with OR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OmitPolicy {
    always: bool,
    methods: [bool; 3],
}

impl OmitPolicy {
    #[must_use]
    pub fn with(mut self, method: Option<Method>) -> Self {
        match method {
            None => self.always = true,
            Some(method) => self.methods[method as usize] = true,
        }
        self
    }

    pub fn applies_to(self, method: Method) -> bool {
        self.always || self.methods[method as usize]
    }

    pub fn is_none(self) -> bool {
        !self.always && !self.methods.contains(&true)
    }
}
