// src/filtergraph.rs

//! Serialization of `-filter_complex` expressions.
//!
//! Every value that ends up inside the graph string goes through one of the
//! escape helpers here, so the quoting rules live in a single place.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// Characters the option parser and the graph parser both treat specially
// inside a libvmaf option value.
static OPTION_SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\\"'`:])"#).expect("Invalid option escape regex"));

/// Prepares a file path for use as a filter option value. Backslashes become
/// forward slashes. Colons and quotes are escaped for both the option parser
/// and the graph parser; `,` `;` `[` `]` only matter to the graph parser.
pub fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\\' => escaped.push('/'),
            ':' => escaped.push_str(r"\\:"),
            '\'' => escaped.push_str(r"\\\'"),
            ',' | ';' | '[' | ']' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Joins a list of option strings with `|` and escapes quotes, backslashes and
/// colons. Returns `None` for an empty list so the option can be left out.
pub fn escape_option_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let joined = values.join("|");
    Some(OPTION_SPECIAL_CHARS.replace_all(&joined, r"\\$1").into_owned())
}

/// A single filter with its options, e.g. `scale=w=1920:h=-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: String,
    options: Vec<(Option<String>, String)>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Filter {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.options.push((None, value.into()));
        self
    }

    /// Appends a `key=value` option. The value must already be escaped.
    pub fn option(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.options.push((Some(key.into()), value.to_string()));
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, (key, value)) in self.options.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            if let Some(key) = key {
                write!(f, "{}=", key)?;
            }
            f.write_str(value)?;
        }
        Ok(())
    }
}

/// A linear chain of filters between labelled pads:
/// `[in0][in1]filter,filter[out]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filters: Vec<Filter>,
    output: Option<String>,
}

impl FilterChain {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterChain {
            inputs: inputs.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
            output: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.output = Some(label.into());
        self
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        if let Some(output) = &self.output {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// A complete graph: chains separated by `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}
