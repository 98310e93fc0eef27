use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Selects how blank lines in rendered output are treated.
///
/// The variants are ordered from no compression to maximal compression.  Two
/// pairs of variants share a behavior: [`Raw`](Self::Raw) and
/// [`NormalizeBreaks`](Self::NormalizeBreaks) keep the text as-is,
/// [`RemoveSpaces`](Self::RemoveSpaces) and
/// [`RemoveAndNormalize`](Self::RemoveAndNormalize) compress runs of blank
/// lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FormatType {
    /// Keep blank lines.
    #[default]
    Raw = 0,
    /// Collapse runs of blank lines into one.
    RemoveSpaces = 1,
    /// Keep blank lines.
    NormalizeBreaks = 2,
    /// Collapse runs of blank lines into one.
    RemoveAndNormalize = 3,
    /// Remove all blank lines.
    Compact = 4,
}

impl FormatType {
    /// All format types in compression order.
    pub const ALL: [FormatType; 5] = [
        FormatType::Raw,
        FormatType::RemoveSpaces,
        FormatType::NormalizeBreaks,
        FormatType::RemoveAndNormalize,
        FormatType::Compact,
    ];

    /// Returns the kebab-case name of the format type.
    pub fn name(self) -> &'static str {
        match self {
            FormatType::Raw => "raw",
            FormatType::RemoveSpaces => "remove-spaces",
            FormatType::NormalizeBreaks => "normalize-breaks",
            FormatType::RemoveAndNormalize => "remove-and-normalize",
            FormatType::Compact => "compact",
        }
    }

    /// Returns the numeric code of the format type.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Applies the format type to rendered text.
    pub fn apply(self, content: &str) -> String {
        match self {
            FormatType::Raw | FormatType::NormalizeBreaks => content.to_string(),
            FormatType::RemoveSpaces | FormatType::RemoveAndNormalize => {
                compress_blank_lines(content)
            }
            FormatType::Compact => remove_blank_lines(content),
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn unsupported() -> Error {
    Error::new(ErrorKind::Format, "Unsupported format type")
}

impl TryFrom<i64> for FormatType {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        FormatType::ALL
            .into_iter()
            .find(|x| x.code() == value)
            .ok_or_else(unsupported)
    }
}

impl FromStr for FormatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<i64>() {
            return FormatType::try_from(code);
        }
        FormatType::ALL
            .into_iter()
            .find(|x| x.name() == s)
            .ok_or_else(unsupported)
    }
}

/// Formats rendered text according to a raw format type code.
///
/// Codes outside of the enumeration fail with `Unsupported format type`
/// rather than being clamped.
pub fn format(content: &str, code: i64) -> Result<String, Error> {
    FormatType::try_from(code).map(|ty| ty.apply(content))
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Collapses each run of blank lines into a single newline.
fn compress_blank_lines(content: &str) -> String {
    let mut rv = String::with_capacity(content.len());
    let mut prev_blank = false;
    for line in content.split_inclusive('\n') {
        if !is_blank(line) {
            rv.push_str(line);
            prev_blank = false;
        } else if !prev_blank {
            rv.push('\n');
            prev_blank = true;
        }
    }
    rv
}

/// Drops every blank line.
fn remove_blank_lines(content: &str) -> String {
    content
        .split_inclusive('\n')
        .filter(|line| !is_blank(line))
        .collect()
}
