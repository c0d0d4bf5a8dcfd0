use indexmap::IndexMap;

use crate::{Bound, DBType, Error, Scalar};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Sql(String),
    Param(String),
}

/// SQL text with `:name` placeholders, parsed once and rendered per dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    source: String,
    segments: Vec<Segment>,
}

impl Statement {
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let segments = split_placeholders(&source);
        Statement { source, segments }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance, repeated names included
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Sql(_) => None,
        })
    }

    /// Renders positional SQL for `dialect` and the matching argument list
    ///
    /// `Many` parameters expand to a parenthesized placeholder list.
    ///
    /// # Errors
    /// Returns [`Error::MissingParameter`] for a placeholder with no bound value
    pub fn render(
        &self,
        dialect: DBType,
        params: &IndexMap<String, Bound>,
    ) -> Result<(String, Vec<Scalar>), Error> {
        let f = dialect.get_encode_placeholder_fn();
        let mut sql = String::with_capacity(self.source.len());
        let mut arguments = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Sql(text) => sql.push_str(text),
                Segment::Param(name) => {
                    let bound = params
                        .get(name)
                        .ok_or_else(|| Error::MissingParameter(name.clone()))?;
                    match bound {
                        Bound::One(scalar) => {
                            arguments.push(scalar.clone());
                            f(arguments.len(), &mut sql);
                        }
                        Bound::Many(scalars) if scalars.is_empty() => {
                            sql.push_str("(NULL)");
                        }
                        Bound::Many(scalars) => {
                            sql.push('(');
                            for (i, scalar) in scalars.iter().enumerate() {
                                if i > 0 {
                                    sql.push(',');
                                }
                                arguments.push(scalar.clone());
                                f(arguments.len(), &mut sql);
                            }
                            sql.push(')');
                        }
                    }
                }
            }
        }
        Ok((sql, arguments))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn split_placeholders(source: &str) -> Vec<Segment> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let after_ident = i > 0 && is_ident_char(chars[i - 1].1);
        match c {
            '\'' | '"' => {
                // quoted text, doubled quotes escape
                i += 1;
                while i < chars.len() {
                    if chars[i].1 == c {
                        if chars.get(i + 1).map(|(_, n)| *n) == Some(c) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                i += 2;
                while i < chars.len() {
                    if chars[i].1 == '*' && chars.get(i + 1).map(|(_, n)| *n) == Some('/') {
                        break;
                    }
                    i += 1;
                }
                i += 2;
            }
            '\\' if next == Some(':') => {
                // `\:` keeps a literal colon
                if start < pos {
                    segments.push(Segment::Sql(source[start..pos].to_string()));
                }
                start = pos + 1;
                i += 2;
            }
            ':' if next == Some(':') => {
                i += 2;
            }
            // slices and qualified names such as `arr[1:n]`
            ':' if after_ident => i += 1,
            ':' if next.is_some_and(is_ident_start) => {
                let mut end = i + 1;
                while end < chars.len() && is_ident_char(chars[end].1) {
                    end += 1;
                }
                let end_pos = chars.get(end).map(|(p, _)| *p).unwrap_or(source.len());
                if start < pos {
                    segments.push(Segment::Sql(source[start..pos].to_string()));
                }
                segments.push(Segment::Param(source[pos + 1..end_pos].to_string()));
                start = end_pos;
                i = end;
            }
            _ => i += 1,
        }
    }
    if start < source.len() {
        segments.push(Segment::Sql(source[start..].to_string()));
    }
    segments
}
