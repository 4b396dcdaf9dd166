//! Title-formatter evaluator (ambient player-wide collaborator, §1/§9).
//!
//! A small subset of a foobar2000-style title-formatting language: plain
//! `%field%` substitution, `[...]` optional groups that vanish entirely if
//! any field reference inside them is missing, and three functions —
//! `$if2(a,b)`, `$if(cond,then[,else])`, `$and(a,b,...)` — sufficient to
//! evaluate every formatter string this crate actually needs: the squash
//! fingerprint (§3 SquashGroup), the composite album key (§4.9), and the
//! Artists/Genres/Albums tree node labels (§4.11). This is deliberately not
//! a general expression language; unsupported syntax is a compile error
//! rather than being silently accepted.

use std::collections::HashMap;

/// Something a formatter can pull field values out of.
///
/// `LibraryEntry` and ad-hoc `FieldMap`s both implement this so the same
/// compiled [`TitleFormat`] can run against either.
pub trait FieldSource {
    /// Look up a field by name (without the surrounding `%…%`). `None` and
    /// `Some("")` are both treated as "undefined" by the formatter.
    fn field(&self, name: &str) -> Option<String>;
}

/// A `HashMap<&str, String>`-backed [`FieldSource`] for ad-hoc evaluation
/// (tests, and call sites that don't have a full track handle).
#[derive(Debug, Clone, Default)]
pub struct FieldMap(HashMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl FieldSource for FieldMap {
    fn field(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
enum Node {
    Literal(String),
    Field(String),
    Group(Vec<Node>),
    Func(String, Vec<Vec<Node>>),
}

/// A compiled format string, ready to evaluate against any [`FieldSource`].
#[derive(Debug, Clone)]
pub struct TitleFormat {
    nodes: Vec<Node>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unterminated %field% at offset {0}")]
    UnterminatedField(usize),
    #[error("unterminated [group] at offset {0}")]
    UnterminatedGroup(usize),
    #[error("unterminated $func(...) at offset {0}")]
    UnterminatedFunc(usize),
    #[error("unknown function ${0}")]
    UnknownFunction(String),
    #[error("$if2 requires exactly 2 arguments, got {0}")]
    If2Arity(usize),
    #[error("$if requires 2 or 3 arguments, got {0}")]
    IfArity(usize),
}

impl TitleFormat {
    /// Compile a format string. Returns an error for unbalanced
    /// `%`/`[...]`/`$func(...)` syntax or an unknown function name.
    pub fn compile(pattern: &str) -> Result<Self, FormatError> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut pos = 0;
        let nodes = parse_nodes(&chars, &mut pos, &[])?;
        Ok(Self { nodes })
    }

    /// Evaluate this format against `ctx`, returning the rendered text.
    /// Missing fields render as empty text outside of `[...]` groups, and
    /// suppress the entire enclosing group when inside one.
    pub fn eval(&self, ctx: &dyn FieldSource) -> String {
        eval_nodes(&self.nodes, ctx).0
    }
}

fn parse_nodes(
    chars: &[char],
    pos: &mut usize,
    stop: &[char],
) -> Result<Vec<Node>, FormatError> {
    let mut nodes = Vec::new();
    let mut literal = String::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        if stop.contains(&c) {
            break;
        }
        match c {
            '%' => {
                flush_literal(&mut nodes, &mut literal);
                let start = *pos;
                *pos += 1;
                let mut name = String::new();
                loop {
                    if *pos >= chars.len() {
                        return Err(FormatError::UnterminatedField(start));
                    }
                    if chars[*pos] == '%' {
                        *pos += 1;
                        break;
                    }
                    name.push(chars[*pos]);
                    *pos += 1;
                }
                nodes.push(Node::Field(name));
            }
            '[' => {
                flush_literal(&mut nodes, &mut literal);
                let start = *pos;
                *pos += 1;
                let inner = parse_nodes(chars, pos, &[']'])?;
                if *pos >= chars.len() || chars[*pos] != ']' {
                    return Err(FormatError::UnterminatedGroup(start));
                }
                *pos += 1;
                nodes.push(Node::Group(inner));
            }
            '$' => {
                flush_literal(&mut nodes, &mut literal);
                let start = *pos;
                *pos += 1;
                let mut name = String::new();
                while *pos < chars.len() && (chars[*pos].is_alphanumeric() || chars[*pos] == '_') {
                    name.push(chars[*pos]);
                    *pos += 1;
                }
                if *pos >= chars.len() || chars[*pos] != '(' {
                    return Err(FormatError::UnterminatedFunc(start));
                }
                *pos += 1; // consume '('
                let mut args = Vec::new();
                loop {
                    let arg = parse_nodes(chars, pos, &[',', ')'])?;
                    let stopped_at = chars.get(*pos).copied();
                    args.push(arg);
                    match stopped_at {
                        Some(',') => {
                            *pos += 1;
                        }
                        Some(')') => {
                            *pos += 1;
                            break;
                        }
                        _ => return Err(FormatError::UnterminatedFunc(start)),
                    }
                }
                validate_func(&name, args.len())?;
                nodes.push(Node::Func(name, args));
            }
            _ => {
                literal.push(c);
                *pos += 1;
            }
        }
    }
    flush_literal(&mut nodes, &mut literal);
    Ok(nodes)
}

fn flush_literal(nodes: &mut Vec<Node>, literal: &mut String) {
    if !literal.is_empty() {
        nodes.push(Node::Literal(std::mem::take(literal)));
    }
}

fn validate_func(name: &str, argc: usize) -> Result<(), FormatError> {
    match name {
        "if2" if argc == 2 => Ok(()),
        "if2" => Err(FormatError::If2Arity(argc)),
        "if" if argc == 2 || argc == 3 => Ok(()),
        "if" => Err(FormatError::IfArity(argc)),
        "and" => Ok(()),
        other => Err(FormatError::UnknownFunction(other.to_string())),
    }
}

/// Note: function parsing above stops at `,`/`)` by treating them as
/// top-level-only terminators; nested `$func(...)` calls consume their own
/// `)` before control returns here, so depth tracking falls out of the
/// recursive-descent structure without an explicit counter. `[` groups are
/// similarly self-terminating on their own `]`.
fn eval_nodes(nodes: &[Node], ctx: &dyn FieldSource) -> (String, bool) {
    let mut out = String::new();
    let mut any_undefined = false;
    for node in nodes {
        match node {
            Node::Literal(s) => out.push_str(s),
            Node::Field(name) => match ctx.field(name) {
                Some(v) if !v.is_empty() => out.push_str(&v),
                _ => any_undefined = true,
            },
            Node::Group(inner) => {
                let (text, defined) = eval_nodes(inner, ctx);
                if defined {
                    out.push_str(&text);
                }
            }
            Node::Func(name, args) => {
                if let Some(text) = eval_func(name, args, ctx) {
                    out.push_str(&text);
                }
            }
        }
    }
    (out, !any_undefined)
}

fn eval_func(name: &str, args: &[Vec<Node>], ctx: &dyn FieldSource) -> Option<String> {
    match name {
        "if2" => {
            let (t0, d0) = eval_nodes(&args[0], ctx);
            if d0 && !t0.is_empty() {
                Some(t0)
            } else {
                Some(eval_nodes(&args[1], ctx).0)
            }
        }
        "if" => {
            let (_, d0) = eval_nodes(&args[0], ctx);
            if d0 {
                Some(eval_nodes(&args[1], ctx).0)
            } else if args.len() > 2 {
                Some(eval_nodes(&args[2], ctx).0)
            } else {
                None
            }
        }
        "and" => {
            let all = args.iter().all(|a| eval_nodes(a, ctx).1);
            all.then(String::new)
        }
        _ => unreachable!("validate_func rejects unknown names at compile time"),
    }
}

/// The squash fingerprint format string (§3 SquashGroup equivalence rule
/// (c)): `"tracknr - title - artist - album"`, only meaningful when all
/// four fields are non-empty — callers check that before using the
/// rendered text, since the formatter itself would silently render missing
/// fields as empty rather than refusing the whole fingerprint.
pub const FINGERPRINT_FORMAT: &str = "%tracknumber% - %title% - %artist% - %album%";

/// The composite album key format string (§4.9).
pub const ALBUM_KEY_FORMAT: &str =
    "artist=$if2(%album artist%,Unknown Artist);album=$if2(%album%,Unknown Album)";

/// The Artists/Genres tree album-subnode label format string (§4.11).
pub const ARTIST_ALBUM_LABEL_FORMAT: &str = "[%album artist% - ]%album%";

/// The Artists/Genres/Albums tree track label format string (§4.11).
pub const TRACK_LABEL_FORMAT: &str = "[%tracknumber%. ]%title%";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_field_substitution() {
        let tf = TitleFormat::compile("%artist% - %title%").unwrap();
        let fields = FieldMap::new().with("artist", "Queen").with("title", "Bohemian Rhapsody");
        assert_eq!(tf.eval(&fields), "Queen - Bohemian Rhapsody");
    }

    #[test]
    fn optional_group_vanishes_when_field_missing() {
        let tf = TitleFormat::compile("[%tracknumber%. ]%title%").unwrap();
        let with_track = FieldMap::new().with("tracknumber", "3").with("title", "Song");
        assert_eq!(tf.eval(&with_track), "3. Song");

        let without_track = FieldMap::new().with("title", "Song");
        assert_eq!(tf.eval(&without_track), "Song");
    }

    #[test]
    fn if2_falls_back_when_undefined() {
        let tf = TitleFormat::compile(ALBUM_KEY_FORMAT).unwrap();
        let fields = FieldMap::new();
        assert_eq!(tf.eval(&fields), "artist=Unknown Artist;album=Unknown Album");

        let fields = FieldMap::new().with("album artist", "Pixies").with("album", "Doolittle");
        assert_eq!(tf.eval(&fields), "artist=Pixies;album=Doolittle");
    }

    #[test]
    fn artist_album_label_format() {
        let tf = TitleFormat::compile(ARTIST_ALBUM_LABEL_FORMAT).unwrap();
        let full = FieldMap::new().with("album artist", "Pixies").with("album", "Doolittle");
        assert_eq!(tf.eval(&full), "Pixies - Doolittle");

        let no_artist = FieldMap::new().with("album", "Doolittle");
        assert_eq!(tf.eval(&no_artist), "Doolittle");
    }

    #[test]
    fn unterminated_field_is_an_error() {
        assert_eq!(
            TitleFormat::compile("%artist").unwrap_err(),
            FormatError::UnterminatedField(0)
        );
    }

    #[test]
    fn unknown_function_is_an_error() {
        assert_eq!(
            TitleFormat::compile("$nope(%title%)").unwrap_err(),
            FormatError::UnknownFunction("nope".to_string())
        );
    }

    #[test]
    fn nested_function_calls_parse() {
        let tf = TitleFormat::compile("$if2($if2(%a%,%b%),%c%)").unwrap();
        let fields = FieldMap::new().with("b", "B").with("c", "C");
        assert_eq!(tf.eval(&fields), "B");
    }
}
