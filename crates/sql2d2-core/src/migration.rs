//! Migration source loading
//!
//! Gathers migration SQL from exactly one of: a glob pattern, a list of
//! files, or a literal SQL string.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Separator appended after every file's contents
const SOURCE_SEPARATOR: &str = "\n\n";

/// Migration loading errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("one of glob, sql file, or sql must be provided")]
    NoSource,

    #[error("only one of glob, sql file, or sql can be provided ({0} configured)")]
    MultipleSources(usize),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to expand glob '{pattern}': {message}")]
    Glob { pattern: String, message: String },

    #[error("migration source produced no SQL")]
    Empty,
}

impl MigrationError {
    /// Whether this is a configuration mistake rather than an IO failure
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::NoSource | Self::MultipleSources(_) | Self::Empty)
    }
}

/// Builder for migration SQL
///
/// ```rust,ignore
/// let sql = MigrationBuilder::new()
///     .use_glob("migrations/*.sql")
///     .get_sql()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationBuilder {
    glob: Option<String>,
    sql_files: Vec<PathBuf>,
    sql: Option<String>,
}

impl MigrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file matching a glob pattern, in lexical order
    pub fn use_glob(mut self, glob: impl Into<String>) -> Self {
        self.glob = Some(glob.into());
        self
    }

    /// Add a single file; may be called repeatedly
    pub fn use_sql_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sql_files.push(path.into());
        self
    }

    /// Use literal SQL
    pub fn use_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Check that exactly one kind of source is configured
    pub fn validate(&self) -> Result<(), MigrationError> {
        let count = [
            self.glob.is_some(),
            !self.sql_files.is_empty(),
            self.sql.is_some(),
        ]
        .iter()
        .filter(|configured| **configured)
        .count();

        match count {
            0 => Err(MigrationError::NoSource),
            1 => Ok(()),
            n => Err(MigrationError::MultipleSources(n)),
        }
    }

    /// Resolve the configured source to SQL text
    ///
    /// File contents are concatenated in discovery order, each followed by a
    /// blank line. Literal SQL is returned unchanged.
    pub fn get_sql(&self) -> Result<String, MigrationError> {
        self.validate()?;

        if let Some(sql) = &self.sql {
            return Ok(sql.clone());
        }

        let files = match &self.glob {
            Some(pattern) => {
                let files = expand_glob(pattern)?;
                if files.is_empty() {
                    tracing::warn!(pattern = %pattern, "glob matched no files");
                }
                files
            }
            None => self.sql_files.clone(),
        };

        let mut sql = String::new();
        for file in &files {
            sql.push_str(&read_source(file)?);
            sql.push_str(SOURCE_SEPARATOR);
        }
        Ok(sql)
    }
}

fn read_source(path: &Path) -> Result<String, MigrationError> {
    tracing::info!("Reading {}", path.display());
    std::fs::read_to_string(path).map_err(|source| MigrationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Characters that make a path segment a pattern rather than a literal name
fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '\\'])
}

/// One compiled path segment
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// `**`: zero or more directories
    Recursive,
    Pattern(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    /// `?`
    Any,
    /// `*`
    Star,
    /// `[a-z_]`, `[!0-9]` or `[^0-9]`
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Self::Literal(literal) => *literal == c,
            Self::Any => true,
            Self::Star => false,
            Self::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi) != *negated
            }
        }
    }
}

fn compile_segment(segment: &str) -> Result<Segment, &'static str> {
    if segment == "**" {
        return Ok(Segment::Recursive);
    }

    let mut tokens = Vec::new();
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        let token = match c {
            '*' => Token::Star,
            '?' => Token::Any,
            '\\' => Token::Literal(chars.next().ok_or("trailing escape")?),
            '[' => compile_class(&mut chars)?,
            other => Token::Literal(other),
        };
        tokens.push(token);
    }
    Ok(Segment::Pattern(tokens))
}

/// Parse a character class after its opening `[`
fn compile_class(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token, &'static str> {
    let negated = matches!(chars.peek(), Some('!' | '^'));
    if negated {
        chars.next();
    }

    let mut ranges = Vec::new();
    loop {
        let lo = match chars.next() {
            None => return Err("unclosed character class"),
            Some(']') if ranges.is_empty() => return Err("empty character class"),
            Some(']') => break,
            Some('\\') => chars.next().ok_or("trailing escape")?,
            Some(c) => c,
        };

        let hi = if chars.peek() == Some(&'-') {
            chars.next();
            match chars.next() {
                None => return Err("unclosed character class"),
                Some(']') => return Err("unterminated range in character class"),
                Some('\\') => chars.next().ok_or("trailing escape")?,
                Some(c) => c,
            }
        } else {
            lo
        };
        ranges.push((lo, hi));
    }

    Ok(Token::Class { negated, ranges })
}

/// Expand a glob pattern to matching files, sorted lexically
///
/// Within a path segment `*`, `?`, `[...]` classes (negated with `!` or `^`)
/// and `\` escapes are supported; `**` spans directories. A pattern without
/// any of these yields the path itself if it is a file.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, MigrationError> {
    if !has_wildcard(pattern) {
        let path = PathBuf::from(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }

    let glob_error = |message: String| MigrationError::Glob {
        pattern: pattern.to_string(),
        message,
    };

    let segments: Vec<&str> = pattern.split('/').collect();
    let split = segments
        .iter()
        .position(|s| has_wildcard(s))
        .unwrap_or(segments.len());

    let rest = segments[split..]
        .iter()
        .map(|s| compile_segment(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|message| glob_error(message.to_string()))?;

    let joined = segments[..split].join("/");
    let base = if split == 0 {
        PathBuf::from(".")
    } else if joined.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(joined)
    };

    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&base).min_depth(1);
    if !rest.contains(&Segment::Recursive) {
        walker = walker.max_depth(rest.len());
    }

    let mut matches = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| glob_error(e.to_string()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&base) else {
            continue;
        };
        let names: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        if match_segments(&rest, &names) {
            if split == 0 {
                matches.push(relative.to_path_buf());
            } else {
                matches.push(entry.path().to_path_buf());
            }
        }
    }

    matches.sort();
    Ok(matches)
}

fn match_segments(pattern: &[Segment], names: &[String]) -> bool {
    match pattern.split_first() {
        None => names.is_empty(),
        Some((Segment::Recursive, rest)) => {
            (0..=names.len()).any(|skip| match_segments(rest, &names[skip..]))
        }
        Some((Segment::Pattern(tokens), rest)) => match names.split_first() {
            Some((name, tail)) => match_segment(tokens, name) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Match one path segment against its compiled tokens
fn match_segment(tokens: &[Token], name: &str) -> bool {
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    // Last `*` seen and the name position it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match tokens.get(p) {
            Some(Token::Star) => {
                backtrack = Some((p, n));
                p += 1;
                continue;
            }
            Some(token) if token.matches(name[n]) => {
                p += 1;
                n += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, absorbed)) => {
                p = star + 1;
                n = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    tokens[p..].iter().all(|t| *t == Token::Star)
}
