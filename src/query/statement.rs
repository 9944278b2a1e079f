//! Statement splitting and classification.
//!
//! Uses the sqlparser tokenizer for the driver's dialect, so semicolons inside
//! string literals, quoted identifiers and comments do not end a statement.
//! Classification only looks at keywords; the database remains the judge of
//! whether the statement is valid.

use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, TokenWithLocation, Tokenizer};
use tracing::debug;

use crate::connection::DriverKind;
use crate::error::{PagerError, Result};

/// Leading keywords of statements that produce a result set.
const TABULAR_KEYWORDS: &[&str] = &["SELECT", "VALUES", "TABLE", "SHOW", "EXPLAIN", "DESCRIBE", "DESC"];

/// Keywords that make a statement change data.
const DATA_MODIFYING: &[&str] = &["INSERT", "UPDATE", "DELETE", "MERGE", "REPLACE", "UPSERT"];

/// Keywords that can start the main statement of a `WITH` query.
const MAIN_STATEMENT: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "VALUES"];

/// Whether a statement produces a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// The statement has a result description (rows and columns).
    Tabular,
    /// The statement only reports completion.
    Command,
}

/// The first statement of a piece of SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    text: String,
    keyword: String,
    kind: StatementKind,
    mutating: bool,
    modifies_data: bool,
    ignored: usize,
}

impl Statement {
    /// Extracts the first statement of `sql`.
    ///
    /// Fails with `NoStatement` when the text holds nothing but whitespace,
    /// comments and semicolons.
    pub fn parse(sql: &str, kind: DriverKind) -> Result<Self> {
        let dialect = dialect_for(kind);
        let tokens = match Tokenizer::new(dialect.as_ref(), sql).tokenize_with_location() {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!("Tokenizer rejected statement, sending it unsplit: {e}");
                return Self::unsplit(sql);
            }
        };

        let mut statements = split(sql, &tokens);
        if statements.is_empty() {
            return Err(PagerError::NoStatement);
        }

        let ignored = statements.len() - 1;
        let (text, words) = statements.swap_remove(0);
        Ok(Self::classify(text, &words, ignored))
    }

    /// The statement as sent to the database.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The leading keyword, uppercased. Empty if the statement does not start
    /// with a word.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn is_tabular(&self) -> bool {
        self.kind == StatementKind::Tabular
    }

    /// True when running the statement twice could differ from running it
    /// once.
    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    /// True when the statement writes rows: DML, a `WITH` wrapping DML, or
    /// `EXPLAIN ANALYZE` over DML. Drivers run these in a transaction; every
    /// other statement runs in autocommit.
    pub fn modifies_data(&self) -> bool {
        self.modifies_data
    }

    /// Number of statements after the first one that were dropped.
    pub fn ignored_statements(&self) -> usize {
        self.ignored
    }

    /// Fallback for text the tokenizer cannot handle (e.g. an unterminated
    /// string): keep it whole and let the database report the problem.
    fn unsplit(sql: &str) -> Result<Self> {
        let text = sql.trim();
        if text.is_empty() {
            return Err(PagerError::NoStatement);
        }

        let words: Vec<Word> = text
            .split_whitespace()
            .map(|w| Word::named(w.to_uppercase(), 0))
            .collect();
        Ok(Self::classify(text.to_string(), &words, 0))
    }

    fn classify(text: String, words: &[Word], ignored: usize) -> Self {
        let keyword = words
            .first()
            .and_then(|w| w.keyword.clone())
            .unwrap_or_default();
        let base_depth = words.first().map_or(0, |w| w.depth);

        let has_top_level = |name: &str| {
            words
                .iter()
                .any(|w| w.depth == base_depth && w.is(name))
        };
        let has_anywhere = |names: &[&str]| -> bool {
            words
                .iter()
                .any(|w| names.iter().any(|name| w.is(name)))
        };

        let (tabular, mutating) = match keyword.as_str() {
            "WITH" => {
                let main = words
                    .iter()
                    .skip(1)
                    .filter(|w| w.depth == base_depth)
                    .find_map(|w| {
                        MAIN_STATEMENT
                            .iter()
                            .find(|name| w.is(name))
                            .copied()
                    });
                (
                    matches!(main, Some("SELECT") | Some("VALUES")),
                    has_anywhere(DATA_MODIFYING),
                )
            }
            "EXPLAIN" => (
                true,
                has_anywhere(&["ANALYZE"][..]) && has_anywhere(DATA_MODIFYING),
            ),
            "PRAGMA" => {
                // `PRAGMA name = value` sets; only some settings echo a row.
                let assigns = words.iter().any(|w| w.assignment);
                (!assigns, assigns)
            }
            "SELECT" | "VALUES" | "TABLE" | "SHOW" | "DESCRIBE" | "DESC" => (true, false),
            _ => (false, true),
        };

        let kind = if tabular
            || TABULAR_KEYWORDS.contains(&keyword.as_str())
            || has_top_level("RETURNING")
        {
            StatementKind::Tabular
        } else {
            StatementKind::Command
        };
        let modifies_data = DATA_MODIFYING.contains(&keyword.as_str())
            || (matches!(keyword.as_str(), "WITH" | "EXPLAIN") && mutating);

        Self {
            text,
            keyword,
            kind,
            mutating,
            modifies_data,
            ignored,
        }
    }
}

/// The significant tokens of a statement, reduced to what classification
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    /// Uppercased unquoted word, `None` for other tokens.
    keyword: Option<String>,
    /// Parenthesis depth the token appears at.
    depth: usize,
    /// The token is `=`.
    assignment: bool,
}

impl Word {
    fn named(value: String, depth: usize) -> Self {
        Self {
            keyword: Some(value),
            depth,
            assignment: false,
        }
    }

    fn is(&self, name: &str) -> bool {
        self.keyword.as_deref() == Some(name)
    }
}

fn dialect_for(kind: DriverKind) -> Box<dyn Dialect> {
    match kind {
        DriverKind::Sqlite => Box::new(SQLiteDialect {}),
        DriverKind::Postgres => Box::new(PostgreSqlDialect {}),
        DriverKind::MySql => Box::new(MySqlDialect {}),
    }
}

/// Splits the token stream at top-level semicolons, returning the trimmed
/// source text and the significant tokens of every non-empty statement.
fn split(sql: &str, tokens: &[TokenWithLocation]) -> Vec<(String, Vec<Word>)> {
    let offsets = LineOffsets::new(sql);
    let mut statements = Vec::new();

    let mut words: Vec<Word> = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;

    for token in tokens {
        match &token.token {
            Token::SemiColon | Token::EOF => {
                if let Some(begin) = start.take() {
                    let end = offsets.byte_offset(sql, token);
                    let text = sql[begin..end].trim_end().to_string();
                    statements.push((text, std::mem::take(&mut words)));
                }
                depth = 0;
            }
            Token::Whitespace(_) => {}
            other => {
                if start.is_none() {
                    start = Some(offsets.byte_offset(sql, token));
                }
                match other {
                    Token::LParen => {
                        depth += 1;
                        words.push(Word {
                            keyword: None,
                            depth,
                            assignment: false,
                        });
                    }
                    Token::RParen => {
                        words.push(Word {
                            keyword: None,
                            depth,
                            assignment: false,
                        });
                        depth = depth.saturating_sub(1);
                    }
                    Token::Word(word) if word.quote_style.is_none() => {
                        words.push(Word::named(word.value.to_uppercase(), depth));
                    }
                    Token::Eq => words.push(Word {
                        keyword: None,
                        depth,
                        assignment: true,
                    }),
                    _ => words.push(Word {
                        keyword: None,
                        depth,
                        assignment: false,
                    }),
                }
            }
        }
    }

    if let Some(begin) = start {
        let text = sql[begin..].trim_end().to_string();
        statements.push((text, words));
    }

    // A statement wrapped in parentheses is classified by its first keyword.
    for (_, words) in &mut statements {
        let leading = words.iter().take_while(|w| w.keyword.is_none()).count();
        if leading > 0 && words.get(leading).is_some_and(|w| w.keyword.is_some()) {
            words.drain(..leading);
        }
    }

    statements
}

/// Maps the tokenizer's 1-based line/column locations to byte offsets.
struct LineOffsets {
    starts: Vec<usize>,
}

impl LineOffsets {
    fn new(sql: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(sql.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn byte_offset(&self, sql: &str, token: &TokenWithLocation) -> usize {
        let line = (token.location.line as usize).saturating_sub(1);
        let Some(&line_start) = self.starts.get(line) else {
            return sql.len();
        };

        // Columns count characters, not bytes.
        let column = (token.location.column as usize).saturating_sub(1);
        sql[line_start..]
            .char_indices()
            .nth(column)
            .map_or(sql.len(), |(i, _)| line_start + i)
    }
}
