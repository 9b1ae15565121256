use thiserror::Error;

/// A SQL script that cannot be split because a quoted section or comment never closes.
/// Lines are 1-based and point at where the construct opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementParseError {
    #[error("unterminated string literal starting on line {line}")]
    UnterminatedString { line: usize },

    #[error("unterminated quoted identifier starting on line {line}")]
    UnterminatedIdentifier { line: usize },

    #[error("unterminated block comment starting on line {line}")]
    UnterminatedComment { line: usize },

    #[error("unterminated dollar-quoted string {tag} starting on line {line}")]
    UnterminatedDollarQuote { tag: String, line: usize },
}

/// Split a SQL script into individual statements.
///
/// Statements end at `;`. Terminators inside single-quoted literals, quoted
/// identifiers (`"x"`, `` `x` `` and `[x]`), `--` and `/* */` comments, `$tag$`
/// bodies and the `BEGIN ... END` body of a `CREATE TRIGGER` are ignored.
/// Each statement is trimmed and returned without its terminator; chunks holding
/// only whitespace or comments are dropped.
///
/// Example: "INSERT INTO t(x) VALUES ('a;b');" -> ["INSERT INTO t(x) VALUES ('a;b')"]
pub fn split_statements(sql: &str) -> Result<Vec<String>, StatementParseError> {
    let mut splitter = Splitter::new(sql);
    splitter.run()?;
    Ok(splitter.statements)
}

struct Splitter<'a> {
    sql: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    start: usize,
    has_code: bool,
    /// Words seen so far in the current statement
    words: usize,
    create: bool,
    trigger: bool,
    /// Open `BEGIN`/`CASE` blocks inside a trigger body
    block_depth: usize,
    statements: Vec<String>,
}

impl<'a> Splitter<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            bytes: sql.as_bytes(),
            pos: 0,
            line: 1,
            start: 0,
            has_code: false,
            words: 0,
            create: false,
            trigger: false,
            block_depth: 0,
            statements: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    // All delimiters are ASCII, so byte offsets taken at them are char boundaries.
    fn run(&mut self) -> Result<(), StatementParseError> {
        while let Some(byte) = self.peek(0) {
            match byte {
                b'\'' => {
                    self.has_code = true;
                    let backslash_escapes = self.is_escape_string();
                    self.skip_quoted(b'\'', backslash_escapes)
                        .map_err(|line| StatementParseError::UnterminatedString { line })?;
                }
                b'"' => {
                    self.has_code = true;
                    self.skip_quoted(b'"', false)
                        .map_err(|line| StatementParseError::UnterminatedIdentifier { line })?;
                }
                b'`' => {
                    self.has_code = true;
                    self.skip_quoted(b'`', false)
                        .map_err(|line| StatementParseError::UnterminatedIdentifier { line })?;
                }
                b'[' => {
                    self.has_code = true;
                    self.skip_bracketed()
                        .map_err(|line| StatementParseError::UnterminatedIdentifier { line })?;
                }
                b'-' if self.peek(1) == Some(b'-') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'$' => {
                    self.has_code = true;
                    match self.dollar_tag() {
                        Some(tag) => self.skip_dollar_quoted(tag)?,
                        None => self.pos += 1,
                    }
                }
                b';' if self.block_depth > 0 => self.pos += 1,
                b';' => {
                    self.finish_statement(self.pos);
                    self.pos += 1;
                    self.start = self.pos;
                }
                b if is_word_start(b) && !self.follows_identifier() => {
                    self.has_code = true;
                    self.read_word();
                }
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                other => {
                    if !other.is_ascii_whitespace() {
                        self.has_code = true;
                    }
                    self.pos += 1;
                }
            }
        }
        self.finish_statement(self.bytes.len());
        Ok(())
    }

    fn finish_statement(&mut self, end: usize) {
        if self.has_code {
            let statement = self.sql[self.start..end].trim();
            self.statements.push(statement.to_string());
        }
        self.has_code = false;
        self.words = 0;
        self.create = false;
        self.trigger = false;
        self.block_depth = 0;
    }

    fn follows_identifier(&self) -> bool {
        self.pos
            .checked_sub(1)
            .is_some_and(|i| is_identifier_byte(self.bytes[i]))
    }

    /// Consume one keyword or bare identifier and track trigger bodies.
    fn read_word(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(is_identifier_byte) {
            self.pos += 1;
        }
        let word = &self.sql[start..self.pos];
        let index = self.words;
        self.words += 1;

        // CREATE [TEMP|TEMPORARY] TRIGGER
        if index == 0 {
            self.create = word.eq_ignore_ascii_case("CREATE");
        } else if self.create && index <= 2 && word.eq_ignore_ascii_case("TRIGGER") {
            self.trigger = true;
        } else if self.trigger {
            if word.eq_ignore_ascii_case("BEGIN") || word.eq_ignore_ascii_case("CASE") {
                self.block_depth += 1;
            } else if word.eq_ignore_ascii_case("END") {
                self.block_depth = self.block_depth.saturating_sub(1);
            }
        }
    }

    /// `E'...'` strings treat backslash as an escape character.
    fn is_escape_string(&self) -> bool {
        let Some(prefix) = self.pos.checked_sub(1).map(|i| self.bytes[i]) else {
            return false;
        };
        if !matches!(prefix, b'E' | b'e') {
            return false;
        }
        match self.pos.checked_sub(2).map(|i| self.bytes[i]) {
            Some(before) => !is_identifier_byte(before),
            None => true,
        }
    }

    /// Skip a quoted section where a doubled quote is an escaped quote.
    /// On failure returns the line the section opened on.
    fn skip_quoted(&mut self, quote: u8, backslash_escapes: bool) -> Result<(), usize> {
        let opened_on = self.line;
        self.pos += 1;
        loop {
            let Some(byte) = self.peek(0) else {
                return Err(opened_on);
            };
            if byte == quote {
                if self.peek(1) == Some(quote) {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return Ok(());
            }
            if backslash_escapes && byte == b'\\' && self.peek(1).is_some() {
                if self.peek(1) == Some(b'\n') {
                    self.line += 1;
                }
                self.pos += 2;
                continue;
            }
            if byte == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    /// SQLite `[name]` identifiers have no escape for `]`.
    fn skip_bracketed(&mut self) -> Result<(), usize> {
        let opened_on = self.line;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None => return Err(opened_on),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'\n') => self.line += 1,
                Some(_) => {}
            }
            self.pos += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(byte) = self.peek(0) {
            if byte == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), StatementParseError> {
        let opened_on = self.line;
        let mut depth = 1usize;
        self.pos += 2;
        while depth > 0 {
            match (self.peek(0), self.peek(1)) {
                (None, _) => return Err(StatementParseError::UnterminatedComment { line: opened_on }),
                (Some(b'/'), Some(b'*')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some(b'*'), Some(b'/')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (Some(b'\n'), _) => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// Recognise `$$` or `$tag$` at the current position. `$1` placeholders and
    /// identifiers containing `$` are not quote openers.
    fn dollar_tag(&self) -> Option<&'a str> {
        if let Some(prev) = self.pos.checked_sub(1).map(|i| self.bytes[i]) {
            if is_identifier_byte(prev) {
                return None;
            }
        }
        let mut end = self.pos + 1;
        match self.bytes.get(end) {
            Some(b'$') => return Some(&self.sql[self.pos..=end]),
            Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
            _ => return None,
        }
        while let Some(&b) = self.bytes.get(end) {
            if b == b'$' {
                return Some(&self.sql[self.pos..=end]);
            }
            if !is_identifier_byte(b) {
                return None;
            }
            end += 1;
        }
        None
    }

    fn skip_dollar_quoted(&mut self, tag: &str) -> Result<(), StatementParseError> {
        let opened_on = self.line;
        let body_start = self.pos + tag.len();
        let Some(offset) = self.sql[body_start..].find(tag) else {
            return Err(StatementParseError::UnterminatedDollarQuote {
                tag: tag.to_string(),
                line: opened_on,
            });
        };
        let close = body_start + offset;
        self.line += self.bytes[body_start..close]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.pos = close + tag.len();
        Ok(())
    }
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let sql = "CREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\n";
        let statements = split_statements(sql).unwrap();
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
    }

    #[test]
    fn test_semicolon_inside_string_literal() {
        let statements = split_statements("INSERT INTO t(x) VALUES ('a;b');").unwrap();
        assert_eq!(statements, vec!["INSERT INTO t(x) VALUES ('a;b')"]);
    }

    #[test]
    fn test_doubled_quote_escape() {
        let sql = "INSERT INTO t(x) VALUES ('it''s; fine'); SELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t(x) VALUES ('it''s; fine')");
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_backslash_escape_in_escape_string() {
        let sql = r"INSERT INTO t(x) VALUES (E'a\';b'); SELECT 2;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements, vec![r"INSERT INTO t(x) VALUES (E'a\';b')", "SELECT 2"]);
    }

    #[test]
    fn test_backslash_is_literal_in_plain_string() {
        let sql = r"INSERT INTO t(x) VALUES ('C:\'); SELECT 3;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_quoted_identifier() {
        let sql = r#"CREATE TABLE "odd;name" (id INTEGER); SELECT 1"#;
        let statements = split_statements(sql).unwrap();
        assert_eq!(
            statements,
            vec![r#"CREATE TABLE "odd;name" (id INTEGER)"#, "SELECT 1"]
        );
    }

    #[test]
    fn test_comments_are_not_split() {
        let sql = "-- drop; everything\nCREATE TABLE a (id INTEGER); /* one; two */ SELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "-- drop; everything\nCREATE TABLE a (id INTEGER)"
        );
        assert_eq!(statements[1], "/* one; two */ SELECT 1");
    }

    #[test]
    fn test_nested_block_comment() {
        let sql = "/* outer /* inner; */ still comment; */ SELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("SELECT 1"));
    }

    #[test]
    fn test_comment_only_chunks_are_dropped() {
        assert!(split_statements("").unwrap().is_empty());
        assert!(split_statements("  \n\t ").unwrap().is_empty());
        assert!(split_statements("-- nothing here\n/* or here */").unwrap().is_empty());
        assert!(split_statements(";;  ;").unwrap().is_empty());

        let sql = "SELECT 1;\n-- trailing note\n";
        assert_eq!(split_statements(sql).unwrap(), vec!["SELECT 1"]);
    }

    #[test]
    fn test_missing_final_terminator() {
        let statements = split_statements("SELECT 1; SELECT 2").unwrap();
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_dollar_quoted_body() {
        let sql = "CREATE FUNCTION touch() RETURNS trigger AS $$\nBEGIN\n  NEW.updated_at = now();\n  RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\nSELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE FUNCTION touch()"));
        assert!(statements[0].ends_with("$$ LANGUAGE plpgsql"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_tagged_dollar_quote() {
        let sql = "DO $body$ BEGIN PERFORM 1; PERFORM '$$'; END $body$; SELECT 2;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1], "SELECT 2");
    }

    #[test]
    fn test_positional_parameter_is_not_dollar_quote() {
        let statements = split_statements("SELECT $1; SELECT $2;").unwrap();
        assert_eq!(statements, vec!["SELECT $1", "SELECT $2"]);
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let sql = "SELECT 1;\nINSERT INTO t VALUES ('oops);\n";
        assert_eq!(
            split_statements(sql),
            Err(StatementParseError::UnterminatedString { line: 2 })
        );
    }

    #[test]
    fn test_unterminated_identifier() {
        assert_eq!(
            split_statements("SELECT \"broken FROM t;"),
            Err(StatementParseError::UnterminatedIdentifier { line: 1 })
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let sql = "SELECT 1;\n\n/* never closed; SELECT 2;";
        assert_eq!(
            split_statements(sql),
            Err(StatementParseError::UnterminatedComment { line: 3 })
        );
    }

    #[test]
    fn test_unterminated_dollar_quote() {
        let sql = "SELECT 1;\nDO $fn$ BEGIN PERFORM 1; END;";
        assert_eq!(
            split_statements(sql),
            Err(StatementParseError::UnterminatedDollarQuote {
                tag: "$fn$".to_string(),
                line: 2,
            })
        );
    }

    #[test]
    fn test_line_counting_through_literals() {
        let sql = "INSERT INTO t VALUES ('a\nb');\n/* c\nd */\nSELECT 'x";
        assert_eq!(
            split_statements(sql),
            Err(StatementParseError::UnterminatedString { line: 5 })
        );
    }

    #[test]
    fn test_trigger_body_is_one_statement() {
        let sql = "CREATE TABLE notes (id INTEGER PRIMARY KEY, updated_at TIMESTAMP);\n\
                   CREATE TRIGGER IF NOT EXISTS notes_touch AFTER UPDATE ON notes\n\
                   BEGIN\n  UPDATE notes SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;\nEND;\n\
                   SELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[1].starts_with("CREATE TRIGGER IF NOT EXISTS notes_touch"));
        assert!(statements[1].ends_with("WHERE id = NEW.id;\nEND"));
        assert_eq!(statements[2], "SELECT 1");
    }

    #[test]
    fn test_temp_trigger_with_case_and_lowercase_keywords() {
        let sql = "create temp trigger t_log after insert on t begin\n\
                   insert into log(x) values (case when new.x > 0 then 'pos;' else 'neg' end);\n\
                   delete from log where x is null;\n\
                   end; select 2;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("delete from log where x is null;\nend"));
        assert_eq!(statements[1], "select 2");
    }

    #[test]
    fn test_begin_outside_trigger_still_splits() {
        let statements = split_statements("BEGIN; CREATE TABLE a (id INTEGER); END;").unwrap();
        assert_eq!(statements, vec!["BEGIN", "CREATE TABLE a (id INTEGER)", "END"]);

        // a column named like a keyword does not open a block
        let statements =
            split_statements("CREATE TABLE backend_events (id INTEGER); SELECT 1;").unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_backtick_and_bracket_identifiers() {
        let sql = "CREATE TABLE `odd;name` (id INTEGER); SELECT [a;b] FROM t; SELECT `x``;y`;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE `odd;name` (id INTEGER)",
                "SELECT [a;b] FROM t",
                "SELECT `x``;y`",
            ]
        );
    }

    #[test]
    fn test_unterminated_bracket_identifier() {
        assert_eq!(
            split_statements("SELECT 1;\nSELECT [broken FROM t;"),
            Err(StatementParseError::UnterminatedIdentifier { line: 2 })
        );
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        let sql = "INSERT INTO goals(name) VALUES ('Vacanze in città; €'); SELECT 1;";
        let statements = split_statements(sql).unwrap();
        assert_eq!(statements[0], "INSERT INTO goals(name) VALUES ('Vacanze in città; €')");
    }
}
