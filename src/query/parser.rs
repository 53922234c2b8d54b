//! Compiler for the path query syntax
//!
//! ```text
//! query     := ['/' | '//' | './' | './/'] step (('/' | '//') step)*
//! step      := name [ '[' predicate ']' ]
//! predicate := term ( 'and' term )*
//! term      := '@' name [ '=' literal ] | name [ '=' literal ]
//! ```

use super::{Axis, PathQuery, Step, Term};
use crate::domain::violations::{GuardianError, GuardianResult};

pub(super) fn parse(source: &str) -> GuardianResult<PathQuery> {
    let mut cursor = Cursor { source, pos: 0 };
    cursor.skip_whitespace();
    if cursor.is_at_end() {
        return Err(GuardianError::query("empty query", cursor.pos));
    }

    let (absolute, mut axis) = if cursor.eat("//") {
        (true, Axis::Descendant)
    } else if cursor.eat("/") {
        (true, Axis::Child)
    } else if cursor.eat(".//") {
        (false, Axis::Descendant)
    } else if cursor.eat("./") {
        (false, Axis::Child)
    } else {
        (false, Axis::Child)
    };

    let mut steps = Vec::new();
    loop {
        cursor.skip_whitespace();
        steps.push(parse_step(&mut cursor, axis)?);
        cursor.skip_whitespace();

        if cursor.is_at_end() {
            break;
        }
        axis = if cursor.eat("//") {
            Axis::Descendant
        } else if cursor.eat("/") {
            Axis::Child
        } else {
            return Err(cursor.unexpected("'/' or end of query"));
        };
    }

    let query = PathQuery { absolute, steps };
    tracing::debug!(
        "Compiled path query '{}' into {} steps",
        source,
        query.steps.len()
    );
    Ok(query)
}

fn parse_step(cursor: &mut Cursor<'_>, axis: Axis) -> GuardianResult<Step> {
    let name = cursor.name("an element name")?;
    let mut step = Step {
        axis,
        name,
        predicates: Vec::new(),
    };

    cursor.skip_whitespace();
    if !cursor.eat("[") {
        return Ok(step);
    }

    loop {
        cursor.skip_whitespace();
        step.predicates.push(parse_term(cursor)?);
        cursor.skip_whitespace();

        if cursor.eat("]") {
            return Ok(step);
        }
        if cursor.eat_keyword("and") {
            continue;
        }
        if cursor.is_at_end() {
            return Err(GuardianError::query(
                "unterminated predicate, expected ']'",
                cursor.pos,
            ));
        }
        return Err(cursor.unexpected("'and' or ']'"));
    }
}

fn parse_term(cursor: &mut Cursor<'_>) -> GuardianResult<Term> {
    let is_attribute = cursor.eat("@");
    let expected = if is_attribute {
        "an attribute name"
    } else {
        "a name"
    };
    let name = cursor.name(expected)?;

    cursor.skip_whitespace();
    let value = if cursor.eat("=") {
        cursor.skip_whitespace();
        Some(cursor.literal()?)
    } else {
        None
    };

    let term = if is_attribute {
        Term::Attribute { name, value }
    } else {
        Term::Child { name, value }
    };
    Ok(term)
}

struct Cursor<'s> {
    source: &'s str,
    pos: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Like `eat`, but the keyword must not run into a following name character
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let matched = match self.rest().strip_prefix(keyword) {
            Some(after) => !after.chars().next().is_some_and(is_name_char),
            None => false,
        };
        if matched {
            self.pos += keyword.len();
        }
        matched
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn name(&mut self, expected: &str) -> GuardianResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_name_start(c) => self.pos += c.len_utf8(),
            _ => return Err(self.unexpected(expected)),
        }
        while let Some(c) = self.peek().filter(|c| is_name_char(*c)) {
            self.pos += c.len_utf8();
        }
        Ok(self.source[start..self.pos].to_string())
    }

    fn literal(&mut self) -> GuardianResult<String> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.unexpected("a quoted literal")),
        };
        self.pos += 1;

        match self.rest().find(quote) {
            Some(len) => {
                let value = self.rest()[..len].to_string();
                self.pos += len + 1;
                Ok(value)
            }
            None => Err(GuardianError::query("unterminated literal", start)),
        }
    }

    fn unexpected(&self, expected: &str) -> GuardianError {
        let found = match self.peek() {
            Some(found) => format!("'{found}'"),
            None => "end of query".to_string(),
        };
        GuardianError::query(format!("expected {expected}, found {found}"), self.pos)
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}
