//! Lenient S-expression parser for KiCad files.
//!
//! Grammar:
//!   form   = '(' token (atom | string | form)* ')'
//!   token  = [^ whitespace ( )]*
//!   atom   = [^ whitespace ( ) "] [^ whitespace ( )]*
//!   string = '"' ( '\' any | [^"\\] )* '"'
//!
//! Parsing never fails. Stray closing parentheses are skipped, an unterminated
//! string runs to the end of input, and forms still open at the end of input
//! are closed implicitly.

use std::fmt;

/// One parenthesized form: a leading token, its literal values and its nested
/// forms, both in document order.
///
/// Cloning, comparing, formatting and dropping walk the tree with an explicit
/// stack, so they handle any depth `parse` produces.
#[derive(Eq, Default)]
pub struct Node {
    token: String,
    values: Vec<String>,
    children: Vec<Node>,
}

impl Node {
    fn new(token: String) -> Self {
        Self {
            token,
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The leading symbol of the form.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Literal atoms and strings that appear directly in this form.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Nested forms.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Get the nth value, if present.
    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Whether `value` appears among this node's values.
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Copy of token and values, without children.
    fn shallow_clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            values: self.values.clone(),
            children: Vec::with_capacity(self.children.len()),
        }
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        // (source, next child to copy, copy under construction)
        let mut stack = vec![(self, 0usize, self.shallow_clone())];
        while let Some((source, next, copy)) = stack.pop() {
            if let Some(child) = source.children.get(next) {
                stack.push((source, next + 1, copy));
                stack.push((child, 0, child.shallow_clone()));
                continue;
            }
            match stack.last_mut() {
                Some((_, _, parent)) => parent.children.push(copy),
                None => return copy,
            }
        }
        unreachable!("the root copy is returned when the stack empties")
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.token != b.token
                || a.values != b.values
                || a.children.len() != b.children.len()
            {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({self})")
    }
}

// Nested drops would otherwise recurse once per nesting level.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Step<'a> {
            Open(&'a Node),
            Close,
        }

        let mut steps = vec![Step::Open(self)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Close => write!(f, ")")?,
                Step::Open(node) => {
                    write!(f, "({}", node.token)?;
                    for value in &node.values {
                        write!(f, " ")?;
                        write_value(f, value)?;
                    }
                    steps.push(Step::Close);
                    for child in node.children.iter().rev() {
                        steps.push(Step::Open(child));
                    }
                }
            }
            if let Some(Step::Open(_)) = steps.last() {
                write!(f, " ")?;
            }
        }
        Ok(())
    }
}

/// Write a value bare when it re-parses as the same atom, quoted otherwise.
fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let bare = !value.is_empty()
        && !value.starts_with('"')
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '\\'));
    if bare {
        return f.write_str(value);
    }
    f.write_str("\"")?;
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    /// Read a maximal run of non-delimiter characters.
    fn parse_symbol(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.bump(c);
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_string(&mut self) -> String {
        // Skip opening quote
        self.pos += 1;
        let mut result = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.bump(c);
            if escaped {
                result.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return result;
            } else {
                result.push(c);
            }
        }
        result
    }

    fn parse(mut self) -> Vec<Node> {
        let mut roots = Vec::new();
        let mut stack: Vec<Node> = Vec::new();
        let mut stray_closes = 0usize;

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => self.bump(c),
                '(' => {
                    self.bump(c);
                    let token = self.parse_symbol();
                    stack.push(Node::new(token));
                }
                ')' => {
                    self.bump(c);
                    match stack.pop() {
                        Some(done) => match stack.last_mut() {
                            Some(parent) => parent.children.push(done),
                            None => roots.push(done),
                        },
                        None => stray_closes += 1,
                    }
                }
                '"' => {
                    let value = self.parse_string();
                    if let Some(open) = stack.last_mut() {
                        open.values.push(value);
                    }
                }
                _ => {
                    let value = self.parse_symbol();
                    if let Some(open) = stack.last_mut() {
                        open.values.push(value);
                    }
                }
            }
        }

        if stray_closes > 0 {
            log::debug!("skipped {stray_closes} unmatched ')'");
        }
        if !stack.is_empty() {
            log::debug!("closing {} unterminated form(s) at end of input", stack.len());
        }
        while let Some(done) = stack.pop() {
            match stack.last_mut() {
                Some(parent) => parent.children.push(done),
                None => roots.push(done),
            }
        }

        roots
    }
}

/// Parse S-expression text into its top-level forms.
pub fn parse(input: &str) -> Vec<Node> {
    Parser::new(input).parse()
}
