// A minimal lisp-like S-expression reader.
//
// The core only consumes a tree of `Node` values (atom or list, each
// carrying a source location) -- the parser is an external
// collaborator, not part of the language core. This module is the
// concrete reader this crate uses for its own tests and examples; a
// host embedding this library is free to hand `compile()` a `Node`
// tree built by its own front-end.
//
// Lexing follows a hand-rolled `decode_word`-style approach: classify
// whitespace-separated words with a couple of `regex` patterns rather
// than pulling in a full lexer/grammar crate.

use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ParseError;
use crate::loc::SourceLoc;

lazy_static! {
    static ref INT_RE: Regex = Regex::new(r"^-?[0-9]+$").unwrap();
    static ref UINT_RE: Regex = Regex::new(r"^[0-9]+u$").unwrap();
    static ref FLOAT_RE: Regex = Regex::new(r"^-?[0-9]+\.[0-9]*$").unwrap();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Name(String),
    Int(i64),
    UInt(u32),
    Float(f64),
    Str(String),
    Bool(bool),
    NullPtr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Atom(Atom, SourceLoc),
    List(Vec<Node>, SourceLoc),
}

impl Node {
    pub fn loc(&self) -> &SourceLoc {
        match self {
            Node::Atom(_, at) => at,
            Node::List(_, at) => at,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Node::Atom(Atom::Name(n), _) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items, _) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn expect_list(&self) -> Result<&[Node], ParseError> {
        self.as_list().ok_or_else(|| ParseError::new(self.loc().clone(), "expected a list"))
    }

    pub fn expect_name(&self) -> Result<&str, ParseError> {
        self.as_name().ok_or_else(|| ParseError::new(self.loc().clone(), "expected a name"))
    }

    // The first element of a `(head ...)` list, as plain text, used to
    // dispatch on the recognized heads in builder.rs.
    pub fn head(&self) -> Option<&str> {
        self.as_list().and_then(|items| items.first()).and_then(|n| n.as_name())
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    file: Rc<str>,
    line: u32,
    column: u32,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str, file: Rc<str>) -> Reader<'a> {
        Reader { chars: src.chars().peekable(), file, line: 1, column: 1 }
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file.clone(), self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while !matches!(self.chars.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn read_node(&mut self) -> Result<Option<Node>, ParseError> {
        self.skip_trivia();
        let at = self.loc();
        match self.chars.peek() {
            None => Ok(None),
            Some('(') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    if self.chars.peek() == Some(&')') {
                        self.bump();
                        return Ok(Some(Node::List(items, at)));
                    }
                    match self.read_node()? {
                        Some(n) => items.push(n),
                        None => return Err(ParseError::new(at, "unterminated list")),
                    }
                }
            }
            Some(')') => Err(ParseError::new(at, "unexpected ')'")),
            Some('"') => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => return Err(ParseError::new(at, "unterminated string literal")),
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(c) => s.push(c),
                            None => return Err(ParseError::new(at, "unterminated escape")),
                        },
                        Some(c) => s.push(c),
                    }
                }
                Ok(Some(Node::Atom(Atom::Str(s), at)))
            }
            Some(_) => {
                let mut word = String::new();
                loop {
                    match self.chars.peek() {
                        Some(c) if !c.is_whitespace() && *c != '(' && *c != ')' => {
                            word.push(*c);
                            self.bump();
                        }
                        _ => break,
                    }
                }
                Ok(Some(Node::Atom(classify(&word), at)))
            }
        }
    }
}

fn classify(word: &str) -> Atom {
    if word == "true" {
        Atom::Bool(true)
    } else if word == "false" {
        Atom::Bool(false)
    } else if word == "null" {
        Atom::NullPtr
    } else if UINT_RE.is_match(word) {
        Atom::UInt(word[..word.len() - 1].parse().unwrap_or(0))
    } else if INT_RE.is_match(word) {
        Atom::Int(word.parse().unwrap_or(0))
    } else if FLOAT_RE.is_match(word) {
        Atom::Float(word.parse().unwrap_or(0.0))
    } else {
        Atom::Name(word.to_string())
    }
}

// Read every top-level form in `src` and wrap them in an implicit
// `(program ...)` list so builder.rs always has a single root Node.
pub fn read_program(src: &str, file: impl Into<Rc<str>>) -> Result<Node, ParseError> {
    let file = file.into();
    let mut reader = Reader::new(src, file.clone());
    let at = SourceLoc::new(file, 1, 1);
    let mut forms = Vec::new();
    while let Some(node) = reader.read_node()? {
        forms.push(node);
    }
    Ok(Node::List(forms, at))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(src: &str) -> Node {
        read_program(src, "test").unwrap()
    }

    #[test]
    fn reads_atoms() {
        let prog = read("42 42.0 \"hi\" foo true false null");
        let items = prog.as_list().unwrap();
        assert_eq!(items[0], Node::Atom(Atom::Int(42), items[0].loc().clone()));
        assert_eq!(items[1], Node::Atom(Atom::Float(42.0), items[1].loc().clone()));
        assert_eq!(items[2], Node::Atom(Atom::Str("hi".into()), items[2].loc().clone()));
        assert_eq!(items[3], Node::Atom(Atom::Name("foo".into()), items[3].loc().clone()));
        assert_eq!(items[4], Node::Atom(Atom::Bool(true), items[4].loc().clone()));
        assert_eq!(items[5], Node::Atom(Atom::Bool(false), items[5].loc().clone()));
        assert_eq!(items[6], Node::Atom(Atom::NullPtr, items[6].loc().clone()));
    }

    #[test]
    fn reads_nested_lists() {
        let prog = read("(defun (int add) (int a) (int b) (return (+ a b)))");
        let items = prog.as_list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].head(), Some("defun"));
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(read_program("(foo", "test").is_err());
    }
}
