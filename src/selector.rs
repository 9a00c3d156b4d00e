use super::*;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Hash,
    Dot,
    LBracket,
    RBracket,
    Eq,
    PrefixEq,
    SuffixEq,
    SubstringEq,
    Colon,
    Whitespace,
    StringLiteral(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) offset: usize,
}

/// Lazy tokenizer over a selector string. Bytes past the first error are
/// never examined, so the parser can reject `:nth-child(...)` at the
/// pseudo-class name before the `(` is ever reached. A fresh lexer over the
/// same input yields the same sequence.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    in_brackets: bool,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            in_brackets: false,
            failed: false,
        }
    }

    fn fail(&mut self, err: Error) -> Option<Result<Token>> {
        self.failed = true;
        Some(Err(err))
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_char(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Ident(self.src[start..self.pos].to_string()),
            offset: start,
        }
    }

    fn lex_string_literal(&mut self) -> Option<Result<Token>> {
        let quote = self.bytes[self.pos];
        let start = self.pos;
        let mut i = self.pos + 1;
        while i < self.bytes.len() {
            if self.bytes[i] == b'\\' {
                i = (i + 2).min(self.bytes.len());
                continue;
            }
            if self.bytes[i] == quote {
                let raw = &self.src[start + 1..i];
                self.pos = i + 1;
                return Some(Ok(Token {
                    kind: TokenKind::StringLiteral(unescape_literal(raw)),
                    offset: start,
                }));
            }
            i += 1;
        }
        self.fail(Error::Parse {
            position: start,
            kind: ParseErrorKind::UnterminatedLiteral,
            fragment: self.src[start..].to_string(),
        })
    }

    fn single(&mut self, kind: TokenKind) -> Option<Result<Token>> {
        let token = Token {
            kind,
            offset: self.pos,
        };
        self.pos += 1;
        Some(Ok(token))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Result<Token>> {
        if self.failed {
            return None;
        }

        loop {
            if self.pos >= self.bytes.len() {
                return None;
            }

            let b = self.bytes[self.pos];

            if b.is_ascii_whitespace() {
                let start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                    self.pos += 1;
                }
                if self.in_brackets {
                    // Whitespace is insignificant inside an attribute test.
                    continue;
                }
                return Some(Ok(Token {
                    kind: TokenKind::Whitespace,
                    offset: start,
                }));
            }

            return match b {
                b'#' => self.single(TokenKind::Hash),
                b'.' => self.single(TokenKind::Dot),
                b':' => self.single(TokenKind::Colon),
                b'=' => self.single(TokenKind::Eq),
                b'[' => {
                    self.in_brackets = true;
                    self.single(TokenKind::LBracket)
                }
                b']' => {
                    self.in_brackets = false;
                    self.single(TokenKind::RBracket)
                }
                b'^' | b'$' | b'*' if self.bytes.get(self.pos + 1) == Some(&b'=') => {
                    let kind = match b {
                        b'^' => TokenKind::PrefixEq,
                        b'$' => TokenKind::SuffixEq,
                        _ => TokenKind::SubstringEq,
                    };
                    let token = Token {
                        kind,
                        offset: self.pos,
                    };
                    self.pos += 2;
                    Some(Ok(token))
                }
                b'>' | b'+' | b'~' if !self.in_brackets => self.fail(Error::Parse {
                    position: self.pos,
                    kind: ParseErrorKind::UnsupportedCombinator,
                    fragment: (b as char).to_string(),
                }),
                b'"' | b'\'' => self.lex_string_literal(),
                _ if is_ident_start_char(b) => Some(Ok(self.lex_ident())),
                _ => {
                    let ch = self.src[self.pos..].chars().next().unwrap_or('\u{FFFD}');
                    let offset = self.pos;
                    self.fail(Error::Lex { offset, ch })
                }
            };
        }
    }
}

// CSS identifier rules: letters, digits, `-`, `_`, not starting with a digit.
fn is_ident_start_char(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'-'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// One attribute test inside a compound, e.g. `[href^="http"]`. Substring
/// operators compare the attribute value's literal bytes, case-sensitive,
/// with no whitespace trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrTest {
    Exists { name: String },
    Equals { name: String, value: String },
    StartsWith { name: String, value: String },
    EndsWith { name: String, value: String },
    Contains { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    FirstChild,
    LastChild,
}

/// A single non-combinator query unit. The parser normalizes member order,
/// so `div.a#b` and `div#b.a` produce the same compound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub type_name: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attr_tests: Vec<AttrTest>,
    pub pseudo_classes: Vec<PseudoClass>,
}

/// A chain of compounds joined by the descendant combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub compounds: Vec<Compound>,
}

pub fn parse_selector(src: &str) -> Result<Selector> {
    let mut parser = Parser {
        src,
        lexer: Lexer::new(src),
        lookahead: None,
    };
    parser.parse_chain()
}

struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl Parser<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.lookahead.take() {
            return Ok(Some(token));
        }
        self.lexer.next().transpose()
    }

    fn peek(&mut self) -> Result<Option<&Token>> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next().transpose()?;
        }
        Ok(self.lookahead.as_ref())
    }

    fn unexpected(&self, offset: usize) -> Error {
        let offset = offset.min(self.src.len());
        Error::Parse {
            position: offset,
            kind: ParseErrorKind::UnexpectedToken,
            fragment: self.src[offset..].to_string(),
        }
    }

    fn at_compound_boundary(&mut self) -> Result<bool> {
        Ok(matches!(
            self.peek()?.map(|token| &token.kind),
            None | Some(TokenKind::Whitespace)
        ))
    }

    fn parse_chain(&mut self) -> Result<Selector> {
        let mut compounds = Vec::new();

        if matches!(
            self.peek()?.map(|token| &token.kind),
            Some(TokenKind::Whitespace)
        ) {
            self.next_token()?;
        }

        while self.peek()?.is_some() {
            compounds.push(self.parse_compound()?);
            match self.next_token()? {
                None => break,
                Some(Token {
                    kind: TokenKind::Whitespace,
                    ..
                }) => {}
                // parse_compound only stops at whitespace or end of input
                Some(_) => unreachable!(),
            }
        }

        if compounds.is_empty() {
            return Err(Error::Parse {
                position: 0,
                kind: ParseErrorKind::EmptyCompound,
                fragment: self.src.trim().to_string(),
            });
        }

        Ok(Selector { compounds })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut started = false;

        while !self.at_compound_boundary()? {
            let Some(token) = self.next_token()? else {
                unreachable!()
            };
            match token.kind {
                TokenKind::Ident(name) => {
                    // A bare type name is only valid as the first member.
                    if started {
                        return Err(self.unexpected(token.offset));
                    }
                    compound.type_name = Some(name);
                }
                TokenKind::Hash => {
                    let (id, _) = self.expect_ident()?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.unexpected(token.offset));
                    }
                }
                TokenKind::Dot => {
                    let (class_name, _) = self.expect_ident()?;
                    compound.classes.push(class_name);
                }
                TokenKind::Colon => {
                    let (name, offset) = self.expect_ident()?;
                    match name.as_str() {
                        "first-child" => compound.pseudo_classes.push(PseudoClass::FirstChild),
                        "last-child" => compound.pseudo_classes.push(PseudoClass::LastChild),
                        _ => {
                            return Err(Error::Parse {
                                position: offset,
                                kind: ParseErrorKind::UnsupportedPseudoClass,
                                fragment: name,
                            });
                        }
                    }
                }
                TokenKind::LBracket => {
                    compound.attr_tests.push(self.parse_attr_test()?);
                }
                _ => return Err(self.unexpected(token.offset)),
            }
            started = true;
        }

        Ok(compound)
    }

    fn expect_ident(&mut self) -> Result<(String, usize)> {
        match self.next_token()? {
            Some(Token {
                kind: TokenKind::Ident(name),
                offset,
            }) => Ok((name, offset)),
            Some(token) => Err(self.unexpected(token.offset)),
            None => Err(self.unexpected(self.src.len())),
        }
    }

    fn parse_attr_test(&mut self) -> Result<AttrTest> {
        let (name, _) = self.expect_ident()?;
        // HTML attribute names are case-insensitive; normalize here so the
        // matcher compares lowercased names directly.
        let name = name.to_ascii_lowercase();

        let op = match self.next_token()? {
            Some(Token {
                kind: TokenKind::RBracket,
                ..
            }) => return Ok(AttrTest::Exists { name }),
            Some(token) if is_attr_op(&token.kind) => token,
            Some(token) => return Err(self.unexpected(token.offset)),
            None => return Err(self.unexpected(self.src.len())),
        };

        let value = match self.next_token()? {
            Some(Token {
                kind: TokenKind::StringLiteral(value),
                ..
            }) => value,
            // Unquoted values are accepted too, e.g. [target=_blank].
            Some(Token {
                kind: TokenKind::Ident(value),
                ..
            }) => value,
            Some(token) => return Err(self.unexpected(token.offset)),
            None => return Err(self.unexpected(self.src.len())),
        };

        match self.next_token()? {
            Some(Token {
                kind: TokenKind::RBracket,
                ..
            }) => {}
            Some(token) => return Err(self.unexpected(token.offset)),
            None => return Err(self.unexpected(self.src.len())),
        }

        Ok(match op.kind {
            TokenKind::Eq => AttrTest::Equals { name, value },
            TokenKind::PrefixEq => AttrTest::StartsWith { name, value },
            TokenKind::SuffixEq => AttrTest::EndsWith { name, value },
            TokenKind::SubstringEq => AttrTest::Contains { name, value },
            _ => unreachable!(),
        })
    }
}

fn is_attr_op(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq | TokenKind::PrefixEq | TokenKind::SuffixEq | TokenKind::SubstringEq
    )
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, compound) in self.compounds.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(type_name) = &self.type_name {
            f.write_str(type_name)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class_name in &self.classes {
            write!(f, ".{class_name}")?;
        }
        for test in &self.attr_tests {
            write!(f, "{test}")?;
        }
        for pseudo in &self.pseudo_classes {
            write!(f, "{pseudo}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AttrTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists { name } => write!(f, "[{name}]"),
            Self::Equals { name, value } => write!(f, "[{name}=\"{}\"]", escape_literal(value)),
            Self::StartsWith { name, value } => {
                write!(f, "[{name}^=\"{}\"]", escape_literal(value))
            }
            Self::EndsWith { name, value } => write!(f, "[{name}$=\"{}\"]", escape_literal(value)),
            Self::Contains { name, value } => write!(f, "[{name}*=\"{}\"]", escape_literal(value)),
        }
    }
}

impl fmt::Display for PseudoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstChild => f.write_str(":first-child"),
            Self::LastChild => f.write_str(":last-child"),
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compound(selector: &Selector, index: usize) -> &Compound {
        &selector.compounds[index]
    }

    #[test]
    fn parses_compound_members_in_any_order() -> Result<()> {
        let left = parse_selector("div#main.wide.dark[role=nav]:first-child")?;
        let right = parse_selector("div.wide.dark#main[role=nav]:first-child")?;
        assert_eq!(left, right);

        let c = compound(&left, 0);
        assert_eq!(c.type_name.as_deref(), Some("div"));
        assert_eq!(c.id.as_deref(), Some("main"));
        assert_eq!(c.classes, vec!["wide".to_string(), "dark".to_string()]);
        assert_eq!(
            c.attr_tests,
            vec![AttrTest::Equals {
                name: "role".into(),
                value: "nav".into(),
            }]
        );
        assert_eq!(c.pseudo_classes, vec![PseudoClass::FirstChild]);
        Ok(())
    }

    #[test]
    fn whitespace_runs_collapse_into_one_descendant_combinator() -> Result<()> {
        let selector = parse_selector("  div \t  span.x  ")?;
        assert_eq!(selector.compounds.len(), 2);
        assert_eq!(compound(&selector, 0).type_name.as_deref(), Some("div"));
        assert_eq!(compound(&selector, 1).classes, vec!["x".to_string()]);
        Ok(())
    }

    #[test]
    fn attribute_operators_and_quoting_styles() -> Result<()> {
        let selector =
            parse_selector(r#"a[href][rel=nofollow][href^="http://"][href$='.org'][title*="a b"]"#)?;
        assert_eq!(
            compound(&selector, 0).attr_tests,
            vec![
                AttrTest::Exists {
                    name: "href".into()
                },
                AttrTest::Equals {
                    name: "rel".into(),
                    value: "nofollow".into(),
                },
                AttrTest::StartsWith {
                    name: "href".into(),
                    value: "http://".into(),
                },
                AttrTest::EndsWith {
                    name: "href".into(),
                    value: ".org".into(),
                },
                AttrTest::Contains {
                    name: "title".into(),
                    value: "a b".into(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn attribute_name_is_lowercased_and_spaces_are_insignificant() -> Result<()> {
        let selector = parse_selector(r#"[ DATA-Kind = "primary" ]"#)?;
        assert_eq!(
            compound(&selector, 0).attr_tests,
            vec![AttrTest::Equals {
                name: "data-kind".into(),
                value: "primary".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn child_combinator_is_rejected_as_unsupported() {
        let err = parse_selector("div > p").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                position: 4,
                kind: ParseErrorKind::UnsupportedCombinator,
                fragment: ">".into(),
            }
        );
    }

    #[test]
    fn sibling_combinators_are_rejected_as_unsupported() {
        for (selector, position) in [("a + b", 2), ("a ~ b", 2)] {
            let err = parse_selector(selector).unwrap_err();
            assert!(matches!(
                err,
                Error::Parse {
                    kind: ParseErrorKind::UnsupportedCombinator,
                    position: p,
                    ..
                } if p == position
            ));
        }
    }

    #[test]
    fn known_but_unsupported_pseudo_class_is_typed_distinctly() {
        let err = parse_selector("div:nth-child(2)").unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                position: 4,
                kind: ParseErrorKind::UnsupportedPseudoClass,
                fragment: "nth-child".into(),
            }
        );
    }

    #[test]
    fn empty_and_whitespace_selectors_are_empty_compounds() {
        for src in ["", "   ", "\t"] {
            let err = parse_selector(src).unwrap_err();
            assert!(matches!(
                err,
                Error::Parse {
                    kind: ParseErrorKind::EmptyCompound,
                    ..
                }
            ));
        }
    }

    #[test]
    fn unterminated_literal_points_at_the_opening_quote() {
        let err = parse_selector(r#"a[href="x"#).unwrap_err();
        assert_eq!(
            err,
            Error::Parse {
                position: 7,
                kind: ParseErrorKind::UnterminatedLiteral,
                fragment: "\"x".into(),
            }
        );
    }

    #[test]
    fn invalid_characters_are_lexical_errors() {
        let err = parse_selector("div:nth-child(2").unwrap_err();
        // the pseudo-class name fails first; a bare paren elsewhere is lexical
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::UnsupportedPseudoClass,
                ..
            }
        ));

        let err = parse_selector("(div)").unwrap_err();
        assert_eq!(err, Error::Lex { offset: 0, ch: '(' });

        let err = parse_selector("div{}").unwrap_err();
        assert_eq!(err, Error::Lex { offset: 3, ch: '{' });
    }

    #[test]
    fn idents_cannot_start_with_a_digit() {
        let err = parse_selector(".2col").unwrap_err();
        assert_eq!(err, Error::Lex { offset: 1, ch: '2' });
    }

    #[test]
    fn trailing_garbage_after_attr_test_is_unexpected() {
        let err = parse_selector("a[href=]").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse {
                kind: ParseErrorKind::UnexpectedToken,
                ..
            }
        ));
    }

    #[test]
    fn lexer_is_restartable() {
        let src = r#"div.a [href^="x"] :first-child"#;
        let first = Lexer::new(src).collect::<Vec<_>>();
        let second = Lexer::new(src).collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn canonical_form_round_trips() -> Result<()> {
        for src in [
            "div",
            "li.b",
            "div#main.wide[role=\"nav\"]:first-child",
            "ul li:last-child",
            "a[href^=\"http://x\"]",
            "div p span.deep#one[data-x$=\"9\"]",
        ] {
            let parsed = parse_selector(src)?;
            let rendered = parsed.to_string();
            assert_eq!(parse_selector(&rendered)?, parsed, "for {src:?}");
        }
        Ok(())
    }
}
