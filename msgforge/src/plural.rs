//! Plural-forms rules as written in catalog headers.
//!
//! A rule looks like `nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : 1);` and is
//! evaluated with C semantics over unsigned integers. The expression language
//! covers `?:`, `||`, `&&`, `==`, `!=`, `<`, `>`, `<=`, `>=`, `+`, `-`, `*`, `/`,
//! `%`, `!` and parentheses over the variable `n` and integer literals.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use unic_langid::LanguageIdentifier;

use crate::{error::Error, types::Header};

/// Rule used when a catalog declares none: `n == 1 ? 0 : 1`.
pub const DEFAULT_PLURAL_FORMS: &str = "nplurals=2; plural=(n != 1);";

lazy_static! {
    static ref PLURAL_FORMS: Regex =
        Regex::new(r"^\s*nplurals\s*=\s*(\d+)\s*;\s*plural\s*=\s*(.+?)\s*;?\s*$").unwrap();

    /// Static mapping from base language subtag → gettext plural rule.
    static ref RULE_TABLE: BTreeMap<&'static str, &'static str> = {
        let mut m: BTreeMap<&'static str, &'static str> = BTreeMap::new();

        // One/other, singular only for exactly one
        for code in [
            "en","de","nl","sv","da","nb","nn","no","is","fi","et","fa","hi","bn","gu",
            "ta","te","kn","ml","mr","it","es","pt","mk","el","eu","gl","af","sw","ur",
            "hu","bg","ca","he","iw","tr"
        ] {
            m.insert(code, DEFAULT_PLURAL_FORMS);
        }

        // Zero counts as singular
        for code in ["fr","fil","tl","hy","kab","oc"] {
            m.insert(code, "nplurals=2; plural=(n > 1);");
        }

        // No plural distinction
        for code in ["ja","zh","ko","th","vi","km","lo","my","yue","id","ms"] {
            m.insert(code, "nplurals=1; plural=0;");
        }

        // Slavic (Russian group)
        for code in ["ru","uk","be","sr","hr","bs","sh"] {
            m.insert(
                code,
                "nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);",
            );
        }

        m.insert(
            "pl",
            "nplurals=3; plural=(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);",
        );

        for code in ["cs","sk"] {
            m.insert(code, "nplurals=3; plural=(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2;");
        }

        m.insert(
            "sl",
            "nplurals=4; plural=(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3);",
        );
        m.insert(
            "lt",
            "nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2);",
        );
        m.insert(
            "lv",
            "nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : n != 0 ? 1 : 2);",
        );
        m.insert(
            "ga",
            "nplurals=5; plural=(n==1 ? 0 : n==2 ? 1 : n<7 ? 2 : n<11 ? 3 : 4);",
        );
        m.insert(
            "ro",
            "nplurals=3; plural=(n==1 ? 0 : (n==0 || (n%100>0 && n%100<20)) ? 1 : 2);",
        );
        m.insert(
            "ar",
            "nplurals=6; plural=(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5);",
        );

        m
    };
}

/// Returns the conventional `Plural-Forms` value for a locale tag.
///
/// Accepts underscores (`pt_BR`) as well as hyphens. Unknown languages get
/// [`DEFAULT_PLURAL_FORMS`].
pub fn default_plural_forms(locale: &str) -> &'static str {
    let normalized = locale.replace('_', "-");
    let Ok(lang) = normalized.parse::<LanguageIdentifier>() else {
        return DEFAULT_PLURAL_FORMS;
    };
    if lang.language.as_str() == "pt" && lang.region.is_some_and(|r| r.as_str() == "BR") {
        return "nplurals=2; plural=(n > 1);";
    }
    RULE_TABLE
        .get(lang.language.as_str())
        .copied()
        .unwrap_or(DEFAULT_PLURAL_FORMS)
}

/// A parsed plural-forms rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralRule {
    nplurals: usize,
    expr: Expr,
}

impl Default for PluralRule {
    fn default() -> Self {
        PluralRule {
            nplurals: 2,
            expr: Expr::Binary(
                BinaryOp::Ne,
                Box::new(Expr::N),
                Box::new(Expr::Literal(1)),
            ),
        }
    }
}

impl PluralRule {
    /// Parses a `Plural-Forms` header value.
    pub fn parse(forms: &str) -> Result<Self, Error> {
        let caps = PLURAL_FORMS
            .captures(forms)
            .ok_or_else(|| Error::parse("plural-forms", forms, "expected `nplurals=N; plural=EXPR;`"))?;
        let nplurals: usize = caps[1]
            .parse()
            .map_err(|_| Error::parse("plural-forms", forms, "nplurals is out of range"))?;
        if nplurals == 0 {
            return Err(Error::parse("plural-forms", forms, "nplurals must be at least 1"));
        }
        let expr = ExprParser::new(&caps[2]).parse()?;
        Ok(PluralRule { nplurals, expr })
    }

    /// Rule declared by a catalog header, or the default rule.
    ///
    /// A malformed declaration is logged and replaced by the default rule.
    pub fn from_header(header: &Header) -> Self {
        match header.plural_forms() {
            Some(forms) => PluralRule::parse(forms).unwrap_or_else(|e| {
                tracing::warn!(%e, "ignoring malformed Plural-Forms header");
                PluralRule::default()
            }),
            None => PluralRule::default(),
        }
    }

    pub fn nplurals(&self) -> usize {
        self.nplurals
    }

    /// Form index for a count. May exceed `nplurals - 1` for a sloppy rule;
    /// callers clamp against the forms they actually hold.
    pub fn index(&self, n: u64) -> usize {
        usize::try_from(self.expr.eval(n)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    N,
    Literal(u64),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, n: u64) -> u64 {
        match self {
            Expr::N => n,
            Expr::Literal(value) => *value,
            Expr::Not(inner) => u64::from(inner.eval(n) == 0),
            Expr::Neg(inner) => inner.eval(n).wrapping_neg(),
            Expr::Ternary(cond, then, otherwise) => {
                if cond.eval(n) != 0 {
                    then.eval(n)
                } else {
                    otherwise.eval(n)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                u64::from(lhs.eval(n) != 0 || rhs.eval(n) != 0)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                u64::from(lhs.eval(n) != 0 && rhs.eval(n) != 0)
            }
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(n), rhs.eval(n));
                match op {
                    BinaryOp::Eq => u64::from(a == b),
                    BinaryOp::Ne => u64::from(a != b),
                    BinaryOp::Lt => u64::from(a < b),
                    BinaryOp::Gt => u64::from(a > b),
                    BinaryOp::Le => u64::from(a <= b),
                    BinaryOp::Ge => u64::from(a >= b),
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div => a.checked_div(b).unwrap_or(0),
                    BinaryOp::Rem => a.checked_rem(b).unwrap_or(0),
                    BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    N,
    Number(u64),
    Op(&'static str),
    Open,
    Close,
    Question,
    Colon,
}

/// Recursive-descent parser following C precedence.
struct ExprParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    error: Option<String>,
}

/// Longest accepted expression, in tokens. Bounds the depth of the tree that
/// evaluation walks recursively.
const MAX_TOKENS: usize = 512;
/// Deepest accepted nesting of parentheses, conditionals and unary operators.
const MAX_DEPTH: usize = 64;

const OPERATORS: [&str; 16] = [
    "||", "&&", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "!", "(", ")",
];

impl<'a> ExprParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut tokens = Vec::new();
        let mut error = None;
        let mut rest = source.trim_start();
        while !rest.is_empty() {
            let c = rest.chars().next().unwrap_or(' ');
            if c == 'n' {
                tokens.push(Token::N);
                rest = &rest[1..];
            } else if c.is_ascii_digit() {
                let end = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
                match rest[..end].parse() {
                    Ok(value) => tokens.push(Token::Number(value)),
                    Err(_) => {
                        error = Some(format!("number out of range: {}", &rest[..end]));
                        break;
                    }
                }
                rest = &rest[end..];
            } else if c == '?' {
                tokens.push(Token::Question);
                rest = &rest[1..];
            } else if c == ':' {
                tokens.push(Token::Colon);
                rest = &rest[1..];
            } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                tokens.push(match *op {
                    "(" => Token::Open,
                    ")" => Token::Close,
                    other => Token::Op(other),
                });
                rest = &rest[op.len()..];
            } else {
                error = Some(format!("unexpected character `{}`", c));
                break;
            }
            rest = rest.trim_start();
        }
        if error.is_none() && tokens.len() > MAX_TOKENS {
            error = Some(format!("expression is longer than {} tokens", MAX_TOKENS));
        }
        ExprParser {
            source,
            tokens,
            pos: 0,
            depth: 0,
            error,
        }
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::parse("plural-forms", self.source, message)
    }

    fn parse(mut self) -> Result<Expr, Error> {
        if let Some(message) = self.error.take() {
            return Err(self.fail(message));
        }
        let expr = self.ternary()?;
        if self.pos != self.tokens.len() {
            return Err(self.fail("trailing tokens after expression"));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(&op) => {
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth == MAX_DEPTH {
            return Err(self.fail(format!("expression nests deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn ternary(&mut self) -> Result<Expr, Error> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, Error> {
        let cond = self.binary(0)?;
        if self.peek() != Some(Token::Question) {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.ternary()?;
        if self.peek() != Some(Token::Colon) {
            return Err(self.fail("expected `:` in conditional"));
        }
        self.pos += 1;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    /// Binary levels from loosest to tightest binding.
    const LEVELS: [&'static [&'static str]; 6] = [
        &["||"],
        &["&&"],
        &["==", "!="],
        &["<", ">", "<=", ">="],
        &["+", "-"],
        &["*", "/", "%"],
    ];

    fn binary(&mut self, level: usize) -> Result<Expr, Error> {
        if level == Self::LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = self.eat_op(Self::LEVELS[level]) {
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary(binary_op(op), Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        match self.eat_op(&["!", "-"]) {
            Some("!") => Ok(Expr::Not(Box::new(self.nested(Self::unary)?))),
            Some(_) => Ok(Expr::Neg(Box::new(self.nested(Self::unary)?))),
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let token = self.peek();
        self.pos += 1;
        match token {
            Some(Token::N) => Ok(Expr::N),
            Some(Token::Number(value)) => Ok(Expr::Literal(value)),
            Some(Token::Open) => {
                let inner = self.ternary()?;
                if self.peek() != Some(Token::Close) {
                    return Err(self.fail("expected `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(other) => Err(self.fail(format!("unexpected token {:?}", other))),
            None => Err(self.fail("unexpected end of expression")),
        }
    }
}

fn binary_op(op: &str) -> BinaryOp {
    match op {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => BinaryOp::Rem,
    }
}
