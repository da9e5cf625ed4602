use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::principal::{DeferredPrincipal, Principal, ROLE_PREFIX};
use crate::request::Request;

use super::AuthorizationManager;

/// Evaluates an access expression such as
/// `hasRole('ADMIN') or (isAuthenticated() and not hasAuthority('banned'))`.
///
/// | Function                      | Grants when                              |
/// |-------------------------------|------------------------------------------|
/// | `permitAll`                   | always                                   |
/// | `denyAll`                     | never                                    |
/// | `isAuthenticated()`           | the principal is not anonymous           |
/// | `isAnonymous()`               | the principal is anonymous               |
/// | `hasRole('R')`                | the principal holds `ROLE_R`             |
/// | `hasAnyRole('A', 'B')`        | the principal holds any of the roles     |
/// | `hasAuthority('a')`           | the principal holds `a`                  |
/// | `hasAnyAuthority('a', 'b')`   | the principal holds any of them          |
///
/// Operators are `and`/`&&`, `or`/`||`, `not`/`!` (keywords are
/// case-insensitive) and parentheses; `not` binds tightest, then `and`,
/// then `or`. Evaluation short-circuits left to right, and the principal
/// is only resolved when a function needs it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use http::Method;
/// use request_authz::{AuthorizationManager, DeferredPrincipal, Principal, Request};
/// use request_authz::ExpressionAuthorizationManager;
///
/// let manager = ExpressionAuthorizationManager::parse("hasRole('ADMIN') or hasAuthority('ops')").unwrap();
/// let ops = DeferredPrincipal::ready(Some(Arc::new(Principal::new("o").with_authority("ops"))));
///
/// let decision = manager.check(&ops, &Request::new(Method::GET, "/")).unwrap().unwrap();
/// assert!(decision.is_granted());
/// assert!(ExpressionAuthorizationManager::parse("hasRole('ADMIN'").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionAuthorizationManager {
    source: String,
    root: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Constant(bool),
    Authenticated,
    Anonymous,
    AnyAuthority(Vec<String>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// Deepest allowed nesting of `not` and parentheses.
const MAX_NESTING: usize = 64;

impl ExpressionAuthorizationManager {
    /// Parses `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed expressions, unknown
    /// functions, wrong argument counts and prefixed role names.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
            source,
        };
        let root = parser.or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format_args!("unexpected {token}")));
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// The expression text.
    pub fn expression(&self) -> &str {
        &self.source
    }
}

impl FromStr for ExpressionAuthorizationManager {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ExpressionAuthorizationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl AuthorizationManager for ExpressionAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        _request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let granted = self.root.evaluate(principal)?;
        Ok(Some(
            AuthorizationDecision::new(granted).with_reason(self.source.clone()),
        ))
    }
}

impl Expr {
    fn evaluate(&self, principal: &DeferredPrincipal<'_>) -> Result<bool, Error> {
        let with = |f: fn(&Principal) -> bool| principal.get().map(f);
        match self {
            Expr::Constant(value) => Ok(*value),
            Expr::Authenticated => with(|p| !p.is_anonymous()),
            Expr::Anonymous => with(Principal::is_anonymous),
            Expr::AnyAuthority(authorities) => {
                let p = principal.get()?;
                Ok(authorities.iter().any(|a| p.has_authority(a)))
            }
            Expr::Not(inner) => Ok(!inner.evaluate(principal)?),
            Expr::And(terms) => {
                for term in terms {
                    if !term.evaluate(principal)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(terms) => {
                for term in terms {
                    if term.evaluate(principal)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn join(mut terms: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            combine(terms)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Str(value) => write!(f, "string '{value}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::And => write!(f, "'and'"),
            Token::Or => write!(f, "'or'"),
            Token::Not => write!(f, "'not'"),
        }
    }
}

fn lex(source: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = source.char_indices().peekable();
    let invalid = |detail: String| {
        Error::Configuration(format!("invalid access expression '{source}': {detail}"))
    };

    while let Some((at, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '!' => tokens.push(Token::Not),
            '&' | '|' => {
                if chars.next_if(|&(_, next)| next == c).is_none() {
                    return Err(invalid(format!("expected '{c}{c}' at offset {at}")));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '\'' | '"' => {
                let mut value = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == c {
                        closed = true;
                        break;
                    }
                    value.push(next);
                }
                if !closed {
                    return Err(invalid(format!("unterminated string at offset {at}")));
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some((_, next)) =
                    chars.next_if(|&(_, next)| next.is_ascii_alphanumeric() || next == '_')
                {
                    ident.push(next);
                }
                tokens.push(match ident.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(invalid(format!(
                    "unexpected character '{other}' at offset {at}"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'s> {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    source: &'s str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), Error> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format_args!("expected {expected}, found {token}"))),
            None => Err(self.error(format_args!("expected {expected}, found end of input"))),
        }
    }

    fn error(&self, detail: fmt::Arguments<'_>) -> Error {
        Error::Configuration(format!(
            "invalid access expression '{}': {detail}",
            self.source
        ))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format_args!(
                "nested deeper than {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> Result<Expr, Error> {
        let mut terms = vec![self.and()?];
        while self.eat(&Token::Or) {
            terms.push(self.and()?);
        }
        Ok(Expr::join(terms, Expr::Or))
    }

    fn and(&mut self) -> Result<Expr, Error> {
        let mut terms = vec![self.unary()?];
        while self.eat(&Token::And) {
            terms.push(self.unary()?);
        }
        Ok(Expr::join(terms, Expr::And))
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                let args = if self.eat(&Token::LParen) {
                    Some(self.arguments()?)
                } else {
                    None
                };
                self.function(&name, args)
            }
            Some(token) => Err(self.error(format_args!("unexpected {token}"))),
            None => Err(self.error(format_args!("unexpected end of input"))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<String>, Error> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            match self.next() {
                Some(Token::Str(value)) => args.push(value),
                Some(token) => {
                    return Err(
                        self.error(format_args!("expected a quoted argument, found {token}"))
                    )
                }
                None => return Err(self.error(format_args!("unclosed argument list"))),
            }
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn function(&self, name: &str, args: Option<Vec<String>>) -> Result<Expr, Error> {
        let nullary = |expr: Expr| match &args {
            Some(args) if !args.is_empty() => {
                Err(self.error(format_args!("{name} takes no arguments")))
            }
            _ => Ok(expr),
        };
        match name {
            "permitAll" => nullary(Expr::Constant(true)),
            "denyAll" => nullary(Expr::Constant(false)),
            "isAuthenticated" => nullary(Expr::Authenticated),
            "isAnonymous" => nullary(Expr::Anonymous),
            "hasRole" | "hasAnyRole" | "hasAuthority" | "hasAnyAuthority" => {
                let args = args.unwrap_or_default();
                let single = matches!(name, "hasRole" | "hasAuthority");
                if args.is_empty() || (single && args.len() != 1) {
                    let expected = if single { "exactly one" } else { "at least one" };
                    return Err(self.error(format_args!("{name} takes {expected} argument")));
                }
                if args.iter().any(String::is_empty) {
                    return Err(self.error(format_args!("{name} arguments cannot be empty")));
                }
                if !name.contains("Role") {
                    return Ok(Expr::AnyAuthority(args));
                }
                args.into_iter()
                    .map(|role| {
                        if role.starts_with(ROLE_PREFIX) {
                            Err(self.error(format_args!(
                                "role '{role}' should not start with '{ROLE_PREFIX}'"
                            )))
                        } else {
                            Ok(format!("{ROLE_PREFIX}{role}"))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Expr::AnyAuthority)
            }
            _ => Err(self.error(format_args!("unknown function '{name}'"))),
        }
    }
}
