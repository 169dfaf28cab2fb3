// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bean lookup name lexer and parser.
//!
//! Grammar of a lookup name:
//!
//! ```text
//! name      := scheme ':' scope '/' class ( '/' interface )?
//! scope     := 'app' | 'global/' WORD
//! interface := 'local' | 'remote'
//! class     := WORD
//! ```
//!
//! e.g. `php:app/UserProcessor/local` or `php:global/example/UserProcessor/remote`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{NamingError, Result};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<global>global/\w+)|(?P<colon>:)|(?P<slash>/)|(?P<word>\w+))")
        .expect("lookup token pattern is valid")
});

/// Lexical token of a lookup name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// The scheme marker.
    Scheme(String),
    /// `global/<application>`.
    Global(String),
    /// `app`, the current application.
    App,
    /// `:`
    Colon,
    /// `/`
    Slash,
    /// `local` or `remote`.
    Interface(String),
    /// Any other word.
    ClassName(String),
}

impl Token {
    /// Word text of a word-like token.
    fn word(&self) -> Option<&str> {
        match self {
            Token::Scheme(w) | Token::Interface(w) | Token::ClassName(w) => Some(w),
            Token::App => Some("app"),
            _ => None,
        }
    }
}

/// Application scope of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The application performing the lookup.
    App,
    /// A named application.
    Global(String),
}

/// A parsed lookup name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupName {
    /// Application scope.
    pub scope: Scope,
    /// Bean class name.
    pub class_name: String,
    /// Interface marker, if given.
    pub interface: Option<String>,
}

/// Split a lookup name into tokens.
pub fn tokenize(name: &str, scheme: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = name;

    while !rest.is_empty() {
        let Some(caps) = TOKEN.captures(rest) else {
            return Err(malformed(
                name,
                format!("unexpected character at offset {}", name.len() - rest.len()),
            ));
        };

        let token = if let Some(global) = caps.name("global") {
            Token::Global(global.as_str()["global/".len()..].to_string())
        } else if caps.name("colon").is_some() {
            Token::Colon
        } else if caps.name("slash").is_some() {
            Token::Slash
        } else {
            let word = caps.name("word").map(|m| m.as_str()).unwrap_or_default();
            match word {
                w if w == scheme && tokens.is_empty() => Token::Scheme(w.to_string()),
                "app" => Token::App,
                "local" | "remote" => Token::Interface(word.to_string()),
                _ => Token::ClassName(word.to_string()),
            }
        };

        let consumed = caps.get(0).map(|m| m.end()).unwrap_or(rest.len());
        rest = &rest[consumed..];
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parse a lookup name.
pub fn parse(name: &str, scheme: &str) -> Result<LookupName> {
    let tokens = tokenize(name, scheme)?;
    let mut iter = tokens.into_iter();

    match (iter.next(), iter.next()) {
        (Some(Token::Scheme(_)), Some(Token::Colon)) => {}
        _ => return Err(malformed(name, format!("expected '{}:' prefix", scheme))),
    }

    let scope = match iter.next() {
        Some(Token::App) => Scope::App,
        Some(Token::Global(application)) => Scope::Global(application),
        _ => return Err(malformed(name, "expected 'app' or 'global/<name>' scope")),
    };

    if iter.next() != Some(Token::Slash) {
        return Err(malformed(name, "expected '/' after scope"));
    }

    let class_name = match iter.next().as_ref().and_then(Token::word) {
        Some(word) => word.to_string(),
        None => return Err(malformed(name, "expected bean class name")),
    };

    let interface = match iter.next() {
        None => None,
        Some(Token::Slash) => match iter.next() {
            Some(token) => match token.word() {
                Some(word) => Some(word.to_string()),
                None => return Err(malformed(name, "expected interface after '/'")),
            },
            None => return Err(malformed(name, "expected interface after '/'")),
        },
        Some(_) => return Err(malformed(name, "expected '/' after class name")),
    };

    if iter.next().is_some() {
        return Err(malformed(name, "unexpected trailing tokens"));
    }

    Ok(LookupName {
        scope,
        class_name,
        interface,
    })
}

fn malformed(name: &str, reason: impl Into<String>) -> NamingError {
    NamingError::MalformedName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_app_scope() {
        let tokens = tokenize("php:app/UserProcessor/local", "php").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Scheme("php".into()),
                Token::Colon,
                Token::App,
                Token::Slash,
                Token::ClassName("UserProcessor".into()),
                Token::Slash,
                Token::Interface("local".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_global_scope() {
        let tokens = tokenize("php:global/example/UserProcessor/remote", "php").unwrap();
        assert_eq!(tokens[2], Token::Global("example".into()));
        assert_eq!(tokens[6], Token::Interface("remote".into()));
    }

    #[test]
    fn test_tokenize_rejects_unknown_characters() {
        let err = tokenize("php:app/User-Processor", "php").unwrap_err();
        assert!(matches!(err, NamingError::MalformedName { reason, .. } if reason.contains("offset 12")));
    }

    #[test]
    fn test_parse_global() {
        let parsed = parse("php:global/example/UserProcessor/remote", "php").unwrap();
        assert_eq!(parsed.scope, Scope::Global("example".into()));
        assert_eq!(parsed.class_name, "UserProcessor");
        assert_eq!(parsed.interface.as_deref(), Some("remote"));
    }

    #[test]
    fn test_parse_without_interface() {
        let parsed = parse("php:app/UserProcessor", "php").unwrap();
        assert_eq!(parsed.scope, Scope::App);
        assert_eq!(parsed.interface, None);
    }

    #[test]
    fn test_parse_keyword_class_names() {
        let parsed = parse("php:app/local/remote", "php").unwrap();
        assert_eq!(parsed.class_name, "local");
        assert_eq!(parsed.interface.as_deref(), Some("remote"));
    }

    #[test]
    fn test_parse_errors() {
        for name in [
            "app/UserProcessor/local",
            "php:UserProcessor/local",
            "php:app:UserProcessor",
            "php:app/",
            "php:app/UserProcessor/local/extra",
            "php:app/UserProcessor/",
        ] {
            assert!(
                matches!(parse(name, "php"), Err(NamingError::MalformedName { .. })),
                "{} should be malformed",
                name
            );
        }
    }
}
