use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords — distinguished in the parser.
    /// May start with `$` (script globals like `$userId`).
    Ident(String),
    /// Quoted string literal (content without quotes, escapes resolved).
    /// Single and double quotes are both accepted.
    Str(String),
    /// Numeric literal
    Num(f64),
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;

    while pos < chars.len() {
        let c = chars[pos];

        // Line comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Whitespace
        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;

        // String literal
        if c == '"' || c == '\'' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ParseError::syntax(tok_line, "unterminated string literal"));
                }
                let sc = chars[pos];
                if sc == quote {
                    pos += 1;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    if pos >= chars.len() {
                        return Err(ParseError::syntax(tok_line, "unterminated escape in string"));
                    }
                    match chars[pos] {
                        '"' => s.push('"'),
                        '\'' => s.push('\''),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    pos += 1;
                    continue;
                }
                if sc == '\n' {
                    return Err(ParseError::syntax(tok_line, "unterminated string literal"));
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                line: tok_line,
            });
            continue;
        }

        // Number
        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos] == '.'
                && pos + 1 < chars.len()
                && chars[pos + 1].is_ascii_digit()
            {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let s: String = chars[start..pos].iter().collect();
            let n: f64 = s
                .parse()
                .map_err(|_| ParseError::syntax(tok_line, format!("invalid number '{}'", s)))?;
            tokens.push(Spanned {
                token: Token::Num(n),
                line: tok_line,
            });
            continue;
        }

        // Operators and punctuation
        let push_tok = |tokens: &mut Vec<Spanned>, token: Token| {
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
        };
        match c {
            '=' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '=' {
                    push_tok(&mut tokens, Token::EqEq);
                    pos += 2;
                } else if pos + 1 < chars.len() && chars[pos + 1] == '>' {
                    // Arrow functions are a forbidden construct, not a syntax error.
                    return Err(ParseError::forbidden(tok_line, "=>"));
                } else {
                    return Err(ParseError::syntax(
                        tok_line,
                        "assignment is not supported (did you mean '==')",
                    ));
                }
                continue;
            }
            '!' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '=' {
                    push_tok(&mut tokens, Token::Neq);
                    pos += 2;
                } else {
                    push_tok(&mut tokens, Token::Bang);
                    pos += 1;
                }
                continue;
            }
            '<' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '=' {
                    push_tok(&mut tokens, Token::Lte);
                    pos += 2;
                } else {
                    push_tok(&mut tokens, Token::Lt);
                    pos += 1;
                }
                continue;
            }
            '>' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '=' {
                    push_tok(&mut tokens, Token::Gte);
                    pos += 2;
                } else {
                    push_tok(&mut tokens, Token::Gt);
                    pos += 1;
                }
                continue;
            }
            '&' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '&' {
                    push_tok(&mut tokens, Token::AndAnd);
                    pos += 2;
                } else {
                    return Err(ParseError::syntax(tok_line, "unexpected character '&'"));
                }
                continue;
            }
            '|' => {
                if pos + 1 < chars.len() && chars[pos + 1] == '|' {
                    push_tok(&mut tokens, Token::OrOr);
                    pos += 2;
                } else {
                    return Err(ParseError::syntax(tok_line, "unexpected character '|'"));
                }
                continue;
            }
            '+' => {
                push_tok(&mut tokens, Token::Plus);
                pos += 1;
                continue;
            }
            '-' => {
                push_tok(&mut tokens, Token::Minus);
                pos += 1;
                continue;
            }
            '*' => {
                push_tok(&mut tokens, Token::Star);
                pos += 1;
                continue;
            }
            '/' => {
                push_tok(&mut tokens, Token::Slash);
                pos += 1;
                continue;
            }
            '(' => {
                push_tok(&mut tokens, Token::LParen);
                pos += 1;
                continue;
            }
            ')' => {
                push_tok(&mut tokens, Token::RParen);
                pos += 1;
                continue;
            }
            '[' => {
                push_tok(&mut tokens, Token::LBracket);
                pos += 1;
                continue;
            }
            ']' => {
                push_tok(&mut tokens, Token::RBracket);
                pos += 1;
                continue;
            }
            '{' => {
                push_tok(&mut tokens, Token::LBrace);
                pos += 1;
                continue;
            }
            '}' => {
                push_tok(&mut tokens, Token::RBrace);
                pos += 1;
                continue;
            }
            ',' => {
                push_tok(&mut tokens, Token::Comma);
                pos += 1;
                continue;
            }
            ':' => {
                push_tok(&mut tokens, Token::Colon);
                pos += 1;
                continue;
            }
            ';' => {
                push_tok(&mut tokens, Token::Semi);
                pos += 1;
                continue;
            }
            '.' => {
                push_tok(&mut tokens, Token::Dot);
                pos += 1;
                continue;
            }
            _ => {}
        }

        // Identifier — may begin with `$` for script globals
        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            pos += 1;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: Token::Ident(word),
                line: tok_line,
            });
            continue;
        }

        return Err(ParseError::syntax(
            tok_line,
            format!("unexpected character '{}'", c),
        ));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_call_with_mixed_args() {
        let tokens = lex("runTool('t1', $bandId, 2.5)").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|s| s.token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Ident("runTool".into()),
                Token::LParen,
                Token::Str("t1".into()),
                Token::Comma,
                Token::Ident("$bandId".into()),
                Token::Comma,
                Token::Num(2.5),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tracks_lines_and_skips_comments() {
        let tokens = lex("1 +\n// comment\n2").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn string_escapes_resolved() {
        let tokens = lex(r#""a\n\"b\"""#).unwrap();
        assert_eq!(tokens[0].token, Token::Str("a\n\"b\"".into()));
    }

    #[test]
    fn arrow_is_forbidden_not_syntax() {
        let err = lex("x => 1").unwrap_err();
        assert!(matches!(err, ParseError::Forbidden { ref token, .. } if token == "=>"));
    }

    #[test]
    fn unterminated_string_rejected() {
        assert!(matches!(
            lex("'abc").unwrap_err(),
            ParseError::Syntax { .. }
        ));
    }

    #[test]
    fn single_equals_rejected() {
        assert!(matches!(lex("a = 1").unwrap_err(), ParseError::Syntax { .. }));
    }
}
