//! Compiles sandboxed arithmetic text into a postfix program.
//!
//! The grammar is the whole language:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := unary (('*' | '/' | '%') unary)*
//! unary      := ('+' | '-') unary | primary
//! primary    := number | '(' expression ')'
//! number     := digit+ ('.' digit*)? | '.' digit+
//! ```
//!
//! Anything else is a `ParseError`, so no input can compile to more than
//! arithmetic over literals.

use super::ledger::ParseError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    Push(f64),
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Postfix instruction tape. Executing it never needs more than `max_stack`
/// slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub ops: Vec<OpCode>,
    pub max_stack: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = pos;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &text[pos..end];
                if literal.matches('.').count() > 1 || !literal.bytes().any(|b| b.is_ascii_digit()) {
                    return Err(ParseError::new(pos, format!("malformed number '{}'", literal)));
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ParseError::new(pos, format!("malformed number '{}'", literal)))?;
                tokens.push(Token { kind: TokenKind::Number(value), pos });
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            other => return Err(ParseError::new(pos, format!("unexpected character '{}'", other))),
        };
        tokens.push(Token { kind, pos });
        chars.next();
    }
    Ok(tokens)
}

struct Compiler<'t> {
    tokens: &'t [Token],
    cursor: usize,
    end: usize,
    depth: usize,
    max_depth: usize,
    ops: Vec<OpCode>,
    stack: usize,
    max_stack: usize,
}

impl Program {
    /// Compiles `text`, rejecting nesting (parentheses plus unary signs)
    /// deeper than `max_depth`.
    pub fn compile(text: &str, max_depth: usize) -> Result<Program, ParseError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ParseError::new(0, "empty expression"));
        }

        let mut compiler = Compiler {
            tokens: &tokens,
            cursor: 0,
            end: text.len(),
            depth: 0,
            max_depth,
            ops: Vec::with_capacity(tokens.len()),
            stack: 0,
            max_stack: 0,
        };
        compiler.expression()?;

        if let Some(extra) = compiler.peek() {
            return Err(ParseError::new(extra.pos, "unexpected token after end of expression"));
        }

        Ok(Program { ops: compiler.ops, max_stack: compiler.max_stack })
    }
}

impl<'t> Compiler<'t> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    fn here(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.end)
    }

    fn emit(&mut self, op: OpCode) {
        match op {
            OpCode::Push(_) => {
                self.stack += 1;
                self.max_stack = self.max_stack.max(self.stack);
            }
            OpCode::Neg => {}
            _ => self.stack -= 1,
        }
        self.ops.push(op);
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::new(
                self.here(),
                format!("expression nested deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<(), ParseError> {
        self.term()?;
        while let Some(tok) = self.peek() {
            let op = match tok.kind {
                TokenKind::Plus => OpCode::Add,
                TokenKind::Minus => OpCode::Sub,
                _ => break,
            };
            self.cursor += 1;
            self.term()?;
            self.emit(op);
        }
        Ok(())
    }

    fn term(&mut self) -> Result<(), ParseError> {
        self.unary()?;
        while let Some(tok) = self.peek() {
            let op = match tok.kind {
                TokenKind::Star => OpCode::Mul,
                TokenKind::Slash => OpCode::Div,
                TokenKind::Percent => OpCode::Rem,
                _ => break,
            };
            self.cursor += 1;
            self.unary()?;
            self.emit(op);
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), ParseError> {
        match self.peek().map(|t| t.kind) {
            Some(TokenKind::Plus) | Some(TokenKind::Minus) => {
                let negate = self.peek().map(|t| t.kind) == Some(TokenKind::Minus);
                self.cursor += 1;
                self.enter()?;
                self.unary()?;
                self.leave();
                if negate {
                    self.emit(OpCode::Neg);
                }
                Ok(())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<(), ParseError> {
        let Some(tok) = self.peek() else {
            return Err(ParseError::new(self.end, "unexpected end of expression"));
        };
        match tok.kind {
            TokenKind::Number(value) => {
                self.cursor += 1;
                self.emit(OpCode::Push(value));
                Ok(())
            }
            TokenKind::LParen => {
                self.cursor += 1;
                self.enter()?;
                self.expression()?;
                match self.peek() {
                    Some(Token { kind: TokenKind::RParen, .. }) => self.cursor += 1,
                    Some(other) => return Err(ParseError::new(other.pos, "expected ')'")),
                    None => return Err(ParseError::new(self.end, "unbalanced parentheses: missing ')'")),
                }
                self.leave();
                Ok(())
            }
            TokenKind::RParen => Err(ParseError::new(tok.pos, "unexpected ')'")),
            _ => Err(ParseError::new(tok.pos, "expected a number or '('")),
        }
    }
}
