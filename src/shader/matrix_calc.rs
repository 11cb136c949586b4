//! Shader matrix-calculation expressions.
//!
//! A shader may carry a small arithmetic program over ten named input
//! matrices; each statement's result is written to one shader output matrix.
//! Statements are separated by `;` or `,`:
//!
//! ```text
//! left_view_proj * model; ~left_view; ^(left_view * model)
//! ```
//!
//! `~` is matrix inverse, `^` is transpose; both bind tighter than `*`,
//! which binds tighter than `+`/`-`. Earlier outputs are readable as
//! `output0`..`output9`. A malformed program yields zero statements and the
//! sorter falls back to the direct `u_mvp` upload path.

use glam::Mat4;
use log::error;

/// Names of the ten input matrices, in `RenderState::u_matrices` slot order.
pub const INPUT_MATRIX_NAMES: [&str; 10] = [
    "left_view_proj",
    "right_view_proj",
    "projection",
    "left_view",
    "right_view",
    "inverse_left_view",
    "inverse_right_view",
    "model",
    "left_mvp",
    "right_mvp",
];

/// Maximum number of output matrices a program may produce.
pub const MAX_OUTPUT_MATRICES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Input(usize),
    Output(usize),
    Plus,
    Minus,
    Star,
    Tilde,
    Caret,
    LParen,
    RParen,
    Terminator,
}

#[derive(Debug, Clone)]
enum Expr {
    Input(usize),
    Output(usize),
    Invert(Box<Expr>),
    Transpose(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
}

fn lex(src: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Tilde);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ';' | ',' => {
                tokens.push(Token::Terminator);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let name = &src[start..i];
                if let Some(slot) = INPUT_MATRIX_NAMES.iter().position(|&n| n == name) {
                    tokens.push(Token::Input(slot));
                } else if let Some(num) = name.strip_prefix("output") {
                    let slot: usize = num.parse().ok()?;
                    if slot >= MAX_OUTPUT_MATRICES {
                        return None;
                    }
                    tokens.push(Token::Output(slot));
                } else {
                    return None;
                }
            }
            _ => return None,
        }
    }
    Some(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek()?;
        self.pos += 1;
        Some(t)
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    lhs = Expr::Subtract(Box::new(lhs), Box::new(self.term()?));
                }
                _ => return Some(lhs),
            }
        }
    }

    // term := factor ('*' factor)*
    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.factor()?;
        while self.peek() == Some(Token::Star) {
            self.pos += 1;
            lhs = Expr::Multiply(Box::new(lhs), Box::new(self.factor()?));
        }
        Some(lhs)
    }

    // factor := '~' factor | '^' factor | operand
    fn factor(&mut self) -> Option<Expr> {
        match self.peek()? {
            Token::Tilde => {
                self.pos += 1;
                Some(Expr::Invert(Box::new(self.factor()?)))
            }
            Token::Caret => {
                self.pos += 1;
                Some(Expr::Transpose(Box::new(self.factor()?)))
            }
            _ => self.operand(),
        }
    }

    // operand := name | '(' expr ')'
    fn operand(&mut self) -> Option<Expr> {
        match self.bump()? {
            Token::Input(slot) => Some(Expr::Input(slot)),
            Token::Output(slot) => Some(Expr::Output(slot)),
            Token::LParen => {
                let inner = self.expr()?;
                if self.bump()? == Token::RParen {
                    Some(inner)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// A compiled matrix-calculation program.
#[derive(Debug, Clone)]
pub struct MatrixCalc {
    statements: Vec<Expr>,
}

impl MatrixCalc {
    /// Compiles a program. Returns None (and logs) on a syntax error, in
    /// which case the shader behaves as if it had no expression.
    #[must_use]
    pub fn new(expressions: &str) -> Option<Self> {
        let Some(tokens) = lex(expressions) else {
            error!("MATRIXCALC: bad token in expression '{expressions}'");
            return None;
        };
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
        };
        let mut statements = Vec::new();
        while parser.peek().is_some() {
            let Some(expr) = parser.expr() else {
                error!("MATRIXCALC: bad expression syntax in '{expressions}'");
                return None;
            };
            statements.push(expr);
            match parser.bump() {
                Some(Token::Terminator) | None => {}
                Some(_) => {
                    error!("MATRIXCALC: expected statement terminator in '{expressions}'");
                    return None;
                }
            }
            if statements.len() > MAX_OUTPUT_MATRICES {
                error!("MATRIXCALC: more than {MAX_OUTPUT_MATRICES} statements");
                return None;
            }
        }
        if statements.is_empty() {
            return None;
        }
        Some(Self { statements })
    }

    /// Number of output matrices this program produces.
    #[must_use]
    pub fn num_statements(&self) -> usize {
        self.statements.len()
    }

    /// Evaluates each statement, writing statement `i`'s result to
    /// `outputs[i]`. Returns the number of statements evaluated.
    pub fn calculate(&self, inputs: &[Mat4], outputs: &mut [Mat4]) -> usize {
        for (i, statement) in self.statements.iter().enumerate() {
            outputs[i] = Self::eval(statement, inputs, outputs);
        }
        self.statements.len()
    }

    fn eval(expr: &Expr, inputs: &[Mat4], outputs: &[Mat4]) -> Mat4 {
        match expr {
            Expr::Input(slot) => inputs[*slot],
            Expr::Output(slot) => outputs[*slot],
            Expr::Invert(e) => Self::eval(e, inputs, outputs).inverse(),
            Expr::Transpose(e) => Self::eval(e, inputs, outputs).transpose(),
            Expr::Add(a, b) => Self::eval(a, inputs, outputs) + Self::eval(b, inputs, outputs),
            Expr::Subtract(a, b) => Self::eval(a, inputs, outputs) - Self::eval(b, inputs, outputs),
            Expr::Multiply(a, b) => Self::eval(a, inputs, outputs) * Self::eval(b, inputs, outputs),
        }
    }
}
