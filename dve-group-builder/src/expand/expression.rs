//! Integer expressions for `expr:` bindings
//!
//! Grammar (usual precedence, left associative):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := '-' unary | atom
//! atom   := integer | identifier | '(' expr ')'
//! ```
//!
//! Identifiers are looked up at evaluation time and must hold integer text.

/// Deepest allowed nesting of parentheses and unary minus
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),
    Variable(String),
    Negate(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(i64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() {
            let mut end = start;
            while let Some(&(idx, d)) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                end = idx + d.len_utf8();
                chars.next();
            }
            let value = src[start..end]
                .parse()
                .map_err(|_| format!("number '{}' is out of range", &src[start..end]))?;
            tokens.push(Token::Number(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(idx, d)) = chars.peek() {
                if !(d.is_ascii_alphanumeric() || d == '_') {
                    break;
                }
                end = idx + d.len_utf8();
                chars.next();
            }
            tokens.push(Token::Ident(src[start..end].to_string()));
        } else {
            chars.next();
            tokens.push(match c {
                '+' | '-' | '*' | '/' | '%' => Token::Op(c),
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(format!("unexpected character '{}'", other)),
            });
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Run `f` one nesting level deeper
    fn nested<F>(&mut self, f: F) -> Result<Expr, String>
    where
        F: FnOnce(&mut Self) -> Result<Expr, String>,
    {
        if self.depth >= MAX_NESTING {
            return Err(format!("nesting deeper than {} levels", MAX_NESTING));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = if *op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            let op = match op {
                '*' => BinaryOp::Mul,
                '/' => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Parse expression text
pub fn parse(src: &str) -> Result<Expr, String> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected trailing {:?}", token));
    }
    Ok(expr)
}

impl Expr {
    /// Evaluate with checked arithmetic; `lookup` resolves variable names to text
    pub fn eval<F>(&self, lookup: &mut F) -> Result<i64, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(name) => {
                let text = lookup(name.as_str()).ok_or_else(|| format!("unknown variable '{}'", name))?;
                text.trim()
                    .parse()
                    .map_err(|_| format!("variable '{}' is not an integer ('{}')", name, text))
            }
            Expr::Negate(inner) => inner
                .eval(lookup)?
                .checked_neg()
                .ok_or_else(|| "integer overflow".to_string()),
            Expr::Binary(lhs, op, rhs) => {
                let a = lhs.eval(lookup)?;
                let b = rhs.eval(lookup)?;
                let result = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                        return Err("division by zero".to_string())
                    }
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Rem => a.checked_rem(b),
                };
                result.ok_or_else(|| "integer overflow".to_string())
            }
        }
    }
}
