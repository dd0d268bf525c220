//! Contains the syntax tree of neighbor scripts, the parser producing it, and
//! a simple constant folding pass.

use crate::{
    lexer::{tokenize, Token},
    Error,
};

/// The script evaluated when no other script is given. It defines the
/// neighbor function and evaluates to it.
pub const NEIGHBOR_SCRIPT: &str = "
function alive(grid, l, m, N, M) {
    var aliveNeighbours = 0;
    for (i = -1; i <= 1; i++) {
        for (j = -1; j <= 1; j++) {
            if ((l + i >= 0 && l + i < M) && (m + j >= 0 && m + j < N)) {
                aliveNeighbours += grid[l + i][m + j];
            }
        }
    }
    aliveNeighbours -= grid[l][m];
    return aliveNeighbours;
}
alive";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LogicalOp {
    And,
    Or,
}

/// Expressions of the script language.
#[derive(Clone, PartialEq, Debug)]
pub enum Expr {
    Number(i64),
    Bool(bool),
    Var(String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    /// Assignment to a variable. With an operator this is a compound
    /// assignment such as `+=`.
    Assign(Option<BinaryOp>, String, Box<Expr>),
    /// Increment (`delta == 1`) or decrement (`delta == -1`) of a variable.
    /// Prefix updates evaluate to the new value, postfix ones to the old.
    Update {
        name: String,
        delta: i64,
        prefix: bool,
    },
}

/// Statements of the script language.
#[derive(Clone, PartialEq, Debug)]
pub enum Stmt {
    Var(Vec<(String, Option<Expr>)>),
    Expr(Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    While(Expr, Box<Stmt>),
    Block(Vec<Stmt>),
    Return(Option<Expr>),
    Empty,
}

/// A function declared at the top level of a script.
#[derive(Clone, PartialEq, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A complete script. Functions are hoisted out of the top-level statements.
#[derive(Clone, PartialEq, Debug)]
pub struct Script {
    pub functions: Vec<Function>,
    pub body: Vec<Stmt>,
}

/// Maximum nesting depth of statements, and maximum height of expressions.
pub const MAX_NESTING: usize = 128;

const KEYWORDS: &[&str] = &[
    "function", "var", "let", "const", "if", "else", "for", "while", "return", "true", "false",
];

/// Recursive descent parser over the token list.
struct Parser<'src> {
    tokens: Vec<(usize, Token<'src>)>,
    next: usize,
    depth: usize,
}

impl Expr {
    /// Whether the expression tree is more than `limit` nodes high.
    fn deeper_than(&self, limit: usize) -> bool {
        let Some(limit) = limit.checked_sub(1) else {
            return true;
        };
        match self {
            Expr::Number(_) | Expr::Bool(_) | Expr::Var(_) | Expr::Update { .. } => false,
            Expr::Unary(_, value) | Expr::Assign(_, _, value) => value.deeper_than(limit),
            Expr::Index(lhs, rhs) | Expr::Binary(_, lhs, rhs) | Expr::Logical(_, lhs, rhs) => {
                lhs.deeper_than(limit) || rhs.deeper_than(limit)
            }
            Expr::Call(callee, args) => {
                callee.deeper_than(limit) || args.iter().any(|arg| arg.deeper_than(limit))
            }
        }
    }
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Token<'src> {
        self.tokens[self.next].1
    }

    fn position(&self) -> usize {
        self.tokens[self.next].0
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.peek();
        if token != Token::Eof {
            self.next += 1;
        }
        token
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.eat(Token::Ident(keyword))
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), Error> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> Error {
        let found = match self.peek() {
            Token::Eof => "end of input".to_owned(),
            Token::Ident(name) => format!("`{name}`"),
            Token::Number(value) => format!("`{value}`"),
            token => format!("{token:?}"),
        };
        Error::syntax(format!("expected {what}, found {found}"), self.position())
    }

    /// Run `parse` one level deeper, failing once [`MAX_NESTING`] is reached.
    fn nested<T>(
        &mut self,
        what: &str,
        parse: fn(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if self.depth >= MAX_NESTING {
            return Err(Error::syntax(
                format!("{what} nested too deeply"),
                self.position(),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Check the height of a newly built expression node.
    fn node(&self, expr: Expr, position: usize) -> Result<Expr, Error> {
        if expr.deeper_than(MAX_NESTING) {
            Err(Error::syntax("expression nested too deeply", position))
        } else {
            Ok(expr)
        }
    }

    fn identifier(&mut self) -> Result<String, Error> {
        match self.peek() {
            Token::Ident(name) if !KEYWORDS.contains(&name) => {
                self.advance();
                Ok(name.to_owned())
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn script(&mut self) -> Result<Script, Error> {
        let mut functions = Vec::new();
        let mut body = Vec::new();
        while self.peek() != Token::Eof {
            if self.eat_keyword("function") {
                functions.push(self.function()?);
            } else {
                body.push(self.statement()?);
            }
        }
        Ok(Script { functions, body })
    }

    fn function(&mut self) -> Result<Function, Error> {
        let name = self.identifier()?;
        self.expect(Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.eat(Token::RParen) {
            loop {
                params.push(self.identifier()?);
                if self.eat(Token::RParen) {
                    break;
                }
                self.expect(Token::Comma, "`,` or `)`")?;
            }
        }
        self.expect(Token::LBrace, "`{`")?;
        let body = self.block()?;
        Ok(Function { name, params, body })
    }

    /// Parse statements up to and including the closing brace.
    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut stmts = Vec::new();
        while !self.eat(Token::RBrace) {
            if self.peek() == Token::Eof {
                return Err(self.unexpected("`}`"));
            }
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn declaration(&mut self) -> Result<Stmt, Error> {
        let mut decls = Vec::new();
        loop {
            let name = self.identifier()?;
            let init = if self.eat(Token::Assign) {
                Some(self.expression()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(Token::Comma) {
                return Ok(Stmt::Var(decls));
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, Error> {
        self.nested("statement", Self::nested_statement)
    }

    fn nested_statement(&mut self) -> Result<Stmt, Error> {
        let position = self.position();
        match self.peek() {
            Token::Semi => {
                self.advance();
                Ok(Stmt::Empty)
            }
            Token::LBrace => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            Token::Ident("function") => Err(Error::syntax(
                "functions can only be declared at the top level",
                position,
            )),
            Token::Ident("var" | "let" | "const") => {
                self.advance();
                let stmt = self.declaration()?;
                self.eat(Token::Semi);
                Ok(stmt)
            }
            Token::Ident("if") => {
                self.advance();
                self.expect(Token::LParen, "`(`")?;
                let cond = self.expression()?;
                self.expect(Token::RParen, "`)`")?;
                let then = Box::new(self.statement()?);
                let otherwise = if self.eat_keyword("else") {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then, otherwise))
            }
            Token::Ident("while") => {
                self.advance();
                self.expect(Token::LParen, "`(`")?;
                let cond = self.expression()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(Stmt::While(cond, Box::new(self.statement()?)))
            }
            Token::Ident("for") => {
                self.advance();
                self.expect(Token::LParen, "`(`")?;
                let init = if self.eat(Token::Semi) {
                    None
                } else {
                    let init = if let Token::Ident("var" | "let" | "const") = self.peek() {
                        self.advance();
                        self.declaration()?
                    } else {
                        Stmt::Expr(self.expression()?)
                    };
                    self.expect(Token::Semi, "`;`")?;
                    Some(Box::new(init))
                };
                let cond = if self.peek() == Token::Semi {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(Token::Semi, "`;`")?;
                let update = if self.peek() == Token::RParen {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(Token::RParen, "`)`")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::For {
                    init,
                    cond,
                    update,
                    body,
                })
            }
            Token::Ident("return") => {
                self.advance();
                let value = match self.peek() {
                    Token::Semi | Token::RBrace | Token::Eof => None,
                    _ => Some(self.expression()?),
                };
                self.eat(Token::Semi);
                Ok(Stmt::Return(value))
            }
            _ => {
                let expr = self.expression()?;
                self.eat(Token::Semi);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn expression(&mut self) -> Result<Expr, Error> {
        self.nested("expression", Self::nested_expression)
    }

    fn nested_expression(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        let target = self.logical_or()?;
        let op = match self.peek() {
            Token::Assign => None,
            Token::PlusAssign => Some(BinaryOp::Add),
            Token::MinusAssign => Some(BinaryOp::Sub),
            Token::StarAssign => Some(BinaryOp::Mul),
            Token::SlashAssign => Some(BinaryOp::Div),
            Token::PercentAssign => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };
        self.advance();
        match target {
            Expr::Var(name) => {
                let value = self.expression()?;
                self.node(Expr::Assign(op, name, Box::new(value)), position)
            }
            _ => Err(Error::syntax("invalid assignment target", position)),
        }
    }

    fn logical_or(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        let mut lhs = self.logical_and()?;
        while self.eat(Token::Or) {
            let rhs = self.logical_and()?;
            let expr = Expr::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs));
            lhs = self.node(expr, position)?;
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        let mut lhs = self.binary(0)?;
        while self.eat(Token::And) {
            let rhs = self.binary(0)?;
            let expr = Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs));
            lhs = self.node(expr, position)?;
        }
        Ok(lhs)
    }

    /// Parse a left-associative binary expression with operators of at least
    /// the given precedence level.
    fn binary(&mut self, level: usize) -> Result<Expr, Error> {
        const LEVELS: [&[(Token<'static>, BinaryOp)]; 4] = [
            &[(Token::Eq, BinaryOp::Eq), (Token::Ne, BinaryOp::Ne)],
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Le, BinaryOp::Le),
                (Token::Gt, BinaryOp::Gt),
                (Token::Ge, BinaryOp::Ge),
            ],
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
        ];
        if level == LEVELS.len() {
            return self.unary();
        }
        let position = self.position();
        let mut lhs = self.binary(level + 1)?;
        'outer: loop {
            for &(token, op) in LEVELS[level] {
                if self.eat(token) {
                    let rhs = self.binary(level + 1)?;
                    lhs = self.node(Expr::Binary(op, Box::new(lhs), Box::new(rhs)), position)?;
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        match self.peek() {
            Token::Minus | Token::Not => {
                let op = if self.advance() == Token::Minus {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                let value = self.nested("expression", Self::unary)?;
                self.node(Expr::Unary(op, Box::new(value)), position)
            }
            Token::Plus => {
                self.advance();
                self.nested("expression", Self::unary)
            }
            Token::Incr | Token::Decr => {
                let delta = if self.advance() == Token::Incr { 1 } else { -1 };
                let name = self.identifier()?;
                Ok(Expr::Update {
                    name,
                    delta,
                    prefix: true,
                })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        let mut expr = self.primary()?;
        loop {
            if self.eat(Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket, "`]`")?;
                expr = self.node(Expr::Index(Box::new(expr), Box::new(index)), position)?;
            } else if self.eat(Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma, "`,` or `)`")?;
                    }
                }
                expr = self.node(Expr::Call(Box::new(expr), args), position)?;
            } else {
                break;
            }
        }
        if let Token::Incr | Token::Decr = self.peek() {
            let Expr::Var(name) = expr else {
                return Err(Error::syntax("invalid increment target", position));
            };
            let delta = if self.advance() == Token::Incr { 1 } else { -1 };
            expr = Expr::Update {
                name,
                delta,
                prefix: false,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        match self.peek() {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            Token::Ident("true") => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::Ident("false") => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(expr)
            }
            _ => Ok(Expr::Var(self.identifier().map_err(|_| self.unexpected("expression"))?)),
        }
    }
}

/// Parse the source text of a script.
///
/// # Examples
/// ```
/// # use polylife::{ast::{parse, Expr, Stmt}, Error};
/// let script = parse("function f(a) { return a * 2; } f")?;
/// assert_eq!(script.functions[0].params, vec!["a"]);
/// assert_eq!(script.body, vec![Stmt::Expr(Expr::Var("f".to_owned()))]);
/// # Ok::<(), Error>(())
/// ```
pub fn parse(src: &str) -> Result<Script, Error> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        next: 0,
        depth: 0,
    };
    parser.script()
}

/// Evaluate a binary operation on two constants the same way the runtime
/// does. Returns [`None`] if the operation would fail at runtime.
pub fn fold_binary(op: BinaryOp, a: i64, b: i64) -> Option<Expr> {
    Some(match op {
        BinaryOp::Add => Expr::Number(a.wrapping_add(b)),
        BinaryOp::Sub => Expr::Number(a.wrapping_sub(b)),
        BinaryOp::Mul => Expr::Number(a.wrapping_mul(b)),
        BinaryOp::Div => Expr::Number(a.checked_div(b)?),
        BinaryOp::Rem => Expr::Number(a.checked_rem(b)?),
        BinaryOp::Lt => Expr::Bool(a < b),
        BinaryOp::Le => Expr::Bool(a <= b),
        BinaryOp::Gt => Expr::Bool(a > b),
        BinaryOp::Ge => Expr::Bool(a >= b),
        BinaryOp::Eq => Expr::Bool(a == b),
        BinaryOp::Ne => Expr::Bool(a != b),
    })
}

/// Return the integer value of a constant expression, if it is one.
fn constant(expr: &Expr) -> Option<i64> {
    match *expr {
        Expr::Number(value) => Some(value),
        Expr::Bool(value) => Some(value as i64),
        _ => None,
    }
}

impl Expr {
    /// Fold constant sub-expressions.
    fn optimize(self) -> Expr {
        match self {
            Expr::Unary(op, expr) => {
                let expr = expr.optimize();
                match (op, constant(&expr)) {
                    (UnaryOp::Neg, Some(value)) => Expr::Number(value.wrapping_neg()),
                    (UnaryOp::Not, Some(value)) => Expr::Bool(value == 0),
                    _ => Expr::Unary(op, Box::new(expr)),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.optimize();
                let rhs = rhs.optimize();
                match (constant(&lhs), constant(&rhs)) {
                    (Some(a), Some(b)) => fold_binary(op, a, b)
                        .unwrap_or_else(|| Expr::Binary(op, Box::new(lhs), Box::new(rhs))),
                    _ => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                }
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = lhs.optimize();
                let rhs = rhs.optimize();
                match constant(&lhs) {
                    Some(value) => match (op, value != 0) {
                        (LogicalOp::And, false) | (LogicalOp::Or, true) => lhs,
                        _ => rhs,
                    },
                    None => Expr::Logical(op, Box::new(lhs), Box::new(rhs)),
                }
            }
            Expr::Index(base, index) => {
                Expr::Index(Box::new(base.optimize()), Box::new(index.optimize()))
            }
            Expr::Call(callee, args) => Expr::Call(
                Box::new(callee.optimize()),
                args.into_iter().map(Expr::optimize).collect(),
            ),
            Expr::Assign(op, name, value) => Expr::Assign(op, name, Box::new(value.optimize())),
            expr => expr,
        }
    }
}

impl Stmt {
    fn optimize(self) -> Stmt {
        match self {
            Stmt::Var(decls) => Stmt::Var(
                decls
                    .into_iter()
                    .map(|(name, init)| (name, init.map(Expr::optimize)))
                    .collect(),
            ),
            Stmt::Expr(expr) => Stmt::Expr(expr.optimize()),
            Stmt::If(cond, then, otherwise) => Stmt::If(
                cond.optimize(),
                Box::new(then.optimize()),
                otherwise.map(|s| Box::new(s.optimize())),
            ),
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => Stmt::For {
                init: init.map(|s| Box::new(s.optimize())),
                cond: cond.map(Expr::optimize),
                update: update.map(Expr::optimize),
                body: Box::new(body.optimize()),
            },
            Stmt::While(cond, body) => Stmt::While(cond.optimize(), Box::new(body.optimize())),
            Stmt::Block(stmts) => Stmt::Block(stmts.into_iter().map(Stmt::optimize).collect()),
            Stmt::Return(value) => Stmt::Return(value.map(Expr::optimize)),
            Stmt::Empty => Stmt::Empty,
        }
    }
}

impl Script {
    /// Parse the source text of a script. See [`parse`].
    pub fn parse(src: &str) -> Result<Script, Error> {
        parse(src)
    }

    /// Fold constant expressions. Operations that would fail at runtime, such
    /// as a division by zero, are left in place.
    pub fn optimize(self) -> Script {
        Script {
            functions: self
                .functions
                .into_iter()
                .map(|f| Function {
                    name: f.name,
                    params: f.params,
                    body: f.body.into_iter().map(Stmt::optimize).collect(),
                })
                .collect(),
            body: self.body.into_iter().map(Stmt::optimize).collect(),
        }
    }

    /// Find the index of the function with the given name.
    pub fn function(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }
}
