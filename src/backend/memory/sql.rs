//! Parser for the query dialect the compiler emits.
//!
//! Accepts `SELECT * | COUNT(1) AS alias FROM ROOT r [WHERE expr] [ORDER BY path dir, ...]`.
//! Anything outside that subset is rejected with a message; the backend maps it to 400.

use bson::Bson;

use crate::criteria::Order;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Count { alias: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Path(Vec<String>),
    Param(String),
    Literal(Bson),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    StartsWith,
    Contains,
    IsNull,
}

impl Func {
    const fn arity(self) -> usize {
        match self {
            Self::StartsWith | Self::Contains => 2,
            Self::IsNull => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Value(Operand),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { left: Operand, op: CmpOp, right: Operand },
    In { target: Operand, values: Vec<Operand> },
    Call { func: Func, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectQuery {
    pub projection: Projection,
    pub filter: Option<Expr>,
    pub order_by: Vec<(Vec<String>, Order)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Param(String),
    Str(String),
    Num(Bson),
    Sym(&'static str),
}

fn lex(input: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' || c == '@' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if c == '@' {
                if word.len() == 1 {
                    return Err("dangling '@' in query".into());
                }
                out.push(Tok::Param(word));
            } else {
                out.push(Tok::Ident(word));
            }
            continue;
        }
        if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let num = if text.contains('.') {
                text.parse::<f64>().map(Bson::Double)
                    .map_err(|e| format!("bad number '{text}': {e}"))?
            } else {
                text.parse::<i64>().map(Bson::Int64)
                    .map_err(|e| format!("bad number '{text}': {e}"))?
            };
            out.push(Tok::Num(num));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string literal".into()),
                    Some('\\') => {
                        let escaped = chars.get(i + 1).ok_or("unterminated escape")?;
                        s.push(*escaped);
                        i += 2;
                    }
                    Some(ch) if *ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        s.push(*ch);
                        i += 1;
                    }
                }
            }
            out.push(Tok::Str(s));
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let sym = match two.as_str() {
            "!=" => Some("!="),
            "<>" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(s) = sym {
            out.push(Tok::Sym(s));
            i += 2;
            continue;
        }
        let single = match c {
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            ',' => ",",
            '.' => ".",
            '*' => "*",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            other => return Err(format!("unexpected character '{other}'")),
        };
        out.push(Tok::Sym(single));
        i += 1;
    }
    Ok(out)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    alias: String,
}

/// Parses one query of the supported dialect.
pub(crate) fn parse(input: &str) -> Result<SelectQuery, String> {
    let mut p = Parser { toks: lex(input)?, pos: 0, alias: String::new() };
    p.expect_kw("SELECT")?;
    let projection = if p.eat_sym("*") {
        Projection::All
    } else {
        p.expect_kw("COUNT")?;
        p.expect_sym("(")?;
        match p.next() {
            Some(Tok::Num(_)) => {}
            other => return Err(format!("COUNT expects a numeric argument, got {other:?}")),
        }
        p.expect_sym(")")?;
        p.expect_kw("AS")?;
        Projection::Count { alias: p.ident()? }
    };
    p.expect_kw("FROM")?;
    p.expect_kw("ROOT")?;
    p.alias = p.ident()?;
    let filter = if p.eat_kw("WHERE") { Some(p.or_expr()?) } else { None };
    let mut order_by = Vec::new();
    if p.eat_kw("ORDER") {
        p.expect_kw("BY")?;
        loop {
            let Operand::Path(path) = p.operand()? else {
                return Err("ORDER BY expects a field path".into());
            };
            let order = if p.eat_kw("DESC") {
                Order::Desc
            } else {
                p.eat_kw("ASC");
                Order::Asc
            };
            order_by.push((path, order));
            if !p.eat_sym(",") {
                break;
            }
        }
    }
    if let Some(t) = p.peek() {
        return Err(format!("unexpected trailing token {t:?}"));
    }
    Ok(SelectQuery { projection, filter, order_by })
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        let hit = self.is_kw(kw);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), String> {
        if self.eat_kw(kw) { Ok(()) } else { Err(format!("expected {kw}, got {:?}", self.peek())) }
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        let hit = matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), String> {
        if self.eat_sym(sym) { Ok(()) } else { Err(format!("expected '{sym}', got {:?}", self.peek())) }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(w)) => Ok(w),
            other => Err(format!("expected identifier, got {other:?}")),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.eat_kw("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        while self.eat_kw("AND") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat_kw("NOT") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, String> {
        if self.eat_sym("(") {
            let inner = self.or_expr()?;
            self.expect_sym(")")?;
            return Ok(inner);
        }
        if let Some(func) = self.function_name() {
            self.pos += 1;
            self.expect_sym("(")?;
            let args = self.operand_list()?;
            if args.len() != func.arity() {
                return Err(format!("{func:?} takes {} argument(s)", func.arity()));
            }
            return Ok(Expr::Call { func, args });
        }
        let left = self.operand()?;
        if self.eat_kw("IN") {
            self.expect_sym("(")?;
            let values = self.operand_list()?;
            return Ok(Expr::In { target: left, values });
        }
        let op = match self.peek() {
            Some(Tok::Sym("=")) => CmpOp::Eq,
            Some(Tok::Sym("!=")) => CmpOp::Ne,
            Some(Tok::Sym(">")) => CmpOp::Gt,
            Some(Tok::Sym(">=")) => CmpOp::Gte,
            Some(Tok::Sym("<")) => CmpOp::Lt,
            Some(Tok::Sym("<=")) => CmpOp::Lte,
            _ => return Ok(Expr::Value(left)),
        };
        self.pos += 1;
        let right = self.operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn function_name(&self) -> Option<Func> {
        let Some(Tok::Ident(w)) = self.peek() else { return None };
        if !matches!(self.toks.get(self.pos + 1), Some(Tok::Sym("("))) {
            return None;
        }
        match w.to_ascii_uppercase().as_str() {
            "STARTSWITH" => Some(Func::StartsWith),
            "CONTAINS" => Some(Func::Contains),
            "IS_NULL" => Some(Func::IsNull),
            _ => None,
        }
    }

    /// Comma separated operands up to and including the closing parenthesis.
    fn operand_list(&mut self) -> Result<Vec<Operand>, String> {
        let mut items = Vec::new();
        if self.eat_sym(")") {
            return Ok(items);
        }
        loop {
            items.push(self.operand()?);
            if self.eat_sym(")") {
                return Ok(items);
            }
            self.expect_sym(",")?;
        }
    }

    fn operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Tok::Param(name)) => Ok(Operand::Param(name)),
            Some(Tok::Str(s)) => Ok(Operand::Literal(Bson::String(s))),
            Some(Tok::Num(n)) => Ok(Operand::Literal(n)),
            Some(Tok::Ident(w)) if w.eq_ignore_ascii_case("true") => Ok(Operand::Literal(Bson::Boolean(true))),
            Some(Tok::Ident(w)) if w.eq_ignore_ascii_case("false") => {
                Ok(Operand::Literal(Bson::Boolean(false)))
            }
            Some(Tok::Ident(w)) if w.eq_ignore_ascii_case("null") => Ok(Operand::Literal(Bson::Null)),
            Some(Tok::Ident(w)) if w == self.alias => self.path_tail(),
            other => Err(format!("expected operand, got {other:?}")),
        }
    }

    fn path_tail(&mut self) -> Result<Operand, String> {
        let mut path = Vec::new();
        loop {
            if self.eat_sym(".") {
                path.push(self.ident()?);
            } else if self.eat_sym("[") {
                match self.next() {
                    Some(Tok::Str(s)) => path.push(s),
                    other => return Err(format!("expected quoted property name, got {other:?}")),
                }
                self.expect_sym("]")?;
            } else {
                break;
            }
        }
        if path.is_empty() {
            return Err(format!("bare root alias '{}' is not a field", self.alias));
        }
        Ok(Operand::Path(path))
    }
}
