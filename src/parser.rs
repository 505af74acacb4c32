//! Recursive-descent parser producing the statement tree and expression AST.
//!
//! The parser mirrors the classic chibicc structure: we maintain a
//! precedence-climbing set of helpers and a statement layer on top, so
//! sequencing lives outside the expression tree. Statements form a tagged
//! enum; every child is either owned outright (`Box`) or semantically
//! absent (`Option`), so a parent exclusively owns its subtree and
//! destruction is automatic.

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Var {
    name: String,
    loc: usize,
  },
  Neg {
    operand: Box<AstNode>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Assign {
    name: String,
    loc: usize,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(name: impl Into<String>, loc: usize) -> Self {
    Self::Var {
      name: name.into(),
      loc,
    }
  }

  pub fn unary_neg(operand: AstNode) -> Self {
    Self::Neg {
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(name: impl Into<String>, loc: usize, rhs: AstNode) -> Self {
    Self::Assign {
      name: name.into(),
      loc,
      rhs: Box::new(rhs),
    }
  }
}

/// A single local variable declaration, e.g. `int x = 5;`.
#[derive(Debug, Clone)]
pub struct VarDecl {
  pub name: String,
  pub init: Option<AstNode>,
  pub loc: usize,
}

/// Singly-linked, order-preserving chain of declarations.
#[derive(Debug, Clone)]
pub struct DeclList {
  pub decl: VarDecl,
  pub next: Option<Box<DeclList>>,
}

/// Singly-linked list of statements: a statement plus an optional tail.
/// Bodies stay linked lists rather than flat arrays so that sequencing is
/// just "head, then tail" in every traversal.
#[derive(Debug, Clone)]
pub struct StmtList {
  pub stmt: Stmt,
  pub next: Option<Box<StmtList>>,
}

impl StmtList {
  /// Iterate statements in declared order.
  pub fn iter(&self) -> StmtIter<'_> {
    StmtIter {
      current: Some(self),
    }
  }
}

pub struct StmtIter<'a> {
  current: Option<&'a StmtList>,
}

impl<'a> Iterator for StmtIter<'a> {
  type Item = &'a Stmt;

  fn next(&mut self) -> Option<Self::Item> {
    let list = self.current?;
    self.current = list.next.as_deref();
    Some(&list.stmt)
  }
}

/// The first clause of a `for` loop. C accepts either a declaration or a
/// plain expression there; keeping the two forms in one enum makes them
/// mutually exclusive in the tree itself, so a malformed node cannot be
/// built at all.
#[derive(Debug, Clone)]
pub enum ForInit {
  Decl(VarDecl),
  Expr(AstNode),
}

/// One parsed statement. An absent child (`None`) always means
/// "do nothing" at that position.
#[derive(Debug, Clone)]
pub enum Stmt {
  /// Expression statement; `None` is the empty statement, a bare `;`.
  Expr {
    expr: Option<AstNode>,
  },
  Return {
    expr: AstNode,
  },
  If {
    cond: AstNode,
    then_branch: Option<Box<Stmt>>,
    else_branch: Option<Box<Stmt>>,
  },
  While {
    cond: AstNode,
    body: Option<Box<Stmt>>,
  },
  For {
    init: ForInit,
    check: AstNode,
    update: AstNode,
    body: Option<Box<Stmt>>,
  },
  Block {
    decls: Option<Box<DeclList>>,
    stmts: Option<Box<StmtList>>,
  },
  Break {
    loc: usize,
  },
  Continue {
    loc: usize,
  },
  /// A `case value:` or `default:` label; `value: None` is the default.
  Case {
    value: Option<AstNode>,
    body: Option<Box<Stmt>>,
    loc: usize,
  },
  Switch {
    cond: AstNode,
    body: Option<Box<Stmt>>,
    loc: usize,
  },
}

/// Root of the parsed program: the whole input is treated as the body of
/// `main`, an implicit compound statement (declarations first, then
/// statements, no surrounding braces required).
#[derive(Debug, Clone)]
pub struct Program {
  pub body: Stmt,
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::at(source, 0, "program is empty"));
  }

  let (decls, stmts) = parse_block_body(&mut stream)?;

  if !stream.is_eof() {
    let token = stream.current().ok_or_else(|| {
      CompileError::at(
        source,
        source.len(),
        "unexpected end of input after statement",
      )
    })?;
    let got = describe_token(Some(token), source);
    return Err(CompileError::at(
      source,
      token.loc,
      format!("unexpected token \"{got}\""),
    ));
  }

  Ok(Program {
    body: Stmt::Block { decls, stmts },
  })
}

/// Declarations first, then statements – the body shared by braced blocks
/// and the top level.
fn parse_block_body(
  stream: &mut TokenStream,
) -> CompileResult<(Option<Box<DeclList>>, Option<Box<StmtList>>)> {
  let decls = parse_decl_list(stream)?;
  let stmts = parse_stmt_list(stream)?;
  Ok((decls, stmts))
}

fn parse_decl_list(stream: &mut TokenStream) -> CompileResult<Option<Box<DeclList>>> {
  if !stream.peek_keyword("int") {
    return Ok(None);
  }
  let decl = parse_decl(stream)?;
  let next = parse_decl_list(stream)?;
  Ok(Some(Box::new(DeclList { decl, next })))
}

/// `int <ident> ( = <expr> )? ;`
fn parse_decl(stream: &mut TokenStream) -> CompileResult<VarDecl> {
  stream.skip_keyword("int")?;
  let (name, loc) = stream.get_ident()?;
  let init = if stream.equal("=") {
    Some(parse_expr(stream)?)
  } else {
    None
  };
  stream.skip(";")?;
  Ok(VarDecl { name, init, loc })
}

fn parse_stmt_list(stream: &mut TokenStream) -> CompileResult<Option<Box<StmtList>>> {
  if stream.is_eof() || stream.peek_punct("}") {
    return Ok(None);
  }
  let stmt = parse_stmt(stream)?;
  let next = parse_stmt_list(stream)?;
  Ok(Some(Box::new(StmtList { stmt, next })))
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let loc = stream.loc();

  if stream.keyword("return") {
    let expr = parse_expr(stream)?;
    stream.skip(";")?;
    return Ok(Stmt::Return { expr });
  }

  if stream.keyword("break") {
    stream.skip(";")?;
    return Ok(Stmt::Break { loc });
  }

  if stream.keyword("continue") {
    stream.skip(";")?;
    return Ok(Stmt::Continue { loc });
  }

  if stream.keyword("if") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let then_branch = Some(Box::new(parse_stmt(stream)?));
    let else_branch = if stream.keyword("else") {
      Some(Box::new(parse_stmt(stream)?))
    } else {
      None
    };
    return Ok(Stmt::If {
      cond,
      then_branch,
      else_branch,
    });
  }

  if stream.keyword("while") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let body = Some(Box::new(parse_stmt(stream)?));
    return Ok(Stmt::While { cond, body });
  }

  if stream.keyword("for") {
    stream.skip("(")?;
    let init = if stream.peek_keyword("int") {
      ForInit::Decl(parse_decl(stream)?)
    } else {
      let expr = parse_expr(stream)?;
      stream.skip(";")?;
      ForInit::Expr(expr)
    };
    let check = parse_expr(stream)?;
    stream.skip(";")?;
    let update = parse_expr(stream)?;
    stream.skip(")")?;
    let body = Some(Box::new(parse_stmt(stream)?));
    return Ok(Stmt::For {
      init,
      check,
      update,
      body,
    });
  }

  if stream.keyword("switch") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    if !stream.peek_punct("{") {
      return Err(CompileError::at(
        stream.source,
        stream.loc(),
        "expected a compound statement after switch",
      ));
    }
    let body = Some(Box::new(parse_stmt(stream)?));
    return Ok(Stmt::Switch { cond, body, loc });
  }

  if stream.keyword("case") {
    let value = parse_expr(stream)?;
    stream.skip(":")?;
    let body = parse_case_body(stream)?;
    return Ok(Stmt::Case {
      value: Some(value),
      body,
      loc,
    });
  }

  if stream.keyword("default") {
    stream.skip(":")?;
    let body = parse_case_body(stream)?;
    return Ok(Stmt::Case {
      value: None,
      body,
      loc,
    });
  }

  if stream.equal("{") {
    let (decls, stmts) = parse_block_body(stream)?;
    stream.skip("}")?;
    return Ok(Stmt::Block { decls, stmts });
  }

  if stream.equal(";") {
    return Ok(Stmt::Expr { expr: None });
  }

  let expr = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Stmt::Expr { expr: Some(expr) })
}

/// The statement owned by a case label is optional: a label may sit
/// directly in front of the next label or the closing brace.
fn parse_case_body(stream: &mut TokenStream) -> CompileResult<Option<Box<Stmt>>> {
  if stream.is_eof()
    || stream.peek_punct("}")
    || stream.peek_keyword("case")
    || stream.peek_keyword("default")
  {
    return Ok(None);
  }
  Ok(Some(Box::new(parse_stmt(stream)?)))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<AstNode> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let node = parse_equality(stream)?;

  if stream.peek_punct("=") {
    let eq_loc = stream.loc();
    stream.skip("=")?;
    let AstNode::Var { name, loc } = node else {
      return Err(CompileError::at(
        stream.source,
        eq_loc,
        "left-hand side of assignment is not assignable",
      ));
    };
    let rhs = parse_assign(stream)?;
    return Ok(AstNode::assign(name, loc, rhs));
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_relational(stream)?;

  loop {
    let op_str = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, stream.source))
    {
      Some(symbol @ "==") => symbol,
      Some(symbol @ "!=") => symbol,
      _ => break,
    };

    let op = match op_str {
      "==" => BinaryOp::Eq,
      "!=" => BinaryOp::Ne,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_relational(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_add(stream)?;

  loop {
    let op_str = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, stream.source))
    {
      Some(symbol @ "<") => symbol,
      Some(symbol @ "<=") => symbol,
      Some(symbol @ ">") => symbol,
      Some(symbol @ ">=") => symbol,
      _ => break,
    };

    let op = match op_str {
      "<" => BinaryOp::Lt,
      "<=" => BinaryOp::Le,
      ">" => BinaryOp::Gt,
      ">=" => BinaryOp::Ge,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_add(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_mul(stream)?;

  loop {
    let op_str = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, stream.source))
    {
      Some(symbol @ "+") => symbol,
      Some(symbol @ "-") => symbol,
      _ => break,
    };

    let op = match op_str {
      "+" => BinaryOp::Add,
      "-" => BinaryOp::Sub,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_mul(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<AstNode> {
  let mut node = parse_unary(stream)?;

  loop {
    let op_str = match stream
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, stream.source))
    {
      Some(symbol @ "*") => symbol,
      Some(symbol @ "/") => symbol,
      _ => break,
    };

    let op = match op_str {
      "*" => BinaryOp::Mul,
      "/" => BinaryOp::Div,
      _ => unreachable!(),
    };

    stream.skip(op_str)?;
    let rhs = parse_unary(stream)?;
    node = AstNode::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  if stream.equal("+") {
    let operand = parse_unary(stream)?;
    return Ok(operand);
  }

  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(AstNode::unary_neg(operand));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<AstNode> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    Ok(node)
  } else {
    if matches!(
      stream.peek().map(|token| token.kind),
      Some(TokenKind::Ident)
    ) {
      let (name, loc) = stream.get_ident()?;
      return Ok(AstNode::var(name, loc));
    }

    let (value, _) = stream.get_number()?;
    Ok(AstNode::number(value))
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn current(&self) -> Option<&Token> {
    self.peek()
  }

  /// Byte offset of the current token, for anchoring diagnostics.
  fn loc(&self) -> usize {
    self
      .peek()
      .map(|token| token.loc)
      .unwrap_or(self.source.len())
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Non-consuming form of `equal`.
  fn peek_punct(&self, op: &str) -> bool {
    matches!(self.peek(), Some(token)
      if token.kind == TokenKind::Punctuator
        && token.len == op.len()
        && token_text(token, self.source) == op)
  }

  /// Consume the current token if it is the given keyword.
  fn keyword(&mut self, kw: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword
      && token_text(token, self.source) == kw
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn peek_keyword(&self, kw: &str) -> bool {
    matches!(self.peek(), Some(token)
      if token.kind == TokenKind::Keyword && token_text(token, self.source) == kw)
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let (loc, got) = match self.tokens.get(self.pos) {
        Some(token) => (token.loc, describe_token(Some(token), self.source)),
        None => (self.source.len(), "EOF".to_string()),
      };
      Err(CompileError::at(
        self.source,
        loc,
        format!("expected \"{s}\", but got \"{got}\""),
      ))
    }
  }

  fn skip_keyword(&mut self, kw: &str) -> CompileResult<()> {
    if self.keyword(kw) {
      Ok(())
    } else {
      let (loc, got) = match self.tokens.get(self.pos) {
        Some(token) => (token.loc, describe_token(Some(token), self.source)),
        None => (self.source.len(), "EOF".to_string()),
      };
      Err(CompileError::at(
        self.source,
        loc,
        format!("expected \"{kw}\", but got \"{got}\""),
      ))
    }
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if self.pos >= self.tokens.len() {
      return Err(CompileError::at(
        self.source,
        self.source.len(),
        "expected a number, but reached end of input",
      ));
    }

    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    let Some(token) = self.tokens.get(self.pos) else {
      return Err(CompileError::at(
        self.source,
        self.source.len(),
        "unexpected end of input while parsing number",
      ));
    };
    let got = describe_token(Some(token), self.source);
    Err(CompileError::at(
      self.source,
      token.loc,
      format!("expected a number, but got \"{got}\""),
    ))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    let Some(token) = self.tokens.get(self.pos) else {
      return Err(CompileError::at(
        self.source,
        self.source.len(),
        "unexpected end of input while parsing identifier",
      ));
    };
    let got = describe_token(Some(token), self.source);
    Err(CompileError::at(
      self.source,
      token.loc,
      format!("expected an identifier, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
