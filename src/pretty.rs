//! Diagnostic pretty-printer: renders the statement tree back as readable
//! text. The traversal mirrors the codegen walk structurally but shares
//! nothing with it; output depends only on the tree, so printing the same
//! tree twice yields byte-identical text.

use std::fmt::{self, Write};

use crate::parser::{AstNode, BinaryOp, DeclList, ForInit, Program, Stmt, StmtList, VarDecl};

/// Render a whole program into a fresh string.
pub fn print_program(program: &Program) -> String {
  let mut out = String::new();
  // Writing into a String cannot fail.
  let _ = write_program(program, &mut out);
  out
}

/// The implicit top-level block prints without braces, the way it was
/// written.
pub fn write_program<W: Write>(program: &Program, out: &mut W) -> fmt::Result {
  match &program.body {
    Stmt::Block { decls, stmts } => {
      if let Some(decls) = decls {
        write_decl_list(decls, out)?;
      }
      if let Some(stmts) = stmts {
        write_stmt_list(stmts, out)?;
      }
      Ok(())
    }
    other => write_stmt(other, out),
  }
}

pub fn write_stmt<W: Write>(stmt: &Stmt, out: &mut W) -> fmt::Result {
  match stmt {
    Stmt::Expr { expr } => {
      if let Some(expr) = expr {
        write_expr(expr, out)?;
      }
      writeln!(out, ";")
    }

    Stmt::Return { expr } => {
      write!(out, "return ")?;
      write_expr(expr, out)?;
      writeln!(out, ";")
    }

    Stmt::If {
      cond,
      then_branch,
      else_branch,
    } => {
      write!(out, "if ( ")?;
      write_expr(cond, out)?;
      write!(out, " ) ")?;
      write_body(then_branch, out)?;
      if let Some(else_branch) = else_branch {
        write!(out, "else ")?;
        write_stmt(else_branch, out)?;
      }
      writeln!(out)
    }

    Stmt::While { cond, body } => {
      write!(out, "while ( ")?;
      write_expr(cond, out)?;
      write!(out, " ) ")?;
      write_body(body, out)?;
      writeln!(out)
    }

    Stmt::For {
      init,
      check,
      update,
      body,
    } => {
      write!(out, "for ( ")?;
      match init {
        ForInit::Decl(decl) => write_decl(decl, out)?,
        ForInit::Expr(expr) => write_expr(expr, out)?,
      }
      write!(out, " ; ")?;
      write_expr(check, out)?;
      write!(out, " ; ")?;
      write_expr(update, out)?;
      writeln!(out, " ) ")?;
      write_body(body, out)
    }

    Stmt::Block { decls, stmts } => {
      writeln!(out, "{{")?;
      if let Some(decls) = decls {
        write_decl_list(decls, out)?;
      }
      if let Some(stmts) = stmts {
        write_stmt_list(stmts, out)?;
      }
      writeln!(out, "}}")
    }

    Stmt::Break { .. } => writeln!(out, "break;"),

    Stmt::Continue { .. } => writeln!(out, "continue;"),

    Stmt::Case { value, body, .. } => {
      match value {
        Some(value) => {
          write!(out, "case ")?;
          write_expr(value, out)?;
          write!(out, ": ")?;
        }
        None => write!(out, "default: ")?,
      }
      if let Some(body) = body {
        write_stmt(body, out)?;
      }
      writeln!(out)
    }

    Stmt::Switch { cond, body, .. } => {
      write!(out, "switch ( ")?;
      write_expr(cond, out)?;
      write!(out, " ) ")?;
      write_body(body, out)?;
      writeln!(out)
    }
  }
}

/// An absent body prints as the empty statement.
fn write_body<W: Write>(body: &Option<Box<Stmt>>, out: &mut W) -> fmt::Result {
  match body {
    Some(body) => write_stmt(body, out),
    None => writeln!(out, ";"),
  }
}

fn write_stmt_list<W: Write>(list: &StmtList, out: &mut W) -> fmt::Result {
  write_stmt(&list.stmt, out)?;
  if let Some(next) = list.next.as_deref() {
    write_stmt_list(next, out)?;
  }
  Ok(())
}

fn write_decl_list<W: Write>(list: &DeclList, out: &mut W) -> fmt::Result {
  write_decl(&list.decl, out)?;
  writeln!(out, ";")?;
  if let Some(next) = list.next.as_deref() {
    write_decl_list(next, out)?;
  }
  Ok(())
}

/// No trailing terminator: a declaration reads the same inside a block
/// (where the caller adds `;`) and in a for-loop's init clause.
fn write_decl<W: Write>(decl: &VarDecl, out: &mut W) -> fmt::Result {
  write!(out, "int {}", decl.name)?;
  if let Some(init) = &decl.init {
    write!(out, " = ")?;
    write_expr(init, out)?;
  }
  Ok(())
}

pub fn write_expr<W: Write>(expr: &AstNode, out: &mut W) -> fmt::Result {
  match expr {
    AstNode::Num { value } => write!(out, "{value}"),

    AstNode::Var { name, .. } => write!(out, "{name}"),

    AstNode::Neg { operand } => {
      write!(out, "-")?;
      write_expr(operand, out)
    }

    AstNode::Binary { op, lhs, rhs } => {
      write!(out, "(")?;
      write_expr(lhs, out)?;
      write!(out, " {} ", op_text(*op))?;
      write_expr(rhs, out)?;
      write!(out, ")")
    }

    AstNode::Assign { name, rhs, .. } => {
      write!(out, "{name} = ")?;
      write_expr(rhs, out)
    }
  }
}

fn op_text(op: BinaryOp) -> &'static str {
  match op {
    BinaryOp::Add => "+",
    BinaryOp::Sub => "-",
    BinaryOp::Mul => "*",
    BinaryOp::Div => "/",
    BinaryOp::Eq => "==",
    BinaryOp::Ne => "!=",
    BinaryOp::Lt => "<",
    BinaryOp::Le => "<=",
    BinaryOp::Gt => ">",
    BinaryOp::Ge => ">=",
  }
}
