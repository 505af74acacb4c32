//! Code generation: lower the statement tree into MIPS-like assembly.
//!
//! The emitter is a single recursive walk. Every statement kind knows how
//! to translate itself given a destination name; conditions land in
//! freshly named locations and structured control flow becomes
//! `beq`/`bne`/`j` against labels handed out by a per-compilation
//! allocator. Destinations are symbolic names rather than physical
//! registers – register allocation is someone else's problem.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::parser::{AstNode, BinaryOp, DeclList, ForInit, Program, Stmt, StmtList, VarDecl};

/// Hands out names guaranteed unique within one compilation run.
///
/// Labels and temporaries draw from the same counter, so no two names it
/// produces ever collide, whatever their prefixes. One allocator lives
/// inside each [`Codegen`], keeping independent compilations independent.
#[derive(Debug, Default)]
pub struct Labels {
  counter: usize,
}

impl Labels {
  pub fn fresh(&mut self, prefix: &str) -> String {
    let name = format!("{prefix}{}", self.counter);
    self.counter += 1;
    name
  }
}

/// Jump targets made visible to the statements of an enclosing construct.
/// Loops provide both targets; a switch only catches `break`, so
/// `continue` has to search past it for the innermost loop.
#[derive(Debug)]
enum Frame {
  Loop { next: String, exit: String },
  Switch { exit: String },
}

/// Emit assembly for a whole program: a `main` entry wrapping the lowered
/// statement tree.
pub fn generate(program: &Program, source: &str) -> CompileResult<String> {
  let mut codegen = Codegen::new(source);
  codegen.asm.push_str(".globl main\n");
  codegen.emit_label("main");
  let result = codegen.names.fresh("result");
  codegen.lower_stmt(&program.body, &result)?;
  codegen.emit("jr $31");
  Ok(codegen.asm)
}

struct Codegen<'a> {
  source: &'a str,
  asm: String,
  names: Labels,
  frames: Vec<Frame>,
  scopes: Vec<HashMap<String, String>>,
}

impl<'a> Codegen<'a> {
  fn new(source: &'a str) -> Self {
    Self {
      source,
      asm: String::new(),
      names: Labels::default(),
      frames: Vec::new(),
      scopes: vec![HashMap::new()],
    }
  }

  fn emit(&mut self, line: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(line);
    self.asm.push('\n');
  }

  fn emit_label(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  /// Lower one statement. `dest` names the location where the caller
  /// expects a result; constructs with no natural result zero it or
  /// leave it untouched.
  fn lower_stmt(&mut self, stmt: &Stmt, dest: &str) -> CompileResult<()> {
    match stmt {
      Stmt::Expr { expr } => {
        // The statement exists only for the expression's side effects;
        // its value goes to a scratch name and is never read again.
        if let Some(expr) = expr {
          let scratch = self.names.fresh("tmp");
          self.lower_expr(expr, &scratch)?;
        }
        Ok(())
      }

      Stmt::Return { expr } => {
        let value = self.names.fresh("exp");
        self.lower_expr(expr, &value)?;
        self.emit(&format!("add $2 $0 {value}"));
        Ok(())
      }

      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let condition = self.names.fresh("condition");
        self.lower_expr(cond, &condition)?;
        let exit = self.names.fresh("exit");
        if let Some(else_branch) = else_branch {
          let else_label = self.names.fresh("else");
          self.emit(&format!("beq {condition} $0 {else_label}"));
          self.lower_body(then_branch, dest)?;
          self.emit(&format!("j {exit}"));
          self.emit_label(&else_label);
          self.lower_stmt(else_branch, dest)?;
        } else {
          self.emit(&format!("beq {condition} $0 {exit}"));
          self.lower_body(then_branch, dest)?;
        }
        self.emit_label(&exit);
        Ok(())
      }

      Stmt::While { cond, body } => {
        let condition = self.names.fresh("condition");
        self.lower_expr(cond, &condition)?;
        let exit = self.names.fresh("exit");
        self.emit(&format!("beq {condition} $0 {exit}"));
        let start = self.names.fresh("start");
        self.emit_label(&start);
        let next = self.names.fresh("next");
        self.frames.push(Frame::Loop {
          next: next.clone(),
          exit: exit.clone(),
        });
        self.lower_body(body, dest)?;
        self.frames.pop();
        self.emit_label(&next);
        // Re-evaluated on every iteration, never cached.
        self.lower_expr(cond, &condition)?;
        self.emit(&format!("bne {condition} $0 {start}"));
        self.emit_label(&exit);
        self.emit(&format!("add {dest} $0 $0"));
        Ok(())
      }

      Stmt::For {
        init,
        check,
        update,
        body,
      } => {
        // The init clause runs once, outside the repeating region; a
        // declaration form scopes to the loop.
        self.scopes.push(HashMap::new());
        match init {
          ForInit::Decl(decl) => self.lower_decl(decl)?,
          ForInit::Expr(expr) => {
            let scratch = self.names.fresh("tmp");
            self.lower_expr(expr, &scratch)?;
          }
        }
        let condition = self.names.fresh("condition");
        self.lower_expr(check, &condition)?;
        let exit = self.names.fresh("exit");
        self.emit(&format!("beq {condition} $0 {exit}"));
        let start = self.names.fresh("start");
        self.emit_label(&start);
        let next = self.names.fresh("next");
        self.frames.push(Frame::Loop {
          next: next.clone(),
          exit: exit.clone(),
        });
        self.lower_body(body, dest)?;
        self.frames.pop();
        self.emit_label(&next);
        let scratch = self.names.fresh("tmp");
        self.lower_expr(update, &scratch)?;
        self.lower_expr(check, &condition)?;
        self.emit(&format!("bne {condition} $0 {start}"));
        self.emit_label(&exit);
        self.emit(&format!("add {dest} $0 $0"));
        self.scopes.pop();
        Ok(())
      }

      Stmt::Block { decls, stmts } => {
        self.scopes.push(HashMap::new());
        if let Some(decls) = decls {
          self.lower_decl_list(decls)?;
        }
        if let Some(stmts) = stmts {
          self.lower_stmt_list(stmts, dest)?;
        }
        self.scopes.pop();
        Ok(())
      }

      Stmt::Break { loc } => {
        let target = match self.frames.last() {
          Some(Frame::Loop { exit, .. }) | Some(Frame::Switch { exit }) => exit.clone(),
          None => {
            return Err(CompileError::at(
              self.source,
              *loc,
              "jump statement outside loop",
            ));
          }
        };
        self.emit(&format!("j {target}"));
        Ok(())
      }

      Stmt::Continue { loc } => {
        // A switch catches break but not continue.
        let target = self.frames.iter().rev().find_map(|frame| match frame {
          Frame::Loop { next, .. } => Some(next.clone()),
          Frame::Switch { .. } => None,
        });
        let Some(target) = target else {
          return Err(CompileError::at(
            self.source,
            *loc,
            "jump statement outside loop",
          ));
        };
        self.emit(&format!("j {target}"));
        Ok(())
      }

      Stmt::Case { loc, .. } => Err(CompileError::at(
        self.source,
        *loc,
        "case label outside switch",
      )),

      Stmt::Switch { cond, body, loc } => self.lower_switch(cond, body.as_deref(), *loc, dest),
    }
  }

  /// Evaluate the scrutinee once, branch to the first matching case in
  /// source order, then emit the body linearly so control falls through
  /// from one case into the next until a break jumps to the exit.
  fn lower_switch(
    &mut self,
    cond: &AstNode,
    body: Option<&Stmt>,
    loc: usize,
    dest: &str,
  ) -> CompileResult<()> {
    let scrutinee = self.names.fresh("switch");
    self.lower_expr(cond, &scrutinee)?;
    let exit = self.names.fresh("exit");

    let Some(body) = body else {
      self.emit_label(&exit);
      self.emit(&format!("add {dest} $0 $0"));
      return Ok(());
    };
    let Stmt::Block { decls, stmts } = body else {
      return Err(CompileError::at(
        self.source,
        loc,
        "switch body must be a compound statement",
      ));
    };

    self.scopes.push(HashMap::new());
    if let Some(decls) = decls {
      self.lower_decl_list(decls)?;
    }

    // One label per case arm, in source order.
    let mut cases: Vec<(Option<&AstNode>, String)> = Vec::new();
    let mut default_label: Option<String> = None;
    if let Some(stmts) = stmts {
      for stmt in stmts.iter() {
        if let Stmt::Case { value, loc, .. } = stmt {
          let label = self.names.fresh("case");
          if value.is_none() {
            if default_label.is_some() {
              return Err(CompileError::at(
                self.source,
                *loc,
                "multiple default labels in one switch",
              ));
            }
            default_label = Some(label.clone());
          }
          cases.push((value.as_ref(), label));
        }
      }
    }

    // Dispatch chain: compare against each case value in source order,
    // falling back to the default label, or straight past the body.
    for (value, label) in &cases {
      if let Some(value) = value {
        let scratch = self.names.fresh("tmp");
        self.lower_expr(value, &scratch)?;
        self.emit(&format!("beq {scrutinee} {scratch} {label}"));
      }
    }
    self.emit(&format!("j {}", default_label.as_deref().unwrap_or(&exit)));

    self.frames.push(Frame::Switch { exit: exit.clone() });
    let mut pending = cases.iter();
    if let Some(stmts) = stmts {
      for stmt in stmts.iter() {
        if let Stmt::Case { body, .. } = stmt {
          // Pairs up with the dispatch pass: both walk the same list.
          if let Some((_, label)) = pending.next() {
            let label = label.clone();
            self.emit_label(&label);
          }
          if let Some(body) = body {
            self.lower_stmt(body, dest)?;
          }
        } else {
          self.lower_stmt(stmt, dest)?;
        }
      }
    }
    self.frames.pop();
    self.scopes.pop();

    self.emit_label(&exit);
    self.emit(&format!("add {dest} $0 $0"));
    Ok(())
  }

  /// An absent body is a valid no-op.
  fn lower_body(&mut self, body: &Option<Box<Stmt>>, dest: &str) -> CompileResult<()> {
    if let Some(body) = body {
      self.lower_stmt(body, dest)?;
    }
    Ok(())
  }

  /// Head first, then the tail, with the same destination throughout.
  fn lower_stmt_list(&mut self, list: &StmtList, dest: &str) -> CompileResult<()> {
    self.lower_stmt(&list.stmt, dest)?;
    if let Some(next) = list.next.as_deref() {
      self.lower_stmt_list(next, dest)?;
    }
    Ok(())
  }

  fn lower_decl_list(&mut self, list: &DeclList) -> CompileResult<()> {
    self.lower_decl(&list.decl)?;
    if let Some(next) = list.next.as_deref() {
      self.lower_decl_list(next)?;
    }
    Ok(())
  }

  /// Bind the name to fresh storage; an initialiser lowers straight into
  /// it, otherwise the declaration emits nothing.
  fn lower_decl(&mut self, decl: &VarDecl) -> CompileResult<()> {
    let register = self.declare(decl)?;
    if let Some(init) = &decl.init {
      self.lower_expr(init, &register)?;
    }
    Ok(())
  }

  fn declare(&mut self, decl: &VarDecl) -> CompileResult<String> {
    let Some(scope) = self.scopes.last_mut() else {
      return Err(CompileError::at(
        self.source,
        decl.loc,
        "internal error: no active scope",
      ));
    };
    if scope.contains_key(&decl.name) {
      return Err(CompileError::at(
        self.source,
        decl.loc,
        format!("redefinition of \"{}\"", decl.name),
      ));
    }
    let register = self.names.fresh("var");
    scope.insert(decl.name.clone(), register.clone());
    Ok(register)
  }

  /// Innermost binding wins: inner scopes shadow outer ones.
  fn lookup(&self, name: &str) -> Option<String> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).cloned())
  }

  /// Lower an expression so that `dest` holds its value once control
  /// reaches the next emitted instruction.
  fn lower_expr(&mut self, node: &AstNode, dest: &str) -> CompileResult<()> {
    match node {
      AstNode::Num { value } => {
        self.emit(&format!("li {dest} {value}"));
        Ok(())
      }

      AstNode::Var { name, loc } => {
        let register = self.lookup(name).ok_or_else(|| {
          CompileError::at(
            self.source,
            *loc,
            format!("use of undeclared variable \"{name}\""),
          )
        })?;
        self.emit(&format!("add {dest} $0 {register}"));
        Ok(())
      }

      AstNode::Neg { operand } => {
        let scratch = self.names.fresh("tmp");
        self.lower_expr(operand, &scratch)?;
        self.emit(&format!("sub {dest} $0 {scratch}"));
        Ok(())
      }

      AstNode::Binary { op, lhs, rhs } => {
        let left = self.names.fresh("tmp");
        self.lower_expr(lhs, &left)?;
        let right = self.names.fresh("tmp");
        self.lower_expr(rhs, &right)?;
        let mnemonic = match op {
          BinaryOp::Add => "add",
          BinaryOp::Sub => "sub",
          BinaryOp::Mul => "mul",
          BinaryOp::Div => "div",
          BinaryOp::Eq => "seq",
          BinaryOp::Ne => "sne",
          BinaryOp::Lt => "slt",
          BinaryOp::Le => "sle",
          BinaryOp::Gt => "sgt",
          BinaryOp::Ge => "sge",
        };
        self.emit(&format!("{mnemonic} {dest} {left} {right}"));
        Ok(())
      }

      AstNode::Assign { name, loc, rhs } => {
        let register = self.lookup(name).ok_or_else(|| {
          CompileError::at(
            self.source,
            *loc,
            format!("use of undeclared variable \"{name}\""),
          )
        })?;
        self.lower_expr(rhs, &register)?;
        // Assignment is itself an expression; its value is the stored one.
        self.emit(&format!("add {dest} $0 {register}"));
        Ok(())
      }
    }
  }
}
