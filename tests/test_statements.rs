// ==========================================================================
// Statement lowering tests – sequences, blocks, declarations, return
// ==========================================================================

use mipscc::parser::{ForInit, Stmt, StmtList};
use mipscc::{compile, parser, tokenizer};

/// Helper: full pipeline from source to the emitted assembly string.
fn lower(src: &str) -> String {
  compile(src).expect("compilation should succeed")
}

/// Helper: parse without lowering, for shape checks.
fn parse(src: &str) -> parser::Program {
  let tokens = tokenizer::tokenize(src).expect("tokenizing should succeed");
  parser::parse(tokens, src).expect("parsing should succeed")
}

// ==========================================================================
// Sequences and the empty statement
// ==========================================================================

#[test]
fn sequences_lower_in_declared_order() {
  let asm = lower("1; 2; 3;");
  let constants: Vec<&str> = asm
    .lines()
    .map(str::trim)
    .filter(|line| line.starts_with("li tmp"))
    .filter_map(|line| line.split_whitespace().last())
    .collect();
  assert_eq!(constants, ["1", "2", "3"]);
}

#[test]
fn empty_statement_emits_nothing() {
  let asm = lower(";");
  let lines: Vec<&str> = asm.lines().collect();
  assert_eq!(lines, [".globl main", "main:", "    jr $31"]);
}

#[test]
fn expression_statement_value_goes_to_a_scratch_name() {
  let asm = lower("1 + 2;");
  assert!(asm.contains("add tmp1 tmp2 tmp3"), "unexpected output:\n{asm}");
}

// ==========================================================================
// Return
// ==========================================================================

#[test]
fn return_moves_its_value_into_the_result_register() {
  let asm = lower("return 42;");
  assert!(asm.contains("li exp1 42"));
  assert!(asm.contains("add $2 $0 exp1"));
}

#[test]
fn return_lowers_its_expression_before_the_move() {
  let asm = lower("int x = 5; return x + 1;");
  let compute = asm
    .lines()
    .position(|line| line.trim().starts_with("add exp"))
    .expect("return expression must be lowered");
  let mv = asm
    .lines()
    .position(|line| line.trim().starts_with("add $2 $0 exp"))
    .expect("return must move into $2");
  assert!(compute < mv);
}

// ==========================================================================
// Declarations and scoping
// ==========================================================================

#[test]
fn declaration_with_initialiser_lowers_into_its_storage() {
  let asm = lower("int x = 7;");
  assert!(asm.contains("li var1 7"), "unexpected output:\n{asm}");
}

#[test]
fn declaration_without_initialiser_emits_no_code() {
  let asm = lower("int x;");
  let lines: Vec<&str> = asm.lines().collect();
  assert_eq!(lines, [".globl main", "main:", "    jr $31"]);
}

#[test]
fn inner_scopes_shadow_and_restore_on_exit() {
  let asm = lower("int x = 1; { int x = 2; } x;");
  let last_read = asm
    .lines()
    .map(str::trim)
    .filter(|line| line.starts_with("add tmp"))
    .next_back()
    .expect("expected a read of x");
  assert!(
    last_read.ends_with("var1"),
    "outer binding must be restored, got: {last_read}"
  );
}

#[test]
fn assignment_reads_back_the_stored_value() {
  let asm = lower("int x; x = 5;");
  let store = asm.lines().position(|line| line.trim() == "li var1 5");
  let read = asm
    .lines()
    .position(|line| line.trim() == "add tmp2 $0 var1");
  assert!(store.is_some() && read.is_some() && store < read);
}

#[test]
fn use_of_undeclared_variable_is_an_error() {
  let err = compile("x = 1;").expect_err("must not compile");
  assert!(err.to_string().contains("undeclared variable"));
}

#[test]
fn redefinition_in_the_same_scope_is_an_error() {
  let err = compile("{ int x; int x; }").expect_err("must not compile");
  assert!(err.to_string().contains("redefinition"));
}

// ==========================================================================
// Parsing shapes
// ==========================================================================

#[test]
fn for_init_keeps_its_two_forms_apart() {
  let with_decl = parse("for (int i = 0; i < 1; i = i + 1) ;");
  let with_expr = parse("int i; for (i = 0; i < 1; i = i + 1) ;");

  let for_stmt = |program: &parser::Program| -> Stmt {
    let Stmt::Block { stmts, .. } = &program.body else {
      panic!("program body should be a block");
    };
    let list: &StmtList = stmts.as_deref().expect("expected statements");
    list
      .iter()
      .find(|stmt| matches!(stmt, Stmt::For { .. }))
      .expect("expected a for loop")
      .clone()
  };

  assert!(matches!(
    for_stmt(&with_decl),
    Stmt::For {
      init: ForInit::Decl(_),
      ..
    }
  ));
  assert!(matches!(
    for_stmt(&with_expr),
    Stmt::For {
      init: ForInit::Expr(_),
      ..
    }
  ));
}

#[test]
fn default_case_has_no_value() {
  let program = parse("switch (1) { case 1: ; default: ; }");
  let Stmt::Block { stmts, .. } = &program.body else {
    panic!("program body should be a block");
  };
  let Some(Stmt::Switch { body, .. }) = stmts.as_deref().map(|list| &list.stmt) else {
    panic!("expected a switch");
  };
  let Some(Stmt::Block { stmts, .. }) = body.as_deref() else {
    panic!("switch body should be a block");
  };
  let values: Vec<bool> = stmts
    .as_deref()
    .expect("expected case labels")
    .iter()
    .filter_map(|stmt| match stmt {
      Stmt::Case { value, .. } => Some(value.is_some()),
      _ => None,
    })
    .collect();
  assert_eq!(values, [true, false]);
}

#[test]
fn assignment_to_a_non_variable_is_rejected_at_parse_time() {
  let err = compile("1 = 2;").expect_err("must not compile");
  assert!(err.to_string().contains("not assignable"));
}

#[test]
fn switch_requires_a_compound_body() {
  let err = compile("switch (1) ;").expect_err("must not compile");
  assert!(err.to_string().contains("compound statement"));
}

#[test]
fn declarations_precede_statements_within_a_block() {
  let asm = lower("{ int a = 1; int b = 2; a + b; }");
  let decl_b = asm.lines().position(|line| line.trim() == "li var2 2");
  let use_a = asm
    .lines()
    .position(|line| line.trim().starts_with("add tmp") && line.trim().ends_with("var1"));
  assert!(decl_b.is_some() && use_a.is_some() && decl_b < use_a);
}
