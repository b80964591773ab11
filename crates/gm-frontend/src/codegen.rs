//! Lowers a parsed [`crate::ast::Program`] into a [`gm_format::CompiledLibrary`].
//!
//! Top-level function declarations get sequential ids starting at 1; the
//! synthetic root function (id 0) runs first, wiring each declared function
//! into the global table before executing the remaining top-level
//! statements. A function's locals are resolved by a pre-scan over its body
//! (parameters first, then each name a `local` declaration or a bare
//! assignment introduces, in first-occurrence order) so `num_locals` is
//! known before a single instruction is emitted.

use crate::ast::{BinOp, Expr, FunctionDecl, Program, Stmt, TopItem, UnOp};
use gm_format::{CompiledFunction, CompiledLibrary, FunctionDebugInfo};
use gm_io::Endian;
use gm_vm::OpCode;
use std::collections::HashMap;

/// Deduplicating blob of NUL-terminated strings; a string's "offset" is its
/// start index into the blob, matching how `gm-format` addresses strings.
struct StringPool {
    buf: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringPool {
    fn new() -> Self {
        Self { buf: Vec::new(), offsets: HashMap::new() }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&off) = self.offsets.get(s) {
            return off;
        }
        let off = self.buf.len() as u32;
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self.offsets.insert(s.to_owned(), off);
        off
    }
}

/// Per-function local-slot table; parameters occupy the first `num_params`
/// slots, matching the call convention's base-relative layout.
struct Locals {
    names: Vec<String>,
}

impl Locals {
    fn resolve(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n == name).map(|i| i as u32)
    }

    fn declare(&mut self, name: &str) -> u32 {
        match self.resolve(name) {
            Some(idx) => idx,
            None => {
                self.names.push(name.to_owned());
                (self.names.len() - 1) as u32
            }
        }
    }
}

fn collect_locals(names: &mut Vec<String>, stmts: &[Stmt]) {
    for stmt in stmts {
        match stmt {
            Stmt::LocalDecl { name, .. } | Stmt::Assign { name, .. } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Stmt::If { then_branch, else_branch, .. } => {
                collect_locals(names, then_branch);
                collect_locals(names, else_branch);
            }
            Stmt::While { body, .. } => collect_locals(names, body),
            Stmt::GlobalDecl { .. } | Stmt::Return { .. } | Stmt::ExprStmt { .. } => {}
        }
    }
}

/// Accumulates bytecode, debug line markers and a running stack-depth high
/// watermark for one function.
struct Emitter {
    code: Vec<u8>,
    lines: Vec<(u32, u32)>,
    last_line: u32,
    depth: i32,
    max_depth: i32,
    endian: Endian,
}

impl Emitter {
    fn new(endian: Endian) -> Self {
        Self { code: Vec::new(), lines: Vec::new(), last_line: 0, depth: 0, max_depth: 0, endian }
    }

    fn addr(&self) -> u32 {
        self.code.len() as u32
    }

    fn note(&mut self, delta: i32) {
        self.depth += delta;
        if self.depth > self.max_depth {
            self.max_depth = self.depth;
        }
    }

    fn mark_line(&mut self, line: u32) {
        if line != self.last_line || self.lines.is_empty() {
            self.lines.push((self.addr(), line));
            self.last_line = line;
        }
    }

    fn operand_bytes(&self, value: i32) -> [u8; 4] {
        match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn emit0(&mut self, op: OpCode) {
        self.code.push(op as u8);
    }

    fn emit1(&mut self, op: OpCode, operand: i32) {
        self.code.push(op as u8);
        self.code.extend_from_slice(&self.operand_bytes(operand));
    }

    /// Emits a branch with a placeholder operand, returning the address of
    /// its opcode byte so the caller can patch it once the target is known.
    fn emit_branch(&mut self, op: OpCode) -> usize {
        let pos = self.code.len();
        self.emit1(op, 0);
        pos
    }

    fn patch_branch(&mut self, pos: usize, target: u32) {
        let bytes = self.operand_bytes(target as i32);
        self.code[pos + 1..pos + 5].copy_from_slice(&bytes);
    }
}

fn binop_opcode(op: &BinOp) -> OpCode {
    match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::Mod => OpCode::Mod,
        BinOp::Eq => OpCode::Ceq,
        BinOp::NotEq => OpCode::Cne,
        BinOp::Lt => OpCode::Clt,
        BinOp::Le => OpCode::Cle,
        BinOp::Gt => OpCode::Cgt,
        BinOp::Ge => OpCode::Cge,
        BinOp::And => OpCode::And,
        BinOp::Or => OpCode::Or,
    }
}

fn compile_expr(locals: &Locals, pool: &mut StringPool, em: &mut Emitter, expr: &Expr) {
    match expr {
        Expr::Int(v) => {
            em.emit1(OpCode::PushInt, *v);
            em.note(1);
        }
        Expr::Float(v) => {
            em.emit1(OpCode::PushFp, v.to_bits() as i32);
            em.note(1);
        }
        Expr::Str(s) => {
            let off = pool.intern(s);
            em.emit1(OpCode::PushStr, off as i32);
            em.note(1);
        }
        Expr::Null => {
            em.emit0(OpCode::PushNull);
            em.note(1);
        }
        Expr::Ident(name) => {
            match locals.resolve(name) {
                Some(idx) => em.emit1(OpCode::GetLocal, idx as i32),
                None => {
                    let off = pool.intern(name);
                    em.emit1(OpCode::GetGlobal, off as i32);
                }
            }
            em.note(1);
        }
        Expr::Unary(op, inner) => {
            compile_expr(locals, pool, em, inner);
            em.emit0(match op {
                UnOp::Neg => OpCode::Neg,
                UnOp::Not => OpCode::Not,
            });
        }
        Expr::Binary(op, lhs, rhs) => {
            compile_expr(locals, pool, em, lhs);
            compile_expr(locals, pool, em, rhs);
            em.emit0(binop_opcode(op));
            em.note(-1);
        }
        Expr::Call(name, args) => {
            let off = pool.intern(name);
            em.emit1(OpCode::GetGlobal, off as i32); // callee
            em.note(1);
            em.emit0(OpCode::PushNull); // this
            em.note(1);
            for arg in args {
                compile_expr(locals, pool, em, arg);
            }
            em.emit1(OpCode::Call, args.len() as i32);
            em.note(1 - (args.len() as i32 + 2));
        }
    }
}

fn compile_stmt(locals: &Locals, pool: &mut StringPool, em: &mut Emitter, stmt: &Stmt) {
    match stmt {
        Stmt::GlobalDecl { name, value, line } => {
            em.mark_line(*line);
            compile_expr(locals, pool, em, value);
            let off = pool.intern(name);
            em.emit1(OpCode::SetGlobal, off as i32);
            em.note(-1);
        }
        Stmt::LocalDecl { name, value, line } => {
            em.mark_line(*line);
            compile_expr(locals, pool, em, value);
            let idx = locals.resolve(name).expect("pre-scanned local declaration");
            em.emit1(OpCode::SetLocal, idx as i32);
            em.note(-1);
        }
        Stmt::Assign { name, value, line } => {
            em.mark_line(*line);
            compile_expr(locals, pool, em, value);
            let idx = locals.resolve(name).expect("pre-scanned assignment target");
            em.emit1(OpCode::SetLocal, idx as i32);
            em.note(-1);
        }
        Stmt::Return { value, line } => {
            em.mark_line(*line);
            match value {
                Some(expr) => compile_expr(locals, pool, em, expr),
                None => {
                    em.emit0(OpCode::PushNull);
                    em.note(1);
                }
            }
            em.emit0(OpCode::Return);
            em.note(-1);
        }
        Stmt::ExprStmt { value, line } => {
            em.mark_line(*line);
            compile_expr(locals, pool, em, value);
            em.emit0(OpCode::Pop);
            em.note(-1);
        }
        Stmt::If { cond, then_branch, else_branch, line } => {
            em.mark_line(*line);
            compile_expr(locals, pool, em, cond);
            let brz_pos = em.emit_branch(OpCode::Brz);
            em.note(-1);
            for s in then_branch {
                compile_stmt(locals, pool, em, s);
            }
            if else_branch.is_empty() {
                em.patch_branch(brz_pos, em.addr());
            } else {
                let bra_pos = em.emit_branch(OpCode::Bra);
                em.patch_branch(brz_pos, em.addr());
                for s in else_branch {
                    compile_stmt(locals, pool, em, s);
                }
                em.patch_branch(bra_pos, em.addr());
            }
        }
        Stmt::While { cond, body, line } => {
            em.mark_line(*line);
            let loop_start = em.addr();
            compile_expr(locals, pool, em, cond);
            let brz_pos = em.emit_branch(OpCode::Brz);
            em.note(-1);
            for s in body {
                compile_stmt(locals, pool, em, s);
            }
            let bra_pos = em.emit_branch(OpCode::Bra);
            em.patch_branch(bra_pos, loop_start);
            em.patch_branch(brz_pos, em.addr());
        }
    }
}

/// Compiles one function body, always appending an implicit `return null;`
/// so control can never fall off the end of the bytecode stream.
fn compile_function(
    pool: &mut StringPool,
    endian: Endian,
    id: u32,
    is_root: bool,
    name: &str,
    params: &[String],
    stmts: &[Stmt],
    prologue: &[(String, u32)],
) -> CompiledFunction {
    let mut names = params.to_vec();
    collect_locals(&mut names, stmts);
    let locals = Locals { names };

    let mut em = Emitter::new(endian);
    for (fn_name, fn_id) in prologue {
        em.emit1(OpCode::PushFn, *fn_id as i32);
        em.note(1);
        let off = pool.intern(fn_name);
        em.emit1(OpCode::SetGlobal, off as i32);
        em.note(-1);
    }
    for stmt in stmts {
        compile_stmt(&locals, pool, &mut em, stmt);
    }
    em.emit0(OpCode::PushNull);
    em.note(1);
    em.emit0(OpCode::Return);
    em.note(-1);

    let debug_name_str_off = pool.intern(name);
    let sym_str_offs: Vec<u32> = locals.names.iter().map(|n| pool.intern(n)).collect();

    CompiledFunction {
        id,
        is_root,
        num_params: params.len() as u32,
        num_locals: locals.names.len() as u32,
        max_stack: em.max_depth.max(1) as u32,
        bytecode: em.code,
        debug: Some(FunctionDebugInfo { debug_name_str_off, lines: em.lines, sym_str_offs }),
    }
}

/// Lowers a whole program into a library, ready for [`gm_format::encode`].
/// Function ids are assigned in declaration order starting at 1; the
/// synthetic root function (id 0) wires each into the global table before
/// running the program's top-level statements.
pub fn compile_program(program: &Program, source: &str, endian: Endian) -> CompiledLibrary {
    let mut pool = StringPool::new();

    let mut declared: Vec<&FunctionDecl> = Vec::new();
    let mut root_stmts: Vec<&Stmt> = Vec::new();
    for item in &program.items {
        match item {
            TopItem::Function(f) => declared.push(f),
            TopItem::Stmt(s) => root_stmts.push(s),
        }
    }

    let prologue: Vec<(String, u32)> =
        declared.iter().enumerate().map(|(i, f)| (f.name.clone(), (i + 1) as u32)).collect();

    let mut functions = Vec::with_capacity(declared.len() + 1);
    for (i, f) in declared.iter().enumerate() {
        functions.push(compile_function(&mut pool, endian, (i + 1) as u32, false, &f.name, &f.params, &f.body, &[]));
    }

    let root_stmts: Vec<Stmt> = root_stmts.into_iter().cloned().collect();
    functions.insert(0, compile_function(&mut pool, endian, 0, true, "main", &[], &root_stmts, &prologue));

    CompiledLibrary { strings: pool.buf, source: Some(source.as_bytes().to_vec()), functions, source_endian: endian }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(src: &str) -> CompiledLibrary {
        let program = parse(src).unwrap();
        compile_program(&program, src, Endian::Little)
    }

    #[test]
    fn root_function_is_flagged_and_first() {
        let lib = compile("global x = 3 + 4; return x;");
        assert_eq!(lib.functions.len(), 1);
        assert!(lib.functions[0].is_root);
        assert_eq!(lib.functions[0].id, 0);
    }

    #[test]
    fn declared_functions_get_sequential_ids_after_root() {
        let lib = compile("function f(a, b) { return a + b; } global x = f(1, 2);");
        assert_eq!(lib.functions.len(), 2);
        assert!(lib.functions[0].is_root);
        assert_eq!(lib.functions[1].id, 1);
        assert_eq!(lib.functions[1].num_params, 2);
        assert_eq!(lib.functions[1].num_locals, 2);
    }

    #[test]
    fn every_function_carries_debug_info() {
        let lib = compile("global x = 1;");
        assert!(lib.has_debug_info());
        assert!(lib.functions[0].debug.is_some());
        assert!(lib.source.is_some());
    }

    #[test]
    fn while_loop_branch_targets_land_inside_bytecode_bounds() {
        let lib = compile("function f() { local i = 0; while (i < 3) { i = i + 1; } return i; }");
        let f = &lib.functions[1];
        assert!(!f.bytecode.is_empty());
    }
}
