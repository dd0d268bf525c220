//! LLVM JIT backend.

use std::collections::HashMap;

use inkwell::{
    basic_block::BasicBlock,
    builder::{Builder, BuilderError},
    context::Context,
    execution_engine::JitFunction,
    module::{Linkage, Module},
    passes::PassBuilderOptions,
    targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine},
    types::{IntType, PointerType, StructType},
    values::{FunctionValue, IntValue, PointerValue},
    AddressSpace, IntPredicate, OptimizationLevel,
};

use crate::{
    ast::{BinaryOp, Expr, Function, LogicalOp, Script, Stmt, UnaryOp},
    runtime::{Runtime, Value},
    Error, Grid,
};

use super::{Executor, NeighborCounter};

/// Layout of the grid as seen by the generated code.
#[repr(C)]
struct JitGrid {
    // Do not reorder, the generated code accesses the fields by index.
    cells: *const u8,
    rows: i64,
    cols: i64,
}

/// Status codes written by the generated code.
const STATUS_OK: u32 = 0;
const STATUS_OUT_OF_RANGE: u32 = 1;
const STATUS_NO_RESULT: u32 = 2;
const STATUS_DIV_BY_ZERO: u32 = 3;
const STATUS_UNDEFINED: u32 = 4;

/// Function type of the generated JIT function. `args` points to the row,
/// column, number of columns and number of rows, in that order.
type NeighborEntry = unsafe extern "C" fn(grid: *const JitGrid, args: *const i64, status: *mut u32) -> i64;

/// A LLVM backed JIT compiler. Builds LLVM IR from the syntax tree of the
/// neighbor function and compiles it to machine code once, when created.
///
/// The compiled subset is smaller than what the interpreters support. All
/// values are integers, booleans become zero or one, the grid parameter may
/// only be used as `grid[row][col]` and functions cannot be called. Scripts
/// outside of this subset are rejected by [`Executor::create`]. Reading a
/// variable that holds no number fails, also in conditions.
pub struct LlvmJitCompiler {
    ir: String,
    entry: JitFunction<'static, NeighborEntry>,
}

/// Create an LLVM error with the given string.
fn llvm_error<S: ToString>(str: S) -> Error {
    Error::Llvm(str.to_string())
}

impl From<BuilderError> for Error {
    fn from(err: BuilderError) -> Self {
        llvm_error(err)
    }
}

/// Struct holding information needed during LLVM IR generation.
struct CodeGen<'cxt, 'rt> {
    runtime: &'rt Runtime,
    context: &'cxt Context,
    module: Module<'cxt>,
    builder: Builder<'cxt>,
    target_machine: TargetMachine,
    int_type: IntType<'cxt>,
    status_type: IntType<'cxt>,
    ptr_type: PointerType<'cxt>,
    grid_type: StructType<'cxt>,
}

/// Stack slots of a local variable.
#[derive(Clone, Copy)]
struct Local<'cxt> {
    value: PointerValue<'cxt>,
    /// Whether `value` holds a number.
    defined: PointerValue<'cxt>,
    /// Whether the variable was declared or assigned, hiding a global of the
    /// same name.
    declared: PointerValue<'cxt>,
}

/// State of the function currently being generated.
struct FuncState<'cxt, 'rt> {
    func: FunctionValue<'cxt>,
    grid_param: Option<&'rt str>,
    grid_ptr: PointerValue<'cxt>,
    status_ptr: PointerValue<'cxt>,
    locals: HashMap<&'rt str, Local<'cxt>>,
}

/// Collect the names of all variables assigned or declared in `stmt`.
fn collect_locals<'rt>(stmt: &'rt Stmt, names: &mut Vec<&'rt str>) {
    fn add<'rt>(name: &'rt str, names: &mut Vec<&'rt str>) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    fn visit<'rt>(expr: &'rt Expr, names: &mut Vec<&'rt str>) {
        match expr {
            Expr::Number(_) | Expr::Bool(_) | Expr::Var(_) => {}
            Expr::Index(base, index) => {
                visit(base, names);
                visit(index, names);
            }
            Expr::Call(callee, args) => {
                visit(callee, names);
                args.iter().for_each(|arg| visit(arg, names));
            }
            Expr::Unary(_, value) => visit(value, names),
            Expr::Binary(_, lhs, rhs) | Expr::Logical(_, lhs, rhs) => {
                visit(lhs, names);
                visit(rhs, names);
            }
            Expr::Assign(_, name, value) => {
                add(name, names);
                visit(value, names);
            }
            Expr::Update { name, .. } => add(name, names),
        }
    }
    match stmt {
        Stmt::Var(decls) => {
            for (name, init) in decls {
                add(name, names);
                if let Some(init) = init {
                    visit(init, names);
                }
            }
        }
        Stmt::Expr(value) => visit(value, names),
        Stmt::If(cond, then, otherwise) => {
            visit(cond, names);
            collect_locals(then, names);
            if let Some(otherwise) = otherwise {
                collect_locals(otherwise, names);
            }
        }
        Stmt::For {
            init,
            cond,
            update,
            body,
        } => {
            if let Some(init) = init {
                collect_locals(init, names);
            }
            cond.iter().chain(update).for_each(|e| visit(e, names));
            collect_locals(body, names);
        }
        Stmt::While(cond, body) => {
            visit(cond, names);
            collect_locals(body, names);
        }
        Stmt::Block(stmts) => stmts.iter().for_each(|s| collect_locals(s, names)),
        Stmt::Return(value) => value.iter().for_each(|e| visit(e, names)),
        Stmt::Empty => {}
    }
}

impl<'cxt, 'rt> CodeGen<'cxt, 'rt> {
    fn unsupported<S: AsRef<str>>(what: S) -> Error {
        llvm_error(format!("not supported by the JIT compiler: {}", what.as_ref()))
    }

    /// Store `status` and return zero from the function.
    fn build_fail(&self, state: &FuncState<'cxt, 'rt>, status: u32) -> Result<(), Error> {
        self.builder.build_store(
            state.status_ptr,
            self.status_type.const_int(status as u64, false),
        )?;
        self.builder
            .build_return(Some(&self.int_type.const_zero()))?;
        Ok(())
    }

    /// Continue only if `ok` is true, otherwise fail with `status`.
    fn build_check(
        &self,
        state: &FuncState<'cxt, 'rt>,
        ok: IntValue<'cxt>,
        status: u32,
    ) -> Result<(), Error> {
        let cont = self.context.append_basic_block(state.func, "ok");
        let fail = self.context.append_basic_block(state.func, "fail");
        self.builder.build_conditional_branch(ok, cont, fail)?;
        self.builder.position_at_end(fail);
        self.build_fail(state, status)?;
        self.builder.position_at_end(cont);
        Ok(())
    }

    fn build_truthy(&self, value: IntValue<'cxt>) -> Result<IntValue<'cxt>, Error> {
        Ok(self.builder.build_int_compare(
            IntPredicate::NE,
            value,
            self.int_type.const_zero(),
            "truthy",
        )?)
    }

    fn build_bool(&self, value: IntValue<'cxt>) -> Result<IntValue<'cxt>, Error> {
        Ok(self
            .builder
            .build_int_z_extend(value, self.int_type, "bool")?)
    }

    fn build_grid_field(
        &self,
        state: &FuncState<'cxt, 'rt>,
        index: u32,
        name: &str,
    ) -> Result<IntValue<'cxt>, Error> {
        let ptr = self
            .builder
            .build_struct_gep(self.grid_type, state.grid_ptr, index, name)?;
        Ok(self
            .builder
            .build_load(self.int_type, ptr, name)?
            .into_int_value())
    }

    /// Load the cell `grid[row][col]`, failing if it lies outside the grid.
    fn build_cell(
        &self,
        state: &FuncState<'cxt, 'rt>,
        row: IntValue<'cxt>,
        col: IntValue<'cxt>,
    ) -> Result<IntValue<'cxt>, Error> {
        let rows = self.build_grid_field(state, 1, "rows")?;
        let cols = self.build_grid_field(state, 2, "cols")?;
        // Negative indices are huge as unsigned numbers.
        let row_ok = self
            .builder
            .build_int_compare(IntPredicate::ULT, row, rows, "row_ok")?;
        let col_ok = self
            .builder
            .build_int_compare(IntPredicate::ULT, col, cols, "col_ok")?;
        let ok = self.builder.build_and(row_ok, col_ok, "in_grid")?;
        self.build_check(state, ok, STATUS_OUT_OF_RANGE)?;
        let cells_ptr = self
            .builder
            .build_struct_gep(self.grid_type, state.grid_ptr, 0, "cells_ptr")?;
        let cells = self
            .builder
            .build_load(self.ptr_type, cells_ptr, "cells")?
            .into_pointer_value();
        let row_start = self.builder.build_int_mul(row, cols, "row_start")?;
        let offset = self.builder.build_int_add(row_start, col, "offset")?;
        let cell_ptr = unsafe {
            self.builder.build_in_bounds_gep(
                self.context.i8_type(),
                cells,
                &[offset],
                "cell_ptr",
            )?
        };
        let cell = self
            .builder
            .build_load(self.context.i8_type(), cell_ptr, "cell")?
            .into_int_value();
        Ok(self
            .builder
            .build_int_z_extend(cell, self.int_type, "cell")?)
    }

    fn build_binary(
        &self,
        state: &FuncState<'cxt, 'rt>,
        op: BinaryOp,
        lhs: IntValue<'cxt>,
        rhs: IntValue<'cxt>,
    ) -> Result<IntValue<'cxt>, Error> {
        let compare = |pred| -> Result<IntValue<'cxt>, Error> {
            let cmp = self.builder.build_int_compare(pred, lhs, rhs, "cmp")?;
            self.build_bool(cmp)
        };
        Ok(match op {
            BinaryOp::Add => self.builder.build_int_add(lhs, rhs, "add")?,
            BinaryOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub")?,
            BinaryOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul")?,
            BinaryOp::Div | BinaryOp::Rem => {
                let zero = self.builder.build_int_compare(
                    IntPredicate::EQ,
                    rhs,
                    self.int_type.const_zero(),
                    "zero",
                )?;
                let min = self.builder.build_int_compare(
                    IntPredicate::EQ,
                    lhs,
                    self.int_type.const_int(i64::MIN as u64, true),
                    "min",
                )?;
                let minus_one = self.builder.build_int_compare(
                    IntPredicate::EQ,
                    rhs,
                    self.int_type.const_all_ones(),
                    "minus_one",
                )?;
                let overflow = self.builder.build_and(min, minus_one, "overflow")?;
                let fails = self.builder.build_or(zero, overflow, "fails")?;
                let ok = self.builder.build_not(fails, "ok")?;
                self.build_check(state, ok, STATUS_DIV_BY_ZERO)?;
                if op == BinaryOp::Div {
                    self.builder.build_int_signed_div(lhs, rhs, "div")?
                } else {
                    self.builder.build_int_signed_rem(lhs, rhs, "rem")?
                }
            }
            BinaryOp::Lt => compare(IntPredicate::SLT)?,
            BinaryOp::Le => compare(IntPredicate::SLE)?,
            BinaryOp::Gt => compare(IntPredicate::SGT)?,
            BinaryOp::Ge => compare(IntPredicate::SGE)?,
            BinaryOp::Eq => compare(IntPredicate::EQ)?,
            BinaryOp::Ne => compare(IntPredicate::NE)?,
        })
    }

    fn local(&self, state: &FuncState<'cxt, 'rt>, name: &str) -> Result<Local<'cxt>, Error> {
        match state.locals.get(name) {
            Some(&local) => Ok(local),
            None if state.grid_param == Some(name) => {
                Err(Self::unsupported("assigning to the grid parameter"))
            }
            None => Err(Self::unsupported(format!("variable `{name}`"))),
        }
    }

    fn build_flag(&self, ptr: PointerValue<'cxt>, name: &str) -> Result<IntValue<'cxt>, Error> {
        Ok(self
            .builder
            .build_load(self.context.bool_type(), ptr, name)?
            .into_int_value())
    }

    /// Load the value of a local, failing if it holds no number.
    fn build_load_local(
        &self,
        state: &FuncState<'cxt, 'rt>,
        local: Local<'cxt>,
        name: &str,
    ) -> Result<IntValue<'cxt>, Error> {
        let defined = self.build_flag(local.defined, "defined")?;
        self.build_check(state, defined, STATUS_UNDEFINED)?;
        Ok(self
            .builder
            .build_load(self.int_type, local.value, name)?
            .into_int_value())
    }

    fn build_store_local(&self, local: Local<'cxt>, value: IntValue<'cxt>) -> Result<(), Error> {
        let set = self.context.bool_type().const_all_ones();
        self.builder.build_store(local.value, value)?;
        self.builder.build_store(local.defined, set)?;
        self.builder.build_store(local.declared, set)?;
        Ok(())
    }

    /// Declare a local without a value. A variable declared before keeps it.
    fn build_declare_local(&self, local: Local<'cxt>) -> Result<(), Error> {
        let declared = self.build_flag(local.declared, "declared")?;
        let defined = self.build_flag(local.defined, "defined")?;
        let defined = self.builder.build_and(declared, defined, "defined")?;
        self.builder.build_store(local.defined, defined)?;
        self.builder
            .build_store(local.declared, self.context.bool_type().const_all_ones())?;
        Ok(())
    }

    fn compile_expr(
        &self,
        state: &FuncState<'cxt, 'rt>,
        expr: &'rt Expr,
    ) -> Result<IntValue<'cxt>, Error> {
        Ok(match expr {
            Expr::Number(value) => self.int_type.const_int(*value as u64, true),
            Expr::Bool(value) => self.int_type.const_int(*value as u64, false),
            Expr::Var(name) => {
                if let Some(&local) = state.locals.get(name.as_str()) {
                    self.build_load_local(state, local, name)?
                } else if state.grid_param == Some(name.as_str()) {
                    return Err(Self::unsupported("grid used other than as `grid[row][col]`"));
                } else {
                    match self.runtime.global(name) {
                        Some(Value::Int(value)) => self.int_type.const_int(value as u64, true),
                        Some(Value::Bool(value)) => self.int_type.const_int(value as u64, false),
                        _ => return Err(Self::unsupported(format!("variable `{name}`"))),
                    }
                }
            }
            Expr::Index(base, col) => match base.as_ref() {
                Expr::Index(grid, row)
                    if matches!(grid.as_ref(), Expr::Var(name) if state.grid_param == Some(name.as_str())) =>
                {
                    let row = self.compile_expr(state, row)?;
                    let col = self.compile_expr(state, col)?;
                    self.build_cell(state, row, col)?
                }
                _ => return Err(Self::unsupported("indexing something other than the grid")),
            },
            Expr::Call(..) => return Err(Self::unsupported("function calls")),
            Expr::Unary(UnaryOp::Neg, value) => {
                let value = self.compile_expr(state, value)?;
                self.builder.build_int_neg(value, "neg")?
            }
            Expr::Unary(UnaryOp::Not, value) => {
                let value = self.compile_expr(state, value)?;
                let not = self.builder.build_int_compare(
                    IntPredicate::EQ,
                    value,
                    self.int_type.const_zero(),
                    "not",
                )?;
                self.build_bool(not)?
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.compile_expr(state, lhs)?;
                let rhs = self.compile_expr(state, rhs)?;
                self.build_binary(state, *op, lhs, rhs)?
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.compile_expr(state, lhs)?;
                let lhs_end = self.current_block()?;
                let rhs_block = self.context.append_basic_block(state.func, "logical_rhs");
                let merge = self.context.append_basic_block(state.func, "logical_end");
                let truthy = self.build_truthy(lhs)?;
                match op {
                    LogicalOp::And => self
                        .builder
                        .build_conditional_branch(truthy, rhs_block, merge)?,
                    LogicalOp::Or => self
                        .builder
                        .build_conditional_branch(truthy, merge, rhs_block)?,
                };
                self.builder.position_at_end(rhs_block);
                let rhs = self.compile_expr(state, rhs)?;
                let rhs_end = self.current_block()?;
                self.builder.build_unconditional_branch(merge)?;
                self.builder.position_at_end(merge);
                let phi = self.builder.build_phi(self.int_type, "logical")?;
                phi.add_incoming(&[(&lhs, lhs_end), (&rhs, rhs_end)]);
                phi.as_basic_value().into_int_value()
            }
            Expr::Assign(op, name, value) => {
                let local = self.local(state, name)?;
                let mut value = self.compile_expr(state, value)?;
                if let Some(op) = op {
                    let current = self.build_load_local(state, local, name)?;
                    value = self.build_binary(state, *op, current, value)?;
                }
                self.build_store_local(local, value)?;
                value
            }
            Expr::Update {
                name,
                delta,
                prefix,
            } => {
                let local = self.local(state, name)?;
                let old = self.build_load_local(state, local, name)?;
                let new = self.builder.build_int_add(
                    old,
                    self.int_type.const_int(*delta as u64, true),
                    "update",
                )?;
                self.build_store_local(local, new)?;
                if *prefix {
                    new
                } else {
                    old
                }
            }
        })
    }

    fn current_block(&self) -> Result<BasicBlock<'cxt>, Error> {
        self.builder
            .get_insert_block()
            .ok_or_else(|| llvm_error("builder is not positioned"))
    }

    fn compile_stmt(&self, state: &FuncState<'cxt, 'rt>, stmt: &'rt Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Var(decls) => {
                for (name, init) in decls {
                    let local = self.local(state, name)?;
                    match init {
                        Some(init) => {
                            let value = self.compile_expr(state, init)?;
                            self.build_store_local(local, value)?;
                        }
                        None => self.build_declare_local(local)?,
                    }
                }
            }
            Stmt::Expr(expr) => {
                self.compile_expr(state, expr)?;
            }
            Stmt::If(cond, then, otherwise) => {
                let cond = self.compile_expr(state, cond)?;
                let cond = self.build_truthy(cond)?;
                let then_block = self.context.append_basic_block(state.func, "then");
                let else_block = self.context.append_basic_block(state.func, "else");
                let merge = self.context.append_basic_block(state.func, "endif");
                self.builder
                    .build_conditional_branch(cond, then_block, else_block)?;
                self.builder.position_at_end(then_block);
                self.compile_stmt(state, then)?;
                self.builder.build_unconditional_branch(merge)?;
                self.builder.position_at_end(else_block);
                if let Some(otherwise) = otherwise {
                    self.compile_stmt(state, otherwise)?;
                }
                self.builder.build_unconditional_branch(merge)?;
                self.builder.position_at_end(merge);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.compile_stmt(state, init)?;
                }
                self.compile_loop(state, cond.as_ref(), body, update.as_ref())?;
            }
            Stmt::While(cond, body) => {
                self.compile_loop(state, Some(cond), body, None)?;
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.compile_stmt(state, stmt)?;
                }
            }
            Stmt::Return(None) => {
                self.build_fail(state, STATUS_NO_RESULT)?;
                self.start_unreachable(state);
            }
            Stmt::Return(Some(value)) => {
                let value = self.compile_expr(state, value)?;
                self.builder.build_return(Some(&value))?;
                self.start_unreachable(state);
            }
            Stmt::Empty => {}
        }
        Ok(())
    }

    fn compile_loop(
        &self,
        state: &FuncState<'cxt, 'rt>,
        cond: Option<&'rt Expr>,
        body: &'rt Stmt,
        update: Option<&'rt Expr>,
    ) -> Result<(), Error> {
        let cond_block = self.context.append_basic_block(state.func, "loop_cond");
        let body_block = self.context.append_basic_block(state.func, "loop_body");
        let exit_block = self.context.append_basic_block(state.func, "loop_exit");
        self.builder.build_unconditional_branch(cond_block)?;
        self.builder.position_at_end(cond_block);
        match cond {
            Some(cond) => {
                let cond = self.compile_expr(state, cond)?;
                let cond = self.build_truthy(cond)?;
                self.builder
                    .build_conditional_branch(cond, body_block, exit_block)?;
            }
            None => {
                self.builder.build_unconditional_branch(body_block)?;
            }
        }
        self.builder.position_at_end(body_block);
        self.compile_stmt(state, body)?;
        if let Some(update) = update {
            self.compile_expr(state, update)?;
        }
        self.builder.build_unconditional_branch(cond_block)?;
        self.builder.position_at_end(exit_block);
        Ok(())
    }

    /// Continue generating code in a block without predecessors.
    fn start_unreachable(&self, state: &FuncState<'cxt, 'rt>) {
        let block = self.context.append_basic_block(state.func, "unreachable");
        self.builder.position_at_end(block);
    }

    fn param(func: FunctionValue<'cxt>, index: u32) -> Result<PointerValue<'cxt>, Error> {
        func.get_nth_param(index)
            .map(|param| param.into_pointer_value())
            .ok_or_else(|| llvm_error("missing function parameter"))
    }

    fn compile_function(&self, function: &'rt Function) -> Result<(), Error> {
        if function.params.len() > 5 {
            return Err(Self::unsupported("neighbor functions with more than five parameters"));
        }
        let func_type = self.int_type.fn_type(
            &[
                self.ptr_type.into(),
                self.ptr_type.into(),
                self.ptr_type.into(),
            ],
            false,
        );
        let func = self
            .module
            .add_function("polylife_neighbors", func_type, Some(Linkage::External));
        let args_ptr = Self::param(func, 1)?;
        let entry = self.context.append_basic_block(func, "entry");
        self.builder.position_at_end(entry);
        let mut names = Vec::new();
        for param in function.params.iter().skip(1) {
            if !names.contains(&param.as_str()) {
                names.push(param.as_str());
            }
        }
        function
            .body
            .iter()
            .for_each(|stmt| collect_locals(stmt, &mut names));
        let grid_param = function.params.first().map(String::as_str);
        let mut locals = HashMap::new();
        for name in names {
            if Some(name) == grid_param {
                return Err(Self::unsupported("assigning to the grid parameter"));
            }
            // Until declared, a local reads the global of the same name.
            let global = match self.runtime.global(name) {
                Some(Value::Int(value)) => Some(value),
                Some(Value::Bool(value)) => Some(value as i64),
                _ => None,
            };
            let bool_type = self.context.bool_type();
            let local = Local {
                value: self.builder.build_alloca(self.int_type, name)?,
                defined: self.builder.build_alloca(bool_type, "defined")?,
                declared: self.builder.build_alloca(bool_type, "declared")?,
            };
            self.builder.build_store(
                local.value,
                self.int_type.const_int(global.unwrap_or(0) as u64, true),
            )?;
            self.builder.build_store(
                local.defined,
                bool_type.const_int(global.is_some() as u64, false),
            )?;
            self.builder
                .build_store(local.declared, bool_type.const_zero())?;
            locals.insert(name, local);
        }
        for (i, param) in function.params.iter().enumerate().skip(1) {
            let arg_ptr = unsafe {
                self.builder.build_in_bounds_gep(
                    self.int_type,
                    args_ptr,
                    &[self.int_type.const_int(i as u64 - 1, false)],
                    "arg_ptr",
                )?
            };
            let arg = self.builder.build_load(self.int_type, arg_ptr, param)?;
            self.build_store_local(locals[param.as_str()], arg.into_int_value())?;
        }
        let state = FuncState {
            func,
            grid_param,
            grid_ptr: Self::param(func, 0)?,
            status_ptr: Self::param(func, 2)?,
            locals,
        };
        for stmt in &function.body {
            self.compile_stmt(&state, stmt)?;
        }
        if self.current_block()?.get_terminator().is_none() {
            self.build_fail(&state, STATUS_NO_RESULT)?;
        }
        Ok(())
    }

    fn create(
        context: &'cxt Context,
        runtime: &'rt Runtime,
        opt: u32,
    ) -> Result<Module<'cxt>, Error> {
        Target::initialize_native(&InitializationConfig::default()).map_err(llvm_error)?;
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(llvm_error)?;
        let target_machine = target
            .create_target_machine(
                &triple,
                &TargetMachine::get_host_cpu_name().to_string(),
                &TargetMachine::get_host_cpu_features().to_string(),
                OptimizationLevel::None,
                RelocMode::Static,
                CodeModel::JITDefault,
            )
            .ok_or(llvm_error("failed to create target machine"))?;
        let target_data = target_machine.get_target_data();
        let module = context.create_module("polylife");
        let builder = context.create_builder();
        module.set_triple(&triple);
        module.set_data_layout(&target_data.get_data_layout());
        let int_type = context.i64_type();
        let status_type = context.i32_type();
        let ptr_type = context.i8_type().ptr_type(AddressSpace::default());
        let grid_type =
            context.struct_type(&[ptr_type.into(), int_type.into(), int_type.into()], false);
        let code_gen = CodeGen {
            runtime,
            context,
            module,
            builder,
            target_machine,
            int_type,
            status_type,
            ptr_type,
            grid_type,
        };
        code_gen.compile_function(runtime.entry())?;
        #[cfg(debug_assertions)]
        code_gen.module.verify().map_err(llvm_error)?;
        let passes = if opt == 0 {
            "default<O0>".to_owned()
        } else if opt <= 2 {
            let passes = [
                "simplifycfg",
                "mem2reg",
                "instcombine",
                "gvn",
                "loop-simplify",
                "loop-mssa(licm)",
                "reassociate",
                "sccp",
                "adce",
                "simplifycfg",
            ];
            passes.join(",")
        } else {
            "default<O3>".to_owned()
        };
        code_gen
            .module
            .run_passes(
                &passes,
                &code_gen.target_machine,
                PassBuilderOptions::create(),
            )
            .map_err(llvm_error)?;
        Ok(code_gen.module)
    }
}

impl LlvmJitCompiler {
    /// The optimized LLVM IR of the neighbor function.
    pub fn print_llvm_ir(&self) -> &str {
        &self.ir
    }
}

impl<'code> Executor<'code> for LlvmJitCompiler {
    fn create(code: &'code str, opt: u32) -> Result<Self, Error> {
        let mut script = Script::parse(code)?;
        if opt > 0 {
            script = script.optimize();
        }
        let runtime = Runtime::new(script)?;
        // The JIT function borrows the context for as long as it exists, and
        // it lives as long as the compiler. Leaking it is the simplest way to
        // express that.
        let context: &'static Context = Box::leak(Box::new(Context::create()));
        let module = CodeGen::create(context, &runtime, opt)?;
        let ir = module.print_to_string().to_string();
        let opt_level = match opt {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        };
        let execution_engine = module
            .create_jit_execution_engine(opt_level)
            .map_err(llvm_error)?;
        let entry = unsafe {
            execution_engine
                .get_function::<NeighborEntry>("polylife_neighbors")
                .map_err(llvm_error)?
        };
        Ok(LlvmJitCompiler { ir, entry })
    }
}

impl NeighborCounter for LlvmJitCompiler {
    fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error> {
        let jit_grid = JitGrid {
            cells: grid.cells().as_ptr(),
            rows: grid.rows() as i64,
            cols: grid.cols() as i64,
        };
        let args = [
            row as i64,
            col as i64,
            grid.cols() as i64,
            grid.rows() as i64,
        ];
        let mut status = STATUS_OK;
        let result = unsafe { self.entry.call(&jit_grid, args.as_ptr(), &mut status) };
        match status {
            STATUS_OK => Ok(result),
            STATUS_OUT_OF_RANGE => Err(Error::script("grid index out of range")),
            STATUS_NO_RESULT => Err(Error::script(
                "neighbor function returned undefined instead of a number",
            )),
            STATUS_DIV_BY_ZERO => Err(Error::script("division by zero")),
            STATUS_UNDEFINED => Err(Error::script("variable does not hold a number")),
            status => Err(llvm_error(format!("unknown status {status}"))),
        }
    }
}

counter_tests!(LlvmJitCompiler);
script_tests!(LlvmJitCompiler);

#[cfg(test)]
mod jit_tests {
    use crate::{Error, Executor, Grid, LlvmJitCompiler, NeighborCounter};

    #[test]
    fn calls_are_rejected() {
        let code = "function g() { return 1; } function f(grid) { return g(); } f";
        assert!(matches!(LlvmJitCompiler::create(code, 1), Err(Error::Llvm(_))));
    }

    #[test]
    fn grid_must_be_indexed_twice() {
        let code = "function f(grid) { return grid; } f";
        assert!(matches!(LlvmJitCompiler::create(code, 1), Err(Error::Llvm(_))));
    }

    #[test]
    fn unassigned_variable_in_condition_returns_error() -> Result<(), Error> {
        let code = "function f(g) { var x; if (x) return 1; return 0; } f";
        let exec = LlvmJitCompiler::create(code, 1)?;
        let result = exec.count(&Grid::new(1, 1), 0, 0);
        assert!(matches!(result, Err(Error::Script(_))), "{result:?}");
        Ok(())
    }

    #[test]
    fn ir_contains_entry() -> Result<(), Error> {
        let exec = LlvmJitCompiler::create(crate::ast::NEIGHBOR_SCRIPT, 0)?;
        assert!(exec.print_llvm_ir().contains("polylife_neighbors"));
        Ok(())
    }
}
