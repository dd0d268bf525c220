//! Contains the values of the script language and a tree-walking evaluator
//! for scripts.

use std::fmt;

use crate::{
    ast::{fold_binary, BinaryOp, Expr, Function, LogicalOp, Script, Stmt, UnaryOp},
    Error, Grid,
};

/// Maximum nesting of function calls before execution is aborted.
pub const MAX_CALL_DEPTH: usize = 64;

/// A value of the script language.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Value {
    Undefined,
    Bool(bool),
    Int(i64),
    /// The grid passed to the neighbor function.
    Grid,
    /// A row of the grid passed to the neighbor function.
    Row(usize),
    /// A function of the script, by index.
    Function(usize),
}

impl Value {
    /// Whether the value counts as true in conditions.
    pub fn truthy(self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Grid | Value::Row(_) | Value::Function(_) => true,
        }
    }

    /// Convert the value into an integer for arithmetic. Booleans count as
    /// zero and one, all other values cannot be converted.
    pub fn to_int(self) -> Result<i64, Error> {
        match self {
            Value::Int(i) => Ok(i),
            Value::Bool(b) => Ok(b as i64),
            value => Err(Error::script(format!("{value} is not a number"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Grid => write!(f, "[grid]"),
            Value::Row(r) => write!(f, "[row {r}]"),
            Value::Function(_) => write!(f, "[function]"),
        }
    }
}

/// Outcome of executing a statement.
enum Flow {
    Normal,
    Return(Value),
}

/// Variables of a function call, or of the top level while it is evaluated.
type Frame<'a> = Vec<(&'a str, Value)>;

/// State shared by all evaluation steps of one top-level evaluation or one
/// call of the neighbor function.
struct Machine<'a> {
    script: &'a Script,
    globals: &'a [(String, Value)],
    grid: Option<&'a Grid>,
}

impl<'a> Machine<'a> {
    fn lookup(&self, frame: &Frame<'a>, name: &str) -> Result<Value, Error> {
        if let Some(&(_, value)) = frame.iter().find(|(n, _)| *n == name) {
            Ok(value)
        } else if let Some(&(_, value)) = self.globals.iter().find(|(n, _)| n == name) {
            Ok(value)
        } else if let Some(func) = self.script.function(name) {
            Ok(Value::Function(func))
        } else {
            Err(Error::script(format!("{name} is not defined")))
        }
    }

    /// Store into the variable `name` of the frame, creating it if needed.
    fn store(frame: &mut Frame<'a>, name: &'a str, value: Value) {
        if let Some(slot) = frame.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            frame.push((name, value));
        }
    }

    fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, Error> {
        match fold_binary(op, lhs.to_int()?, rhs.to_int()?) {
            Some(Expr::Number(value)) => Ok(Value::Int(value)),
            Some(Expr::Bool(value)) => Ok(Value::Bool(value)),
            _ => Err(Error::script("division by zero")),
        }
    }

    fn index(&self, base: Value, index: Value) -> Result<Value, Error> {
        let index = index.to_int()?;
        match (base, self.grid) {
            (Value::Grid, Some(grid)) => {
                if index >= 0 && (index as usize) < grid.rows() {
                    Ok(Value::Row(index as usize))
                } else {
                    Ok(Value::Undefined)
                }
            }
            (Value::Row(row), Some(grid)) => {
                if index >= 0 && (index as usize) < grid.cols() {
                    Ok(Value::Int(grid[(row, index as usize)] as i64))
                } else {
                    Ok(Value::Undefined)
                }
            }
            (base, _) => Err(Error::script(format!("cannot index into {base}"))),
        }
    }

    fn eval(&self, frame: &mut Frame<'a>, expr: &'a Expr, depth: usize) -> Result<Value, Error> {
        Ok(match expr {
            Expr::Number(value) => Value::Int(*value),
            Expr::Bool(value) => Value::Bool(*value),
            Expr::Var(name) => self.lookup(frame, name)?,
            Expr::Index(base, index) => {
                let base = self.eval(frame, base, depth)?;
                let index = self.eval(frame, index, depth)?;
                self.index(base, index)?
            }
            Expr::Call(callee, args) => {
                let callee = self.eval(frame, callee, depth)?;
                let Value::Function(func) = callee else {
                    return Err(Error::script(format!("{callee} is not a function")));
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg, depth)?);
                }
                self.call(func, &values, depth + 1)?
            }
            Expr::Unary(op, expr) => {
                let value = self.eval(frame, expr, depth)?;
                match op {
                    UnaryOp::Neg => Value::Int(value.to_int()?.wrapping_neg()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(frame, lhs, depth)?;
                let rhs = self.eval(frame, rhs, depth)?;
                Self::binary(*op, lhs, rhs)?
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = self.eval(frame, lhs, depth)?;
                match (op, lhs.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => lhs,
                    _ => self.eval(frame, rhs, depth)?,
                }
            }
            Expr::Assign(op, name, value) => {
                let mut value = self.eval(frame, value, depth)?;
                if let Some(op) = op {
                    value = Self::binary(*op, self.lookup(frame, name)?, value)?;
                }
                Self::store(frame, name, value);
                value
            }
            Expr::Update {
                name,
                delta,
                prefix,
            } => {
                let old = self.lookup(frame, name)?.to_int()?;
                let new = old.wrapping_add(*delta);
                Self::store(frame, name, Value::Int(new));
                Value::Int(if *prefix { new } else { old })
            }
        })
    }

    fn exec(&self, frame: &mut Frame<'a>, stmt: &'a Stmt, depth: usize) -> Result<Flow, Error> {
        match stmt {
            Stmt::Var(decls) => {
                for (name, init) in decls {
                    if let Some(init) = init {
                        let value = self.eval(frame, init, depth)?;
                        Self::store(frame, name, value);
                    } else if !frame.iter().any(|(n, _)| *n == name.as_str()) {
                        frame.push((name.as_str(), Value::Undefined));
                    }
                }
            }
            Stmt::Expr(expr) => {
                self.eval(frame, expr, depth)?;
            }
            Stmt::If(cond, then, otherwise) => {
                if self.eval(frame, cond, depth)?.truthy() {
                    return self.exec(frame, then, depth);
                } else if let Some(otherwise) = otherwise {
                    return self.exec(frame, otherwise, depth);
                }
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec(frame, init, depth)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(frame, cond, depth)?.truthy() {
                            break;
                        }
                    }
                    if let Flow::Return(value) = self.exec(frame, body, depth)? {
                        return Ok(Flow::Return(value));
                    }
                    if let Some(update) = update {
                        self.eval(frame, update, depth)?;
                    }
                }
            }
            Stmt::While(cond, body) => {
                while self.eval(frame, cond, depth)?.truthy() {
                    if let Flow::Return(value) = self.exec(frame, body, depth)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Block(stmts) => return self.exec_all(frame, stmts, depth),
            Stmt::Return(value) => {
                if depth == 0 {
                    return Err(Error::script("return outside of a function"));
                }
                let value = match value {
                    Some(value) => self.eval(frame, value, depth)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Empty => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_all(&self, frame: &mut Frame<'a>, stmts: &'a [Stmt], depth: usize) -> Result<Flow, Error> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(frame, stmt, depth)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Call the function with index `func`. Missing arguments are undefined,
    /// surplus arguments are ignored.
    fn call(&self, func: usize, args: &[Value], depth: usize) -> Result<Value, Error> {
        if depth > MAX_CALL_DEPTH {
            return Err(Error::script("maximum call depth exceeded"));
        }
        let func = &self.script.functions[func];
        let mut frame = Frame::with_capacity(8);
        for (i, param) in func.params.iter().enumerate() {
            frame.push((param.as_str(), args.get(i).copied().unwrap_or(Value::Undefined)));
        }
        match self.exec_all(&mut frame, &func.body, depth)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
        }
    }

    /// Execute the top-level statements. Returns the value of the last
    /// expression statement, which is the completion value of the script.
    fn exec_top_level(&self, frame: &mut Frame<'a>) -> Result<Value, Error> {
        let mut completion = Value::Undefined;
        for stmt in &self.script.body {
            if let Stmt::Expr(expr) = stmt {
                completion = self.eval(frame, expr, 0)?;
            } else {
                self.exec(frame, stmt, 0)?;
            }
        }
        Ok(completion)
    }
}

/// A script whose top level has been evaluated and whose completion value is
/// the neighbor function.
///
/// # Examples
/// ```
/// # use polylife::{ast::{Script, NEIGHBOR_SCRIPT}, runtime::Runtime, Error, Grid};
/// let runtime = Runtime::new(Script::parse(NEIGHBOR_SCRIPT)?)?;
/// let grid = Grid::parse("**\n*.\n", 2, 2)?;
/// assert_eq!(runtime.count(&grid, 1, 1)?, 3);
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct Runtime {
    script: Script,
    globals: Vec<(String, Value)>,
    entry: usize,
}

impl Runtime {
    /// Evaluate the top level of `script`. Fails if evaluation fails or if the
    /// script does not evaluate to a function.
    pub fn new(script: Script) -> Result<Self, Error> {
        let (globals, completion) = {
            let machine = Machine {
                script: &script,
                globals: &[],
                grid: None,
            };
            let mut frame = Frame::new();
            let completion = machine.exec_top_level(&mut frame)?;
            let globals: Vec<_> = frame
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect();
            (globals, completion)
        };
        match completion {
            Value::Function(entry) => Ok(Runtime {
                script,
                globals,
                entry,
            }),
            value => Err(Error::script(format!(
                "script must evaluate to a function, not {value}"
            ))),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The neighbor function the script evaluated to.
    pub fn entry(&self) -> &Function {
        &self.script.functions[self.entry]
    }

    /// The value of a variable defined by the top level of the script.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, value)| value)
    }

    /// Call the neighbor function with the arguments `(grid, row, col, cols, rows)`.
    pub fn call(&self, grid: &Grid, row: usize, col: usize) -> Result<Value, Error> {
        let machine = Machine {
            script: &self.script,
            globals: &self.globals,
            grid: Some(grid),
        };
        let args = [
            Value::Grid,
            Value::Int(row as i64),
            Value::Int(col as i64),
            Value::Int(grid.cols() as i64),
            Value::Int(grid.rows() as i64),
        ];
        machine.call(self.entry, &args, 1)
    }

    /// Call the neighbor function and return its result as a neighbor count.
    pub fn count(&self, grid: &Grid, row: usize, col: usize) -> Result<i64, Error> {
        match self.call(grid, row, col)? {
            value @ (Value::Int(_) | Value::Bool(_)) => value.to_int(),
            value => Err(Error::script(format!(
                "neighbor function returned {value} instead of a number"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Runtime, Value};
    use crate::{ast::Script, Error, Grid};

    fn runtime(src: &str) -> Result<Runtime, Error> {
        Runtime::new(Script::parse(src)?)
    }

    fn script_error(result: Result<impl std::fmt::Debug, Error>) -> String {
        match result {
            Err(Error::Script(message)) => message,
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn completion_value_selects_function() -> Result<(), Error> {
        let rt = runtime("function a() { return 1; } function b() { return 2; } b")?;
        assert_eq!(rt.call(&Grid::new(1, 1), 0, 0)?, Value::Int(2));
        Ok(())
    }

    #[test]
    fn script_without_function_is_rejected() {
        let message = script_error(runtime("var x = 1; x + 1"));
        assert_eq!(message, "script must evaluate to a function, not 2");
    }

    #[test]
    fn arguments_are_grid_position_and_size() -> Result<(), Error> {
        let rt = runtime("function f(g, r, c, w, h) { return r * 1000000 + c * 10000 + w * 100 + h; } f")?;
        assert_eq!(rt.count(&Grid::new(3, 7), 2, 5)?, 2050703);
        Ok(())
    }

    #[test]
    fn globals_are_visible_in_functions() -> Result<(), Error> {
        let rt = runtime("var base = 40; function f() { return base + 2; } f")?;
        assert_eq!(rt.count(&Grid::new(1, 1), 0, 0)?, 42);
        Ok(())
    }

    #[test]
    fn assignments_shadow_globals() -> Result<(), Error> {
        let rt = runtime("var n = 1; function f() { n = n + 1; return n; } f")?;
        let grid = Grid::new(1, 1);
        assert_eq!(rt.count(&grid, 0, 0)?, 2);
        assert_eq!(rt.count(&grid, 0, 0)?, 2);
        Ok(())
    }

    #[test]
    fn out_of_range_index_is_undefined() -> Result<(), Error> {
        let rt = runtime("function f(g, r, c) { return !g[r - 1] && !g[r][c + 5]; } f")?;
        assert_eq!(rt.call(&Grid::new(2, 2), 0, 0)?, Value::Bool(true));
        assert_eq!(rt.call(&Grid::new(2, 2), 1, 0)?, Value::Bool(false));
        Ok(())
    }

    #[test]
    fn arithmetic_on_undefined_fails() {
        let rt = runtime("function f(g) { return g[-1][0]; } f");
        let message = script_error(rt.and_then(|rt| rt.count(&Grid::new(1, 1), 0, 0)));
        assert_eq!(message, "cannot index into undefined");
    }

    #[test]
    fn division_by_zero_fails() {
        let rt = runtime("function f(g, r) { return 1 / r; } f");
        let message = script_error(rt.and_then(|rt| rt.count(&Grid::new(1, 1), 0, 0)));
        assert_eq!(message, "division by zero");
    }

    #[test]
    fn logical_operators_return_operands() -> Result<(), Error> {
        let rt = runtime("function f(g, r, c) { return (r && 10) || c; } f")?;
        let grid = Grid::new(5, 5);
        assert_eq!(rt.call(&grid, 0, 4)?, Value::Int(4));
        assert_eq!(rt.call(&grid, 3, 4)?, Value::Int(10));
        Ok(())
    }

    #[test]
    fn updates_return_old_or_new_value() -> Result<(), Error> {
        let rt = runtime("function f() { var a = 5; var b = a++; var c = ++a; return b * 10 + c; } f")?;
        assert_eq!(rt.count(&Grid::new(1, 1), 0, 0)?, 57);
        Ok(())
    }

    #[test]
    fn while_and_if_else_execute() -> Result<(), Error> {
        let rt = runtime(
            "function f(g, n) {
                var even = 0, odd = 0;
                while (n > 0) {
                    if (n % 2 == 0) even += n; else odd += n;
                    n--;
                }
                return even * 100 + odd;
            }
            f",
        )?;
        assert_eq!(rt.count(&Grid::new(7, 1), 6, 0)?, 1209);
        Ok(())
    }

    #[test]
    fn functions_can_call_each_other() -> Result<(), Error> {
        let rt = runtime(
            "function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            function f(g, r) { return fib(r); }
            f",
        )?;
        assert_eq!(rt.count(&Grid::new(11, 1), 10, 0)?, 55);
        Ok(())
    }

    #[test]
    fn unbounded_recursion_is_stopped() {
        let rt = runtime("function f(g) { return f(g); } f");
        let message = script_error(rt.and_then(|rt| rt.count(&Grid::new(1, 1), 0, 0)));
        assert_eq!(message, "maximum call depth exceeded");
    }

    #[test]
    fn non_numeric_result_is_rejected() {
        let rt = runtime("function f(g) { return g; } f");
        let message = script_error(rt.and_then(|rt| rt.count(&Grid::new(1, 1), 0, 0)));
        assert_eq!(message, "neighbor function returned [grid] instead of a number");
    }

    #[test]
    fn return_at_top_level_fails() {
        let message = script_error(runtime("return 1"));
        assert_eq!(message, "return outside of a function");
    }

    #[test]
    fn unknown_variable_fails() {
        let rt = runtime("function f() { return missing; } f");
        let message = script_error(rt.and_then(|rt| rt.count(&Grid::new(1, 1), 0, 0)));
        assert_eq!(message, "missing is not defined");
    }
}
