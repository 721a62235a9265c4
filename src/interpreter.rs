//! Tree-walking evaluator for Sable.
//!
//! The interpreter owns all runtime storage: the frame arena
//! ([`Environment`]), the instance arena, and the resolver's distance side
//! table. Statements execute against a *current* frame; function calls and
//! blocks push child frames and restore the previous one on every exit
//! path, including one carrying a pending `return` signal.
//!
//! Variable references with a recorded resolution distance jump straight to
//! their defining frame via `get_at`/`assign_at`; references without one
//! are implicit globals, resolved against the global frame at each use.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::environment::{EnvId, Environment};
use crate::error::SableError;
use crate::object::{Class, Function, Instance, InstanceId, CONSTRUCTOR};
use crate::parser::{Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{is_equal, Value};

/// Why evaluation of a statement stopped early.
///
/// `Return` is the only non-error control transfer in the language: raised
/// by a `return` statement, caught at the nearest enclosing function-call
/// boundary, and never observable at top level. It shares the `Err` channel
/// with genuine runtime errors for propagation only — the two are distinct
/// variants and never convert into one another.
#[derive(Debug)]
pub enum Unwind<'src> {
    /// The `return` signal with its carried value.
    Return(Value<'src>),

    /// A genuine runtime error; aborts the remainder of the run.
    Error(SableError),
}

/// Result of executing a statement.
pub type Exec<'src> = Result<(), Unwind<'src>>;

/// Result of evaluating an expression.
pub type Eval<'src> = Result<Value<'src>, Unwind<'src>>;

#[inline]
fn runtime_error<'src, S: Into<String>>(line: usize, msg: S) -> Unwind<'src> {
    Unwind::Error(SableError::runtime(line, msg))
}

/// Identity of a variable-use node, keying the resolver's side table. AST
/// nodes are immutable and outlive both passes, so their addresses are
/// stable.
#[inline(always)]
fn expr_key(expr: &Expr<'_>) -> usize {
    expr as *const Expr<'_> as usize
}

pub struct Interpreter<'src> {
    environment: Environment<'src>,

    /// Frame statements currently execute in.
    current: EnvId,

    /// Instance arena; a `Value::Instance` is an index into it.
    instances: Vec<Instance<'src>>,

    /// Resolver side table: variable-use node identity → frame hops from the
    /// use site to the defining frame. Nodes with no entry are implicit
    /// globals.
    locals: HashMap<usize, usize>,

    /// Destination of `print`; injected so tests can capture output.
    output: Box<dyn Write>,
}

impl<'src> Interpreter<'src> {
    /// Create an interpreter printing to stdout, with the native globals
    /// (`clock`) defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create an interpreter printing to an arbitrary sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing interpreter");

        let mut environment = Environment::new();

        debug!("Defining native function 'clock'");

        environment.define(
            Environment::GLOBAL,
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args| {
                    let seconds = chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0;

                    Ok(Value::Number(seconds))
                },
            },
        );

        Self {
            environment,
            current: Environment::GLOBAL,
            instances: Vec::new(),
            locals: HashMap::new(),
            output,
        }
    }

    /// Record, for one variable-use node, how many enclosing frames to
    /// cross. Called by the resolver; consulted on every reference and
    /// assignment.
    pub fn note_local(&mut self, expr: &Expr<'src>, depth: usize) {
        self.locals.insert(expr_key(expr), depth);
    }

    /// Interpret a whole program.
    pub fn interpret(&mut self, statements: &'src [Stmt<'src>]) -> Result<(), SableError> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(unwind) = self.execute(stmt) {
                return match unwind {
                    Unwind::Error(e) => Err(e),

                    // The resolver rejects top-level `return`, and call
                    // boundaries catch the signal before it gets here.
                    Unwind::Return(_) => unreachable!("return signal escaped to top level"),
                };
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ───────────────────────── statement execution ─────────────────────────

    pub fn execute(&mut self, stmt: &'src Stmt<'src>) -> Exec<'src> {
        match stmt {
            Stmt::Expression(expr) => {
                let _ = self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let rendered = self.stringify(&value);

                writeln!(self.output, "{}", rendered)
                    .map_err(|e| Unwind::Error(SableError::Io(e)))?;

                debug!("Printed value: {}", rendered);

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);

                self.environment.define(self.current, name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let frame = self.environment.push(self.current);

                self.execute_block(statements, frame)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining function '{}'", name.lexeme);

                // The closure captures the frame the declaration executes
                // in, not a copy of it.
                let function = Function {
                    name: name.lexeme.to_string(),
                    params: params.as_slice(),
                    body: body.as_slice(),
                    closure: self.current,
                    is_initializer: false,
                };

                self.environment.define(
                    self.current,
                    name.lexeme,
                    Value::Function(Rc::new(function)),
                );

                Ok(())
            }

            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Raising return signal");

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class_decl(name, superclass.as_ref(), methods),
        }
    }

    /// Execute `statements` inside `frame`, restoring the previous current
    /// frame on every exit path — including one carrying a pending return
    /// signal. Also the body-execution half of the call protocol.
    fn execute_block(&mut self, statements: &'src [Stmt<'src>], frame: EnvId) -> Exec<'src> {
        let previous = self.current;
        self.current = frame;

        let mut result = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.current = previous;

        result
    }

    fn execute_class_decl(
        &mut self,
        name: &'src Token<'src>,
        superclass: Option<&'src Expr<'src>>,
        methods: &'src [Stmt<'src>],
    ) -> Exec<'src> {
        debug!("Declaring class '{}'", name.lexeme);

        let parent: Option<Rc<Class<'src>>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(c) => Some(c),
                _ => {
                    let line = match expr {
                        Expr::Variable(token) => token.line,
                        _ => name.line,
                    };

                    return Err(runtime_error(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Predeclare the name as nil so methods may reference their own
        // class; the finished class is assigned over it below.
        self.environment.define(self.current, name.lexeme, Value::Nil);

        let mut table: HashMap<String, Rc<Function<'src>>> = HashMap::new();

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                params,
                body,
            } = method
            {
                let function = Function {
                    name: method_name.lexeme.to_string(),
                    params: params.as_slice(),
                    body: body.as_slice(),
                    closure: self.current,
                    is_initializer: method_name.lexeme == CONSTRUCTOR,
                };

                table.insert(method_name.lexeme.to_string(), Rc::new(function));
            }
        }

        let class = Class {
            name: name.lexeme.to_string(),
            superclass: parent,
            methods: table,
        };

        self.environment
            .assign(self.current, name.lexeme, Value::Class(Rc::new(class)))
            .map_err(|msg| runtime_error(name.line, msg))?;

        Ok(())
    }

    // ───────────────────────── expression evaluation ───────────────────────

    pub fn evaluate(&mut self, expr: &'src Expr<'src>) -> Eval<'src> {
        match expr {
            Expr::Literal(literal) => Ok(self.literal_value(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                // Short-circuit yields the actual operand value, never a
                // coerced boolean.
                match operator.token_type {
                    TokenType::Or if left_val.is_truthy() => Ok(left_val),
                    TokenType::And if !left_val.is_truthy() => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable(name) => self.look_up_variable(name, expr),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(&expr_key(expr)) {
                    Some(&distance) => {
                        self.environment
                            .assign_at(self.current, distance, name.lexeme, value.clone());
                    }

                    None => {
                        self.environment
                            .assign(Environment::GLOBAL, name.lexeme, value.clone())
                            .map_err(|msg| runtime_error(name.line, msg))?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());

                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.invoke(callee_val, paren, args)
            }

            Expr::Get { object, name } => {
                let object_val = self.evaluate(object)?;

                self.get_property(&object_val, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_val = self.evaluate(object)?;

                let Value::Instance(id) = object_val else {
                    return Err(runtime_error(name.line, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;

                // Stores are unconditional: a field may shadow a method of
                // the same name.
                self.instances[id.0]
                    .fields
                    .insert(name.lexeme.to_string(), value.clone());

                Ok(value)
            }

            Expr::This(keyword) => self.look_up_variable(keyword, expr),

            Expr::Super { keyword, method } => self.evaluate_super(keyword, method, expr),
        }
    }

    fn literal_value(&self, literal: &LiteralValue) -> Value<'src> {
        match literal {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::Str(s) => Value::String(s.clone()),
            LiteralValue::True => Value::Bool(true),
            LiteralValue::False => Value::Bool(false),
            LiteralValue::Nil => Value::Nil,
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &'src Token<'src>,
        right: &'src Expr<'src>,
    ) -> Eval<'src> {
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => {
                if let Value::Number(n) = right_val {
                    Ok(Value::Number(-n))
                } else {
                    Err(runtime_error(
                        operator.line,
                        format!("Operand of '{}' must be a number.", operator.lexeme),
                    ))
                }
            }

            TokenType::Bang => Ok(Value::Bool(!right_val.is_truthy())),

            _ => Err(runtime_error(operator.line, "Invalid unary operator")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &'src Expr<'src>,
        operator: &'src Token<'src>,
        right: &'src Expr<'src>,
    ) -> Eval<'src> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        let numbers = |l: &Value<'src>, r: &Value<'src>| -> Result<(f64, f64), Unwind<'src>> {
            match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
                _ => Err(runtime_error(
                    operator.line,
                    format!("Operands of '{}' must be numbers.", operator.lexeme),
                )),
            }
        };

        match operator.token_type {
            TokenType::Plus => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(runtime_error(
                    operator.line,
                    "Both operands must be either numbers or strings.",
                )),
            },

            TokenType::Minus => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Number(a - b))
            }

            TokenType::Star => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Number(a * b))
            }

            // IEEE-754 division: a zero divisor yields an infinity.
            TokenType::Slash => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Number(a / b))
            }

            TokenType::Greater => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GreaterEqual => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Bool(a >= b))
            }

            TokenType::Less => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LessEqual => {
                let (a, b) = numbers(&left_val, &right_val)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::EqualEqual => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BangEqual => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => Err(runtime_error(operator.line, "Invalid binary operator")),
        }
    }

    /// Resolve a variable or `this` reference: through the recorded distance
    /// when the resolver produced one, else against the global frame only.
    fn look_up_variable(&mut self, name: &'src Token<'src>, expr: &'src Expr<'src>) -> Eval<'src> {
        match self.locals.get(&expr_key(expr)) {
            Some(&distance) => {
                debug!("'{}' resolved {} frame(s) up", name.lexeme, distance);

                Ok(self.environment.get_at(self.current, distance, name.lexeme))
            }

            None => self
                .environment
                .get(Environment::GLOBAL, name.lexeme)
                .map_err(|msg| runtime_error(name.line, msg)),
        }
    }

    fn evaluate_super(
        &mut self,
        keyword: &'src Token<'src>,
        method: &'src Token<'src>,
        expr: &'src Expr<'src>,
    ) -> Eval<'src> {
        let distance = *self
            .locals
            .get(&expr_key(expr))
            .expect("unresolved 'super' expression survived resolution");

        let superclass = match self.environment.get_at(self.current, distance, "super") {
            Value::Class(c) => c,
            _ => unreachable!("'super' bound to a non-class"),
        };

        // `this` lives in the same bound frame as `super`.
        let Value::Instance(id) = self.environment.get_at(self.current, distance, "this") else {
            unreachable!("'this' bound to a non-instance");
        };

        // Lookup starts one level above the *defining* class, even when the
        // instance's actual class overrides the method.
        match superclass.find_method(method.lexeme) {
            Some((function, owner_superclass)) => {
                let bound = self.bind_method(&function, owner_superclass, id);

                Ok(Value::Function(bound))
            }

            None => Err(runtime_error(
                keyword.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ───────────────────────── calls and objects ───────────────────────────

    fn invoke(
        &mut self,
        callee: Value<'src>,
        paren: &'src Token<'src>,
        args: Vec<Value<'src>>,
    ) -> Eval<'src> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                debug!("Calling native function '{}'", name);

                self.check_arity(arity, args.len(), paren.line)?;

                func(&args).map_err(|msg| runtime_error(paren.line, msg))
            }

            Value::Function(function) => {
                self.check_arity(function.arity(), args.len(), paren.line)?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), args.len(), paren.line)?;

                self.instantiate(class, args)
            }

            _ => Err(runtime_error(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    /// Arity is checked before any invocation side effect occurs.
    fn check_arity(&self, expected: usize, got: usize, line: usize) -> Exec<'src> {
        if expected != got {
            return Err(runtime_error(
                line,
                format!("Expected {} arguments but got {}.", expected, got),
            ));
        }

        Ok(())
    }

    /// The function call protocol: one new frame whose enclosing frame is
    /// the callee's captured closure — never the caller's current frame,
    /// which is what yields lexical rather than dynamic scoping.
    fn call_function(&mut self, function: &Function<'src>, args: Vec<Value<'src>>) -> Eval<'src> {
        debug!("Calling function '{}'", function.name);

        let frame = self.environment.push(function.closure);

        for (param, arg) in function.params.iter().zip(args) {
            self.environment.define(frame, param.lexeme, arg);
        }

        let result = self.execute_block(function.body, frame);

        match result {
            // Falling off the end yields nil — or the bound instance for an
            // initializer, whose closure is the frame defining `this`.
            Ok(()) => {
                if function.is_initializer {
                    Ok(self.environment.get_at(function.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Unwind::Return(value)) => {
                debug!("Function '{}' returned", function.name);

                if function.is_initializer {
                    Ok(self.environment.get_at(function.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }

            Err(err) => Err(err),
        }
    }

    /// Calling a class: allocate an empty instance, then bind and invoke an
    /// initializer found through the ancestor chain. The initializer's side
    /// effects populate the fields; the call always yields the instance.
    fn instantiate(&mut self, class: Rc<Class<'src>>, args: Vec<Value<'src>>) -> Eval<'src> {
        debug!("Instantiating class '{}'", class.name);

        let initializer = class.find_method(CONSTRUCTOR);

        let id = InstanceId(self.instances.len());
        self.instances.push(Instance::new(Rc::clone(&class)));

        if let Some((function, owner_superclass)) = initializer {
            let bound = self.bind_method(&function, owner_superclass, id);

            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(id))
    }

    /// Method binding: a *new* function whose closure is a fresh frame,
    /// child of the method's original closure, defining `this` — and, when
    /// the defining class has a superclass, `super`. One binding per
    /// property access that yields a method.
    fn bind_method(
        &mut self,
        method: &Rc<Function<'src>>,
        owner_superclass: Option<Rc<Class<'src>>>,
        instance: InstanceId,
    ) -> Rc<Function<'src>> {
        let frame = self.environment.push(method.closure);

        self.environment
            .define(frame, "this", Value::Instance(instance));

        if let Some(superclass) = owner_superclass {
            self.environment
                .define(frame, "super", Value::Class(superclass));
        }

        Rc::new(Function {
            closure: frame,
            ..(**method).clone()
        })
    }

    fn get_property(&mut self, object: &Value<'src>, name: &'src Token<'src>) -> Eval<'src> {
        let Value::Instance(id) = object else {
            return Err(runtime_error(name.line, "Only instances have properties."));
        };

        // Own fields win over methods of the same name.
        if let Some(value) = self.instances[id.0].fields.get(name.lexeme) {
            return Ok(value.clone());
        }

        let class = Rc::clone(&self.instances[id.0].class);

        if let Some((function, owner_superclass)) = class.find_method(name.lexeme) {
            let bound = self.bind_method(&function, owner_superclass, *id);

            return Ok(Value::Function(bound));
        }

        Err(runtime_error(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    // ───────────────────────── rendering ───────────────────────────────────

    /// Render a value for `print` and the CLI. Rendering lives here rather
    /// than on `Value` because instances need the arena to name their class.
    pub fn stringify(&self, value: &Value<'src>) -> String {
        match value {
            Value::Nil => "nil".to_string(),

            Value::Bool(b) => b.to_string(),

            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    let mut buf = itoa::Buffer::new();

                    buf.format(*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }

            Value::String(s) => s.clone(),

            Value::NativeFunction { .. } => "<native fn>".to_string(),

            Value::Function(function) => format!("<fn {}>", function.name),

            Value::Class(class) => class.name.clone(),

            Value::Instance(id) => format!("{} instance", self.instances[id.0].class.name),
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}
