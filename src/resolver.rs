//! Static resolver pass for the **Sable** interpreter.
//!
//! One AST walk that does three things:
//! 1. Mirror the evaluator's scope nesting (blocks, functions, classes) with
//!    a stack of `HashMap<&str, bool>` tracking declared/defined names.
//! 2. Report static errors — redeclaration, forward-read in an initializer,
//!    invalid `return`/`this`/`super` placement, self-inheritance. Errors
//!    are *collected* and the walk continues, so one pass surfaces every
//!    issue; any error blocks execution.
//! 3. Record, for each variable occurrence that lands in a local scope, its
//!    distance from the innermost scope into the interpreter's side table.
//!    Occurrences found in no scope are implicit globals and record
//!    nothing — the interpreter resolves them dynamically.

use std::collections::HashMap;

use log::{debug, info};

use crate::error::SableError;
use crate::interpreter::Interpreter;
use crate::object::CONSTRUCTOR;
use crate::parser::{Expr, Stmt};
use crate::token::Token;

/// What kind of function body we are inside; validates `return` placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body we are inside; validates `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances by calling back into the interpreter.
pub struct Resolver<'src, 'interp> {
    interpreter: &'interp mut Interpreter<'src>,
    scopes: Vec<HashMap<&'src str, bool>>, // false = declared, true = defined
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<SableError>,
}

impl<'src, 'interp> Resolver<'src, 'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter<'src>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements. Returns every resolution error found;
    /// the walk never aborts early.
    pub fn resolve(
        mut self,
        statements: &'src [Stmt<'src>],
    ) -> Result<(), Vec<SableError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'src Stmt<'src>) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so a forward read
                // of the name inside its own initializer is caught.
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function { name, params, body } => {
                // A function's name is visible inside its own body.
                self.declare(name);
                self.define(name);

                self.resolve_function(params, body, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword.line, "Cannot return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword.line, "Cannot return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &'src Token<'src>,
        superclass: Option<&'src Expr<'src>>,
        methods: &'src [Stmt<'src>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let Expr::Variable(sup) = superclass_expr {
                if sup.lexeme == name.lexeme {
                    self.error(sup.line, "A class cannot inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);
        }

        // One scope for `this` and (in subclasses) `super`: both names live
        // in the single frame method binding creates at run time, so they
        // must resolve at the same distance.
        self.begin_scope();

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this", true);

            if superclass.is_some() {
                scope.insert("super", true);
            }
        }

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                params,
                body,
            } = method
            {
                let function_type = if method_name.lexeme == CONSTRUCTOR {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };

                self.resolve_function(params, body, function_type);
            }
        }

        self.end_scope();

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'src Expr<'src>) {
        debug!("Resolving expr: {:?}", expr);

        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable(name) => {
                // Reading a name whose own scope shows it declared but not
                // yet defined means `var a = a;`.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.error(
                            name.line,
                            "Cannot read local variable in its own initializer.",
                        );
                    }
                }

                self.resolve_local(expr, name);
            }

            Expr::Assign { name, value } => {
                // RHS first, then bind the LHS occurrence.
                self.resolve_expr(value);
                self.resolve_local(expr, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This(keyword) => {
                if self.current_class == ClassType::None {
                    self.error(keyword.line, "Cannot use 'this' outside of a class.");

                    return;
                }

                self.resolve_local(expr, keyword);
            }

            Expr::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword.line, "Cannot use 'super' outside of a class.");
                    }

                    ClassType::Class => {
                        self.error(
                            keyword.line,
                            "Cannot use 'super' in a class with no superclass.",
                        );
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(expr, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body, restoring the
    /// enclosing function kind afterwards.
    fn resolve_function(
        &mut self,
        params: &'src [&'src Token<'src>],
        body: &'src [Stmt<'src>],
        function_type: FunctionType,
    ) {
        let enclosing = self.current_function;
        self.current_function = function_type;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        for stmt in body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &'src Token<'src>) {
        let Some(scope) = self.scopes.last_mut() else {
            // Global scope: redeclaration is allowed there.
            return;
        };

        let duplicate = scope.contains_key(name.lexeme);

        scope.insert(name.lexeme, false);

        if duplicate {
            self.error(
                name.line,
                "Variable with this name already declared in this scope.",
            );
        }
    }

    fn define(&mut self, name: &'src Token<'src>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    fn error(&mut self, line: usize, message: &str) {
        debug!("Resolution error at line {}: {}", line, message);

        self.errors.push(SableError::resolve(line, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as a local at its scope distance, or
    /// leave it unrecorded if no local scope contains it (implicit global).
    fn resolve_local(&mut self, expr: &'src Expr<'src>, name: &Token<'src>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.note_local(expr, depth);

                return;
            }
        }

        debug!("'{}' left for dynamic global lookup", name.lexeme);
    }
}
