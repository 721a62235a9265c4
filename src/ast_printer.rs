//! Parenthesized (Lisp-style) rendering of the syntax tree, used by the
//! `parse` subcommand and by parser tests to assert on tree shape.

use crate::parser::{Expr, LiteralValue, Stmt};

pub struct AstPrinter;

impl AstPrinter {
    /// Render a whole program, one statement per line.
    pub fn print_program(&self, statements: &[Stmt<'_>]) -> String {
        statements
            .iter()
            .map(|stmt| self.print_stmt(stmt))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_stmt(&self, stmt: &Stmt<'_>) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(expr {})", self.print(expr)),

            Stmt::Print(expr) => format!("(print {})", self.print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(expr) => format!("(var {} {})", name.lexeme, self.print(expr)),
                None => format!("(var {})", name.lexeme),
            },

            Stmt::Block(statements) => {
                let inner = statements
                    .iter()
                    .map(|s| self.print_stmt(s))
                    .collect::<Vec<_>>()
                    .join(" ");

                format!("(block {})", inner)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_stmt) => format!(
                    "(if {} {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch),
                    self.print_stmt(else_stmt)
                ),
                None => format!(
                    "(if {} {})",
                    self.print(condition),
                    self.print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => {
                format!("(while {} {})", self.print(condition), self.print_stmt(body))
            }

            Stmt::Function { name, params, body } => {
                let params = params
                    .iter()
                    .map(|p| p.lexeme)
                    .collect::<Vec<_>>()
                    .join(" ");

                let body = body
                    .iter()
                    .map(|s| self.print_stmt(s))
                    .collect::<Vec<_>>()
                    .join(" ");

                format!("(fun {} ({}) {})", name.lexeme, params, body)
            }

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("(return {})", self.print(expr)),
                None => "(return)".to_string(),
            },

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let methods = methods
                    .iter()
                    .map(|m| self.print_stmt(m))
                    .collect::<Vec<_>>()
                    .join(" ");

                match superclass {
                    Some(sup) => {
                        format!("(class {} (< {}) {})", name.lexeme, self.print(sup), methods)
                    }
                    None => format!("(class {} {})", name.lexeme, methods),
                }
            }
        }
    }

    pub fn print(&self, expr: &Expr<'_>) -> String {
        match expr {
            Expr::Literal(literal) => match literal {
                // Integral numbers render with a trailing ".0" so the tree
                // shows their f64 nature.
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::True => "true".to_string(),

                LiteralValue::False => "false".to_string(),

                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Variable(name) => name.lexeme.to_string(),

            Expr::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut rendered = format!("(call {}", self.print(callee));

                for arg in arguments {
                    rendered.push(' ');
                    rendered.push_str(&self.print(arg));
                }

                rendered.push(')');

                rendered
            }

            Expr::Get { object, name } => {
                format!("(get {} {})", self.print(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(set {} {} {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This(_) => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }
}
