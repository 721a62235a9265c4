//! Runtime object model: user-defined functions (closures), classes with
//! single inheritance, and instances.
//!
//! Inheritance is modelled as an explicit optional parent reference per
//! class plus an explicit chain walk for method lookup, so arity and method
//! resolution live in one place. Instances themselves are stored in an
//! arena owned by the interpreter and addressed by [`InstanceId`]; the
//! structs here only describe their shape.

use std::collections::HashMap;
use std::rc::Rc;

use crate::environment::EnvId;
use crate::parser::Stmt;
use crate::token::Token;
use crate::value::Value;

/// Reserved name of a class constructor.
pub const CONSTRUCTOR: &str = "init";

/// Handle to an instance in the interpreter's instance arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceId(pub usize);

/// A user-defined function or method: references into its declaration AST,
/// the frame it closes over, and whether it is a class initializer.
#[derive(Debug, Clone)]
pub struct Function<'src> {
    pub name: String,

    /// Parameter name tokens from the declaration.
    pub params: &'src [&'src Token<'src>],

    pub body: &'src [Stmt<'src>],

    /// Frame active at the definition site. Call frames parent here — never
    /// at the caller's frame — which is what makes scoping lexical rather
    /// than dynamic.
    pub closure: EnvId,

    /// True for methods named [`CONSTRUCTOR`]; an initializer call always
    /// yields the bound instance.
    pub is_initializer: bool,
}

impl Function<'_> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A class: name, optional single parent, and its method table. Methods are
/// resolved on demand through the parent chain, never copied downward.
#[derive(Debug)]
pub struct Class<'src> {
    pub name: String,
    pub superclass: Option<Rc<Class<'src>>>,
    pub methods: HashMap<String, Rc<Function<'src>>>,
}

impl<'src> Class<'src> {
    /// Walk the method-resolution chain, most-derived class first. Returns
    /// the method together with the *defining* class's superclass — exactly
    /// what a binding needs so that `super` inside the method starts one
    /// level above the class that defines it, not above the instance's
    /// most-derived class.
    pub fn find_method(
        &self,
        name: &str,
    ) -> Option<(Rc<Function<'src>>, Option<Rc<Class<'src>>>)> {
        if let Some(method) = self.methods.get(name) {
            return Some((Rc::clone(method), self.superclass.clone()));
        }

        self.superclass
            .as_ref()
            .and_then(|sup| sup.find_method(name))
    }

    /// A class's arity is its initializer's, found anywhere in the ancestor
    /// chain; a class with no initializer takes no arguments.
    pub fn arity(&self) -> usize {
        self.find_method(CONSTRUCTOR)
            .map_or(0, |(init, _)| init.arity())
    }
}

/// A class instance: a shared class reference plus its private, per-instance
/// field table.
#[derive(Debug)]
pub struct Instance<'src> {
    pub class: Rc<Class<'src>>,
    pub fields: HashMap<String, Value<'src>>,
}

impl<'src> Instance<'src> {
    pub fn new(class: Rc<Class<'src>>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}
