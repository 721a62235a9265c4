#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use sable::interpreter::Interpreter;
    use sable::parser::Parser;
    use sable::resolver::Resolver;
    use sable::scanner::Scanner;
    use sable::token::Token;

    /// Shared byte sink so a test can read back what the program printed.
    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);

            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("print output is UTF-8")
        }
    }

    /// Run a program through the full pipeline, returning what it printed.
    fn run(source: &str) -> String {
        match try_run(source) {
            Ok(output) => output,
            Err((_, error)) => panic!("program failed unexpectedly: {}", error),
        }
    }

    /// Like `run`, but on failure returns the output printed so far together
    /// with the error message of whichever stage failed.
    fn try_run(source: &str) -> Result<String, (String, String)> {
        let tokens: Vec<Token> = Scanner::new(source)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (String::new(), e.to_string()))?;

        let statements = Parser::new(&tokens)
            .parse()
            .map_err(|errors| (String::new(), errors[0].to_string()))?;

        let sink = Sink::default();
        let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

        Resolver::new(&mut interpreter)
            .resolve(&statements)
            .map_err(|errors| (String::new(), errors[0].to_string()))?;

        interpreter
            .interpret(&statements)
            .map_err(|e| (sink.contents(), e.to_string()))?;

        Ok(sink.contents())
    }

    /// Run a program that must fail at runtime; returns (output, error).
    fn run_expecting_error(source: &str) -> (String, String) {
        try_run(source).expect_err("program was expected to fail")
    }

    // ───────────────────────── values and operators ─────────────────────────

    #[test]
    fn arithmetic_and_number_rendering() {
        assert_eq!(run("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run("print 10 / 4;"), "2.5\n");
        assert_eq!(run("print -(3 - 5);"), "2\n");
        assert_eq!(run("print 3.0;"), "3\n");
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(run("print 1 / 0;"), "inf\n");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run("print \"foo\" + \"bar\";"), "foobar\n");
    }

    #[test]
    fn mixed_plus_operands_are_rejected() {
        let (_, error) = run_expecting_error("print 1 + \"a\";");

        assert!(error.contains("Both operands must be either numbers or strings."));
    }

    #[test]
    fn unary_minus_requires_a_number() {
        let (_, error) = run_expecting_error("print -\"a\";");

        assert!(error.contains("Operand of '-' must be a number."));
    }

    #[test]
    fn comparison_requires_numbers() {
        let (_, error) = run_expecting_error("print 1 < \"a\";");

        assert!(error.contains("Operands of '<' must be numbers."));
    }

    #[test]
    fn runtime_errors_carry_the_operator_line() {
        let (_, error) = run_expecting_error("var a = 1;\nvar b = \"two\";\nprint a * b;");

        assert!(error.contains("[line 3]"), "got: {}", error);
    }

    #[test]
    fn equality_is_null_safe_and_structural() {
        assert_eq!(run("print 1 == 1;"), "true\n");
        assert_eq!(run("print \"a\" == \"a\";"), "true\n");
        assert_eq!(run("print nil == nil;"), "true\n");
        assert_eq!(run("print nil == false;"), "false\n");
        assert_eq!(run("print \"1\" == 1;"), "false\n");
        assert_eq!(run("print 1 != 2;"), "true\n");
    }

    #[test]
    fn truthiness_only_rejects_nil_and_false() {
        assert_eq!(run("if (0) print \"zero\";"), "zero\n");
        assert_eq!(run("if (\"\") print \"empty\";"), "empty\n");
        assert_eq!(run("if (nil) print \"yes\"; else print \"no\";"), "no\n");
        assert_eq!(run("if (false) print \"yes\"; else print \"no\";"), "no\n");
    }

    #[test]
    fn logical_operators_yield_the_operand_value() {
        assert_eq!(run("print \"a\" or \"b\";"), "a\n");
        assert_eq!(run("print nil or \"b\";"), "b\n");
        assert_eq!(run("print nil and \"b\";"), "nil\n");
        assert_eq!(run("print 1 and 2;"), "2\n");
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right operand would blow up if evaluated.
        assert_eq!(run("print false and missing;"), "false\n");
        assert_eq!(run("print true or missing;"), "true\n");
    }

    // ───────────────────────── variables and scoping ─────────────────────────

    #[test]
    fn globals_define_and_assign() {
        assert_eq!(run("var a = 1; a = a + 1; print a;"), "2\n");
    }

    #[test]
    fn undefined_variable_read_is_a_runtime_error() {
        let (_, error) = run_expecting_error("print missing;");

        assert!(error.contains("Undefined variable 'missing'."));
    }

    #[test]
    fn assigning_an_undeclared_name_is_a_runtime_error() {
        let (_, error) = run_expecting_error("missing = 1;");

        assert!(error.contains("Undefined variable 'missing'."));
    }

    #[test]
    fn shadowing_is_contained_to_its_block() {
        assert_eq!(
            run("var a = \"outer\"; { var a = \"inner\"; print a; } print a;"),
            "inner\nouter\n"
        );
    }

    #[test]
    fn assignment_in_a_block_reaches_the_enclosing_binding() {
        assert_eq!(run("var a = 1; { a = 2; } print a;"), "2\n");
    }

    #[test]
    fn global_self_reference_reads_the_previous_binding() {
        assert_eq!(run("var a = \"first\"; var a = a; print a;"), "first\n");
    }

    #[test]
    fn global_self_reference_without_prior_binding_fails_at_runtime() {
        let (_, error) = run_expecting_error("var a = a;");

        assert!(error.contains("Undefined variable 'a'."));
    }

    #[test]
    fn closures_capture_their_defining_frame_not_the_call_site() {
        // The classic program distinguishing static from dynamic resolution:
        // both calls must print "global" even after the block declares its
        // own `a`.
        let source = "\
var a = \"global\";
{
  fun showA() {
    print a;
  }
  showA();
  var a = \"block\";
  showA();
}";

        assert_eq!(run(source), "global\nglobal\n");
    }

    // ───────────────────────── functions and closures ─────────────────────────

    #[test]
    fn function_calls_bind_parameters_and_return() {
        assert_eq!(
            run("fun add(a, b) { return a + b; } print add(1, 2);"),
            "3\n"
        );
    }

    #[test]
    fn falling_off_the_end_yields_nil() {
        assert_eq!(run("fun noop() {} print noop();"), "nil\n");
    }

    #[test]
    fn recursion_works_through_the_global_binding() {
        assert_eq!(
            run("fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); } print fib(10);"),
            "55\n"
        );
    }

    #[test]
    fn return_from_a_nested_block_unwinds_to_the_call_boundary() {
        assert_eq!(
            run("fun f() { var a = \"outer\"; { var b = \"inner\"; return b; } } print f();"),
            "inner\n"
        );
    }

    #[test]
    fn counters_from_the_same_factory_are_independent() {
        let source = "\
fun makeCounter() {
  var count = 0;
  fun increment() {
    count = count + 1;
    return count;
  }
  return increment;
}
var a = makeCounter();
var b = makeCounter();
print a();
print a();
print b();
print b();";

        assert_eq!(run(source), "1\n2\n1\n2\n");
    }

    #[test]
    fn a_closure_stored_in_its_own_frame_is_callable() {
        // The cyclic case: `f` lives in the block frame that `g` closes
        // over, and then holds `g` itself.
        let source = "\
{
  var f = nil;
  fun g() {
    return f;
  }
  f = g;
  print f() == g;
}";

        assert_eq!(run(source), "true\n");
    }

    #[test]
    fn arity_mismatch_fails_before_any_callee_side_effect() {
        let source = "\
fun shout(a, b) {
  print \"called\";
  return a;
}
shout(1);";

        let (output, error) = run_expecting_error(source);

        assert!(error.contains("Expected 2 arguments but got 1."));
        assert_eq!(output, "", "callee body must not have run");
    }

    #[test]
    fn calling_a_non_callable_value_is_a_runtime_error() {
        let (_, error) = run_expecting_error("\"text\"();");

        assert!(error.contains("Can only call functions and classes."));
    }

    #[test]
    fn functions_render_by_name() {
        assert_eq!(run("fun f() {} print f;"), "<fn f>\n");
        assert_eq!(run("print clock;"), "<native fn>\n");
    }

    #[test]
    fn native_clock_returns_a_positive_number() {
        assert_eq!(run("print clock() > 0;"), "true\n");
        let (_, error) = run_expecting_error("clock(1);");

        assert!(error.contains("Expected 0 arguments but got 1."));
    }

    // ───────────────────────── classes and instances ─────────────────────────

    #[test]
    fn classes_and_instances_render_by_class_name() {
        assert_eq!(run("class C {} print C;"), "C\n");
        assert_eq!(run("class C {} print C();"), "C instance\n");
    }

    #[test]
    fn fields_are_per_instance() {
        let source = "\
class Bag {}
var a = Bag();
var b = Bag();
a.item = \"apple\";
b.item = \"brick\";
print a.item;
print b.item;";

        assert_eq!(run(source), "apple\nbrick\n");
    }

    #[test]
    fn methods_bind_this_to_their_instance() {
        let source = "\
class Greeter {
  init(name) {
    this.name = name;
  }
  greet() {
    return \"hi \" + this.name;
  }
}
print Greeter(\"ada\").greet();";

        assert_eq!(run(source), "hi ada\n");
    }

    #[test]
    fn a_detached_bound_method_keeps_its_this() {
        let source = "\
class Greeter {
  init(name) {
    this.name = name;
  }
  greet() {
    return \"hi \" + this.name;
  }
}
var g = Greeter(\"ada\");
var f = g.greet;
print f();";

        assert_eq!(run(source), "hi ada\n");
    }

    #[test]
    fn a_field_shadows_a_method_of_the_same_name() {
        let source = "\
class Box {
  label() {
    return \"method\";
  }
}
var box = Box();
print box.label();
box.label = \"field\";
print box.label;";

        assert_eq!(run(source), "method\nfield\n");
    }

    #[test]
    fn initializer_populates_fields_and_yields_the_instance() {
        let source = "\
class Point {
  init(x, y) {
    this.x = x;
    this.y = y;
  }
  sum() {
    return this.x + this.y;
  }
}
var p = Point(3, 4);
print p.sum();";

        assert_eq!(run(source), "7\n");
    }

    #[test]
    fn reinvoking_init_through_an_instance_returns_the_instance() {
        let source = "\
class Point {
  init(x) {
    this.x = x;
  }
}
var p = Point(1);
print p.init(2);
print p.x;";

        assert_eq!(run(source), "Point instance\n2\n");
    }

    #[test]
    fn bare_return_in_an_initializer_yields_the_instance() {
        let source = "\
class Guard {
  init(armed) {
    if (armed) return;
    this.note = \"disarmed\";
  }
}
print Guard(true);
print Guard(false).note;";

        assert_eq!(run(source), "Guard instance\ndisarmed\n");
    }

    #[test]
    fn class_arity_follows_its_initializer() {
        let (_, error) = run_expecting_error(
            "class Point { init(x, y) { this.x = x; this.y = y; } } Point(1);",
        );

        assert!(error.contains("Expected 2 arguments but got 1."));
    }

    #[test]
    fn undefined_property_access_is_a_runtime_error() {
        let (_, error) = run_expecting_error("class C {} print C().missing;");

        assert!(error.contains("Undefined property 'missing'."));
    }

    #[test]
    fn property_access_requires_an_instance() {
        let (_, error) = run_expecting_error("var x = 1; print x.field;");

        assert!(error.contains("Only instances have properties."));

        let (_, error) = run_expecting_error("var x = 1; x.field = 2;");

        assert!(error.contains("Only instances have fields."));
    }

    #[test]
    fn methods_may_reference_their_own_class_by_name() {
        let source = "\
class Factory {
  spawn() {
    return Factory();
  }
}
print Factory().spawn();";

        assert_eq!(run(source), "Factory instance\n");
    }

    #[test]
    fn instances_may_hold_themselves_without_breaking_equality() {
        let source = "\
class Node {}
var n = Node();
n.me = n;
print n.me == n;
print n.me == Node();";

        assert_eq!(run(source), "true\nfalse\n");
    }

    // ───────────────────────── inheritance ─────────────────────────

    #[test]
    fn methods_are_inherited_through_the_chain() {
        let source = "\
class A {
  hello() {
    return \"hello from A\";
  }
}
class B < A {}
class C < B {}
print C().hello();";

        assert_eq!(run(source), "hello from A\n");
    }

    #[test]
    fn initializers_are_inherited() {
        let source = "\
class A {
  init(x) {
    this.x = x;
  }
}
class B < A {}
print B(5).x;";

        assert_eq!(run(source), "5\n");
    }

    #[test]
    fn overriding_replaces_the_inherited_method() {
        let source = "\
class A {
  m() {
    return \"A\";
  }
}
class B < A {
  m() {
    return \"B\";
  }
}
print B().m();";

        assert_eq!(run(source), "B\n");
    }

    #[test]
    fn super_calls_the_superclass_method_with_this_preserved() {
        // `super.m()` must reach A's `m` even though B overrides it, and
        // `this` inside A's `m` must still be the B instance.
        let source = "\
class A {
  m() {
    return \"A sees \" + this.tag;
  }
}
class B < A {
  m() {
    return \"B\";
  }
  viaSuper() {
    return super.m();
  }
}
var b = B();
b.tag = \"b\";
print b.m();
print b.viaSuper();";

        assert_eq!(run(source), "B\nA sees b\n");
    }

    #[test]
    fn super_resolves_from_the_defining_class_not_the_instance() {
        // C inherits B's `test`; its `super` must still mean A (one level
        // above the defining class B), not B itself.
        let source = "\
class A {
  m() {
    return \"A\";
  }
}
class B < A {
  m() {
    return \"B\";
  }
  test() {
    return super.m();
  }
}
class C < B {
  m() {
    return \"C\";
  }
}
print C().test();";

        assert_eq!(run(source), "A\n");
    }

    #[test]
    fn subclass_init_may_chain_to_super_init() {
        let source = "\
class A {
  init(x) {
    this.x = x;
  }
}
class B < A {
  init(x, y) {
    super.init(x);
    this.y = y;
  }
}
var b = B(1, 2);
print b.x + b.y;";

        assert_eq!(run(source), "3\n");
    }

    #[test]
    fn superclass_expression_must_evaluate_to_a_class() {
        let (_, error) = run_expecting_error("var NotAClass = 1; class B < NotAClass {}");

        assert!(error.contains("Superclass must be a class."));
    }

    // ───────────────────────── control flow ─────────────────────────

    #[test]
    fn while_loops_reevaluate_their_condition() {
        assert_eq!(
            run("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn for_loops_run_their_desugared_form() {
        assert_eq!(
            run("var sum = 0; for (var i = 1; i <= 3; i = i + 1) sum = sum + i; print sum;"),
            "6\n"
        );
    }

    #[test]
    fn for_loop_variable_is_scoped_to_the_loop() {
        let (_, error) = run_expecting_error("for (var i = 0; i < 1; i = i + 1) {} print i;");

        assert!(error.contains("Undefined variable 'i'."));
    }

    // ───────────────────────── run isolation ─────────────────────────

    #[test]
    fn independent_runs_of_the_same_source_agree() {
        let source = "\
var total = 0;
fun bump(by) {
  total = total + by;
  return total;
}
class Tally {
  init() {
    this.count = bump(10);
  }
}
print Tally().count;
print bump(5);";

        let first = run(source);
        let second = run(source);

        assert_eq!(first, second);
        assert_eq!(first, "10\n15\n");
    }
}
