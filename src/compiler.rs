//! The entry points that turn program text into evaluated automata.

use crate::ast::Node;
use crate::evaluator::{Automaton, Evaluator, TestOutcome};
use crate::parser;
use crate::scope::Scope;
use crate::token::Token;
use crate::types::{CompileError, Options, MAX_PROGRAM_SIZE};
use std::rc::Rc;

/// Everything produced by a successful evaluation.
#[derive(Debug)]
pub struct Evaluation {
    pub module: Node,
    pub tokens: Vec<Token>,
    /// The global scope. Nothing defines into it after evaluation finishes.
    pub scope: Rc<Scope>,
    pub output: Vec<String>,
    pub tests: Vec<TestOutcome>,
}

impl Evaluation {
    /// The automaton or grammar declared globally as `name`.
    pub fn automaton(&self, name: &str) -> Option<Automaton> {
        self.automata()
            .into_iter()
            .find_map(|(declared, automaton)| (declared == name).then_some(automaton))
    }

    /// Every global declaration with its result, in declaration order.
    pub fn automata(&self) -> Vec<(String, Automaton)> {
        self.scope.automata()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: Options,
}

impl Compiler {
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Parses `source` into its syntax tree and the tokens that were consumed.
    ///
    /// # Returns
    ///
    /// * `Err(CompileError::TooLarge)` if the source exceeds [`MAX_PROGRAM_SIZE`].
    /// * `Err(CompileError::Syntax)` if the source does not parse.
    pub fn compile(&self, source: &str) -> Result<(Node, Vec<Token>), CompileError> {
        if source.len() > MAX_PROGRAM_SIZE {
            return Err(CompileError::TooLarge(source.len()));
        }

        let (module, tokens) = parser::parse(source)?;
        log::debug!("Parsed {} tokens", tokens.len());
        Ok((module, tokens))
    }

    /// Compiles and evaluates `source`.
    pub fn evaluate(&self, source: &str) -> Result<Evaluation, CompileError> {
        let (module, tokens) = self.compile(source)?;

        let mut evaluator = Evaluator::new(self.options.clone());
        let scope = evaluator.evaluate(&module)?;
        let (output, tests) = evaluator.into_parts();
        log::debug!(
            "Evaluated {} declarations, {} test results",
            scope.names().len(),
            tests.len()
        );

        Ok(Evaluation {
            module,
            tokens,
            scope,
            output,
            tests,
        })
    }
}

/// Compiles `source` with the default options.
pub fn compile(source: &str) -> Result<(Node, Vec<Token>), CompileError> {
    Compiler::default().compile(source)
}

/// Compiles and evaluates `source` with the default options.
pub fn evaluate(source: &str) -> Result<Evaluation, CompileError> {
    Compiler::default().evaluate(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvaluationError, SyntaxError};

    #[test]
    fn test_evaluate_program() {
        let evaluation = evaluate(
            "finite x {\n initial a\n final a\n a a -> a\n}\nprint \"done\"\ntest x [\"aa\", \"b\"]",
        )
        .unwrap();

        assert_eq!(evaluation.output, vec!["done"]);
        assert_eq!(evaluation.tests.len(), 2);
        assert_eq!(evaluation.tests[0].accepted, Some(true));
        assert_eq!(evaluation.tests[1].accepted, Some(false));
        assert!(matches!(evaluation.automaton("x"), Some(Automaton::Finite(_))));
        assert!(evaluation.automaton("y").is_none());
        assert_eq!(evaluation.automata().len(), 1);
    }

    #[test]
    fn test_compile_keeps_tokens() {
        let (_, tokens) = compile("finite x { initial a }").unwrap();

        assert!(!tokens.is_empty());
        assert_eq!(tokens[0].value, "finite");
    }

    #[test]
    fn test_too_large() {
        let source = "// ".to_string() + &"x".repeat(MAX_PROGRAM_SIZE);

        assert_eq!(
            compile(&source).unwrap_err(),
            CompileError::TooLarge(source.len())
        );
    }

    #[test]
    fn test_errors_are_distinct() {
        assert!(matches!(
            evaluate("finite {").unwrap_err(),
            CompileError::Syntax(SyntaxError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            evaluate("finite x {\n final a\n}").unwrap_err(),
            CompileError::Evaluation(EvaluationError::MissingInitialState { .. })
        ));
    }

    #[test]
    fn test_options_bound_tests() {
        let compiler = Compiler::with_options(Options { max_layers: 3 });
        let evaluation = compiler
            .evaluate("finite x {\n initial a\n final b\n a $eps -> a\n}\ntest x \"x\"")
            .unwrap();

        assert_eq!(compiler.options().max_layers, 3);
        assert_eq!(evaluation.tests[0].accepted, None);
    }
}
