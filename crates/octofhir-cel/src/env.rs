//! Evaluation environment
//!
//! A [`CelEnv`] owns everything needed to turn source text into a result:
//! the container namespace, the type registry, checker declarations, the
//! function dispatcher and a set of environment-level variable bindings.
//! Plans produced by one environment can be evaluated concurrently; every
//! `check` call runs its own checker over the shared declarations.

use octofhir_cel_ast::{Expr, ParsedExpr};
use octofhir_cel_checker::{CheckedExpr, CheckerEnv, CheckerOptions, check};
use octofhir_cel_diagnostics::{Diagnostic, Result};
use octofhir_cel_eval::{
    Activation, CelError, CelResult, EmptyActivation, FuncRegistry, HierarchicalActivation,
    Interpretable, MapActivation, OrderedDispatcher, Planner, Value, standard_functions,
};
use octofhir_cel_model::{ProtoRegistry, TypeProvider};
use octofhir_cel_parser::{ParseOptions, parse_with_options};
use octofhir_cel_types::{FunctionDecl, IdentDecl, Namespace};
use parking_lot::RwLock;
use std::sync::Arc;

/// A configured CEL environment
#[derive(Debug)]
pub struct CelEnv {
    parse_options: ParseOptions,
    checker: Arc<CheckerEnv>,
    planner: Planner,
    bindings: RwLock<MapActivation>,
}

impl Default for CelEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl CelEnv {
    /// Root-container environment with the standard library
    pub fn new() -> Self {
        let provider: Arc<dyn TypeProvider> = Arc::new(ProtoRegistry::new());
        let checker = CheckerEnv::new(
            Namespace::root(),
            Arc::clone(&provider),
            CheckerOptions::default(),
        );
        Self::from_parts(ParseOptions::default(), checker, OrderedDispatcher::standard())
    }

    pub fn builder() -> CelEnvBuilder {
        CelEnvBuilder::new()
    }

    fn from_parts(
        parse_options: ParseOptions,
        checker: CheckerEnv,
        dispatcher: OrderedDispatcher,
    ) -> Self {
        let planner = Planner::new(
            dispatcher,
            Arc::clone(checker.provider()),
            checker.namespace().clone(),
        );
        Self {
            parse_options,
            checker: Arc::new(checker),
            planner,
            bindings: RwLock::new(MapActivation::new()),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.checker.namespace()
    }

    pub fn checker_env(&self) -> &Arc<CheckerEnv> {
        &self.checker
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Bind an environment-level variable, returning the previous value
    ///
    /// Bindings passed to [`CelEnv::eval`] shadow these.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.bindings.write().insert(name, value)
    }

    pub fn parse(&self, source: &str) -> Result<ParsedExpr> {
        parse_with_options(source, self.parse_options)
    }

    pub fn check(&self, parsed: &ParsedExpr) -> Result<CheckedExpr> {
        check(parsed, &self.checker)
    }

    pub fn plan(&self, expr: &Expr) -> Result<Interpretable> {
        self.planner.plan(expr)
    }

    /// Parse, check and plan `source`
    pub fn compile(&self, source: &str) -> Result<Interpretable> {
        let parsed = self.parse(source)?;
        let checked = self.check(&parsed)?;
        self.plan(&checked.expr)
    }

    /// Parse and check `source`, reporting every problem found
    ///
    /// An empty list means the expression compiles.
    pub fn diagnose(&self, source: &str) -> Vec<Diagnostic> {
        match self.parse(source).and_then(|parsed| self.check(&parsed)) {
            Ok(_) => Vec::new(),
            Err(err) => err.diagnostics(),
        }
    }

    /// Evaluate a plan over `vars` layered on the environment bindings
    ///
    /// A top-level `google.protobuf.Any` result is unpacked.
    pub fn eval(&self, plan: &Interpretable, vars: &dyn Activation) -> CelResult {
        let bindings = self.bindings.read();
        let scope = HierarchicalActivation::new(&*bindings, vars);
        plan.eval(&scope).and_then(Value::unpack_any)
    }

    /// Parse, plan and evaluate `source` against the environment bindings
    ///
    /// The expression is not type checked. Parse and plan failures are
    /// reported as evaluation errors.
    pub fn run(&self, source: &str) -> CelResult {
        let plan = self
            .parse(source)
            .and_then(|parsed| self.plan(&parsed.expr))
            .map_err(|err| CelError::new(err.to_string()))?;
        self.eval(&plan, &EmptyActivation)
    }
}

/// Evaluate `source` in a default environment
pub fn run(source: &str) -> CelResult {
    CelEnv::new().run(source)
}

/// Builder for [`CelEnv`]
#[derive(Debug, Default)]
pub struct CelEnvBuilder {
    container: String,
    registry: Option<ProtoRegistry>,
    funcs: Vec<FuncRegistry>,
    idents: Vec<IdentDecl>,
    functions: Vec<FunctionDecl>,
    checker_options: CheckerOptions,
    parse_options: ParseOptions,
}

impl CelEnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace used to resolve unqualified names
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn registry(mut self, registry: ProtoRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Host functions, consulted before the standard library
    ///
    /// Registries added earlier take precedence over later ones.
    pub fn funcs(mut self, funcs: FuncRegistry) -> Self {
        self.funcs.push(funcs);
        self
    }

    /// Identifier declarations for the checker
    pub fn idents(mut self, idents: impl IntoIterator<Item = IdentDecl>) -> Self {
        self.idents.extend(idents);
        self
    }

    /// Function declarations for the checker
    pub fn functions(mut self, functions: impl IntoIterator<Item = FunctionDecl>) -> Self {
        self.functions.extend(functions);
        self
    }

    pub fn checker_options(mut self, options: CheckerOptions) -> Self {
        self.checker_options = options;
        self
    }

    pub fn parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// Build the environment
    ///
    /// Fails when a declaration conflicts with one already present.
    pub fn build(self) -> Result<CelEnv> {
        let provider: Arc<dyn TypeProvider> = Arc::new(self.registry.unwrap_or_default());
        let mut checker = CheckerEnv::new(
            Namespace::new(&self.container),
            provider,
            self.checker_options,
        );
        checker.add_idents(self.idents)?;
        checker.add_functions(self.functions)?;

        let host_registries = self.funcs.len();
        let mut dispatcher = OrderedDispatcher::new();
        for funcs in self.funcs {
            dispatcher.add(funcs);
        }
        dispatcher.add(standard_functions());

        log::debug!(
            "built CEL environment (container '{}', {} host function registries)",
            self.container,
            host_registries
        );
        Ok(CelEnv::from_parts(self.parse_options, checker, dispatcher))
    }
}
