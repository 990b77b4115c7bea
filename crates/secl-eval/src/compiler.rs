//! Compilation of an [Expr] tree into a tree of closures.
//!
//! Every node is type checked against the [Model], the macros, the constants
//! and the variables available in a [CompileEnv], then turned into a boxed
//! closure taking the evaluation [Context]. The result of a rule expression
//! is a [Predicate].

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use crate::{
    ast::Expr, BitOperator, Context, EvalError, Event, MacroStore, Model, MultiOperator, Operator,
    PatternOperator, RelationalOperator, Value, ValueType, Variable, VariableMap,
};

type EvalFn<E, T> = Box<dyn Fn(&Context<'_, E>) -> T + Send + Sync>;

type Getter<E> = Arc<dyn Fn(&Context<'_, E>) -> Value + Send + Sync>;

fn eval_fn<E, T, F>(f: F) -> EvalFn<E, T>
where
    F: Fn(&Context<'_, E>) -> T + Send + Sync + 'static,
{
    Box::new(f)
}

fn getter<E, F>(f: F) -> Getter<E>
where
    F: Fn(&Context<'_, E>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A compiled expression, typed by its result.
pub enum Evaluator<E> {
    Bool(EvalFn<E, bool>),
    Int(EvalFn<E, i64>),
    String(EvalFn<E, String>),
    StringArray(EvalFn<E, Vec<String>>),
    IntArray(EvalFn<E, Vec<i64>>),
}

impl<E> Evaluator<E> {
    pub fn value_type(&self) -> ValueType {
        match self {
            Evaluator::Bool(_) => ValueType::Bool,
            Evaluator::Int(_) => ValueType::Int,
            Evaluator::String(_) => ValueType::String,
            Evaluator::StringArray(_) => ValueType::StringArray,
            Evaluator::IntArray(_) => ValueType::IntArray,
        }
    }

    pub fn evaluate(&self, ctx: &Context<'_, E>) -> Value {
        match self {
            Evaluator::Bool(f) => Value::Bool(f(ctx)),
            Evaluator::Int(f) => Value::Int(f(ctx)),
            Evaluator::String(f) => Value::String(f(ctx)),
            Evaluator::StringArray(f) => Value::StringArray(f(ctx)),
            Evaluator::IntArray(f) => Value::IntArray(f(ctx)),
        }
    }
}

/// Wrap an untyped getter into the evaluator of the given type.
fn typed_evaluator<E: 'static>(value_type: ValueType, get: Getter<E>) -> Evaluator<E> {
    match value_type {
        ValueType::Bool => Evaluator::Bool(eval_fn(move |ctx| get(ctx).into_bool())),
        ValueType::Int => Evaluator::Int(eval_fn(move |ctx| get(ctx).into_int())),
        ValueType::String => Evaluator::String(eval_fn(move |ctx| get(ctx).into_string())),
        ValueType::StringArray => {
            Evaluator::StringArray(eval_fn(move |ctx| get(ctx).into_string_array()))
        }
        ValueType::IntArray => Evaluator::IntArray(eval_fn(move |ctx| get(ctx).into_int_array())),
    }
}

/// Everything an expression can reference.
pub struct CompileEnv<'a, E: Event> {
    pub model: &'a Model<E>,
    pub constants: &'a HashMap<String, Value>,
    pub macros: &'a MacroStore,
    pub variables: &'a VariableMap<E>,
}

impl<'a, E: Event> CompileEnv<'a, E> {
    pub fn new(
        model: &'a Model<E>,
        constants: &'a HashMap<String, Value>,
        macros: &'a MacroStore,
        variables: &'a VariableMap<E>,
    ) -> Self {
        Self {
            model,
            constants,
            macros,
            variables,
        }
    }
}

/// Compiled boolean expression of a rule.
pub struct Predicate<E> {
    eval: EvalFn<E, bool>,
    fields: Vec<String>,
    event_types: Vec<String>,
}

impl<E> Predicate<E> {
    pub fn is_match(&self, ctx: &Context<'_, E>) -> bool {
        (self.eval)(ctx)
    }

    /// Sorted names of the fields read by the expression, macros included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Sorted event types of the fields read by the expression.
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }
}

/// Compile a rule expression, its result must be a boolean.
pub fn compile_predicate<E: Event>(
    expr: &Expr,
    env: &CompileEnv<'_, E>,
) -> Result<Predicate<E>, EvalError> {
    let mut compiler = Compiler::new(env);
    let eval = compiler.compile_bool(expr)?;

    log::trace!(
        "compiled predicate reading fields {:?} of event types {:?}",
        compiler.fields,
        compiler.event_types
    );

    Ok(Predicate {
        eval,
        fields: compiler.fields.into_iter().collect(),
        event_types: compiler.event_types.into_iter().collect(),
    })
}

/// Type check an expression and return the type of its result.
pub fn check_expression<E: Event>(
    expr: &Expr,
    env: &CompileEnv<'_, E>,
) -> Result<ValueType, EvalError> {
    Compiler::new(env)
        .compile(expr)
        .map(|evaluator| evaluator.value_type())
}

enum Matcher {
    Glob(glob::Pattern),
    Regex(regex::Regex),
}

impl Matcher {
    fn glob(pattern: &str) -> Result<Self, EvalError> {
        glob::Pattern::new(pattern)
            .map(Matcher::Glob)
            .map_err(|err| EvalError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })
    }

    fn regex(pattern: &str) -> Result<Self, EvalError> {
        regex::Regex::new(pattern)
            .map(Matcher::Regex)
            .map_err(|err| EvalError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            Matcher::Glob(pattern) => pattern.matches(value),
            Matcher::Regex(regex) => regex.is_match(value),
        }
    }
}

enum Segment<E> {
    Text(String),
    Variable(Arc<dyn Variable<E>>),
}

struct Compiler<'a, E: Event> {
    env: &'a CompileEnv<'a, E>,
    fields: BTreeSet<String>,
    event_types: BTreeSet<String>,
    expanding: Vec<String>,
}

impl<'a, E: Event> Compiler<'a, E> {
    fn new(env: &'a CompileEnv<'a, E>) -> Self {
        Self {
            env,
            fields: BTreeSet::new(),
            event_types: BTreeSet::new(),
            expanding: Vec::new(),
        }
    }

    fn compile(&mut self, expr: &Expr) -> Result<Evaluator<E>, EvalError> {
        match expr {
            Expr::Or { l, r } => {
                let l = self.compile_bool(l)?;
                let r = self.compile_bool(r)?;
                Ok(Evaluator::Bool(eval_fn(move |ctx| l(ctx) || r(ctx))))
            }
            Expr::And { l, r } => {
                let l = self.compile_bool(l)?;
                let r = self.compile_bool(r)?;
                Ok(Evaluator::Bool(eval_fn(move |ctx| l(ctx) && r(ctx))))
            }
            Expr::Not { inner } => {
                let inner = self.compile_bool(inner)?;
                Ok(Evaluator::Bool(eval_fn(move |ctx| !inner(ctx))))
            }
            Expr::Compare { l, op, r } => self.compile_compare(l, *op, r),
            Expr::Bitwise { l, op, r } => self.compile_bitwise(l, *op, r),
            Expr::Bool(b) => {
                let b = *b;
                Ok(Evaluator::Bool(eval_fn(move |_| b)))
            }
            Expr::Int(i) => {
                let i = *i;
                Ok(Evaluator::Int(eval_fn(move |_| i)))
            }
            Expr::String(s) => self.compile_string(s),
            Expr::Regex(_) => Err(EvalError::UnexpectedRegex),
            Expr::Identifier(name) => self.compile_identifier(name),
            Expr::Variable(name) => {
                let variable = self.variable(name)?;
                let value_type = variable.value_type();
                Ok(typed_evaluator(
                    value_type,
                    getter(move |ctx| {
                        variable
                            .get(ctx)
                            .unwrap_or_else(|| Value::zero(value_type))
                    }),
                ))
            }
            Expr::Array(items) => self.compile_array(items),
        }
    }

    fn compile_bool(&mut self, expr: &Expr) -> Result<EvalFn<E, bool>, EvalError> {
        match self.compile(expr)? {
            Evaluator::Bool(f) => Ok(f),
            other => Err(EvalError::TypeMismatch {
                expected: ValueType::Bool,
                got: other.value_type(),
            }),
        }
    }

    fn compile_identifier(&mut self, name: &str) -> Result<Evaluator<E>, EvalError> {
        let env = self.env;

        if let Some(field) = env.model.field(name) {
            self.fields.insert(field.name().to_string());
            if !field.event_type().is_empty() {
                self.event_types.insert(field.event_type().to_string());
            }
            let accessor = field.accessor();
            return Ok(typed_evaluator(
                field.value_type(),
                getter(move |ctx| accessor(ctx.event())),
            ));
        }

        if let Some(r#macro) = env.macros.get(name) {
            if self.expanding.iter().any(|id| id == name) {
                return Err(EvalError::RecursiveMacro(name.to_string()));
            }
            self.expanding.push(name.to_string());
            let evaluator = self.compile(r#macro.expr());
            self.expanding.pop();
            return evaluator;
        }

        if let Some(value) = env.constants.get(name) {
            let value = value.clone();
            return Ok(typed_evaluator(
                value.value_type(),
                getter(move |_| value.clone()),
            ));
        }

        Err(EvalError::UnknownIdentifier(name.to_string()))
    }

    fn variable(&self, name: &str) -> Result<Arc<dyn Variable<E>>, EvalError> {
        self.env
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    /// String literals with `${name}` references are interpolated at
    /// evaluation time.
    fn compile_string(&mut self, s: &str) -> Result<Evaluator<E>, EvalError> {
        let mut segments = Vec::new();
        let mut rest = s;
        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let name = &rest[start + 2..start + len];
            segments.push(Segment::Variable(self.variable(name)?));
            rest = &rest[start + len + 1..];
        }

        if segments.is_empty() {
            let s = s.to_string();
            return Ok(Evaluator::String(eval_fn(move |_| s.clone())));
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Evaluator::String(eval_fn(move |ctx| {
            segments
                .iter()
                .map(|segment| match segment {
                    Segment::Text(text) => text.clone(),
                    Segment::Variable(variable) => variable
                        .get(ctx)
                        .map(|value| value.to_plain_string())
                        .unwrap_or_default(),
                })
                .collect()
        })))
    }

    fn compile_array(&mut self, items: &[Expr]) -> Result<Evaluator<E>, EvalError> {
        let compiled = items
            .iter()
            .map(|item| self.compile(item))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(first) = compiled.first() else {
            return Err(EvalError::EmptyArray);
        };

        match first.value_type() {
            ValueType::Int => {
                let items = compiled
                    .into_iter()
                    .map(|item| match item {
                        Evaluator::Int(f) => Ok(f),
                        _ => Err(EvalError::HeterogeneousArray),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Evaluator::IntArray(eval_fn(move |ctx| {
                    items.iter().map(|f| f(ctx)).collect()
                })))
            }
            ValueType::String => {
                let items = compiled
                    .into_iter()
                    .map(|item| match item {
                        Evaluator::String(f) => Ok(f),
                        _ => Err(EvalError::HeterogeneousArray),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Evaluator::StringArray(eval_fn(move |ctx| {
                    items.iter().map(|f| f(ctx)).collect()
                })))
            }
            other => Err(EvalError::InvalidArrayElement(other)),
        }
    }

    fn compile_bitwise(
        &mut self,
        l: &Expr,
        op: BitOperator,
        r: &Expr,
    ) -> Result<Evaluator<E>, EvalError> {
        match (self.compile(l)?, self.compile(r)?) {
            (Evaluator::Int(l), Evaluator::Int(r)) => {
                Ok(Evaluator::Int(eval_fn(move |ctx| op.apply(l(ctx), r(ctx)))))
            }
            (l, r) => Err(EvalError::operator_not_allowed(
                op,
                l.value_type(),
                r.value_type(),
            )),
        }
    }

    fn compile_compare(
        &mut self,
        l: &Expr,
        op: Operator,
        r: &Expr,
    ) -> Result<Evaluator<E>, EvalError> {
        match op {
            Operator::Pattern(pattern_op) => {
                let left = self.compile(l)?;
                let matchers = self.matchers(r, op)?;
                compile_pattern(left, pattern_op, matchers, op)
            }
            Operator::Relational(rel) if rel.is_equality() && matches!(r, Expr::Regex(_)) => {
                let pattern_op = match rel {
                    RelationalOperator::Equals => PatternOperator::Matches,
                    _ => PatternOperator::NotMatches,
                };
                let left = self.compile(l)?;
                let matchers = self.matchers(r, op)?;
                compile_pattern(left, pattern_op, matchers, op)
            }
            Operator::Relational(rel) => {
                let left = self.compile(l)?;
                let right = self.compile(r)?;
                compile_relational(left, rel, right)
            }
            Operator::Multi(multi) => {
                let left = self.compile(l)?;
                let right = self.compile(r)?;
                compile_multi(left, multi, right)
            }
        }
    }

    /// Patterns must be literals: a string is a glob pattern, `r"..."` a
    /// regular expression. Arrays and macros of patterns match if any does.
    fn matchers(&self, expr: &Expr, op: Operator) -> Result<Vec<Matcher>, EvalError> {
        match expr {
            Expr::String(pattern) => Ok(vec![Matcher::glob(pattern)?]),
            Expr::Regex(pattern) => Ok(vec![Matcher::regex(pattern)?]),
            Expr::Array(items) if !items.is_empty() => {
                let mut matchers = Vec::with_capacity(items.len());
                for item in items {
                    matchers.extend(self.matchers(item, op)?);
                }
                Ok(matchers)
            }
            Expr::Array(_) => Err(EvalError::EmptyArray),
            Expr::Identifier(name) => match self.env.macros.get(name) {
                Some(r#macro) if !matches!(r#macro.expr(), Expr::Identifier(_)) => {
                    self.matchers(r#macro.expr(), op)
                }
                _ => Err(EvalError::PatternExpected(op.to_string())),
            },
            _ => Err(EvalError::PatternExpected(op.to_string())),
        }
    }
}

fn compile_pattern<E: Event>(
    left: Evaluator<E>,
    pattern_op: PatternOperator,
    matchers: Vec<Matcher>,
    op: Operator,
) -> Result<Evaluator<E>, EvalError> {
    match left {
        Evaluator::String(f) => Ok(Evaluator::Bool(eval_fn(move |ctx| {
            let value = f(ctx);
            pattern_op.apply(matchers.iter().any(|m| m.is_match(&value)))
        }))),
        Evaluator::StringArray(f) => Ok(Evaluator::Bool(eval_fn(move |ctx| {
            let matched = f(ctx)
                .iter()
                .any(|value| matchers.iter().any(|m| m.is_match(value)));
            pattern_op.apply(matched)
        }))),
        other => Err(EvalError::operator_not_allowed(
            op,
            other.value_type(),
            ValueType::String,
        )),
    }
}

/// Integers support every relational operator, the other types only
/// equality. An array compared to a scalar holds if any element does.
fn compile_relational<E: Event>(
    left: Evaluator<E>,
    rel: RelationalOperator,
    right: Evaluator<E>,
) -> Result<Evaluator<E>, EvalError> {
    let eq = rel.is_equality();
    let f = match (left, right) {
        (Evaluator::Int(l), Evaluator::Int(r)) => eval_fn(move |ctx| rel.apply(l(ctx), r(ctx))),
        (Evaluator::IntArray(l), Evaluator::Int(r)) => {
            eval_fn(move |ctx| rel.apply_any(&l(ctx), &r(ctx)))
        }
        (Evaluator::String(l), Evaluator::String(r)) if eq => {
            eval_fn(move |ctx| rel.apply(l(ctx), r(ctx)))
        }
        (Evaluator::Bool(l), Evaluator::Bool(r)) if eq => {
            eval_fn(move |ctx| rel.apply(l(ctx), r(ctx)))
        }
        (Evaluator::StringArray(l), Evaluator::String(r)) if eq => {
            eval_fn(move |ctx| rel.apply_any(&l(ctx), &r(ctx)))
        }
        (Evaluator::Int(l), Evaluator::IntArray(r)) if eq => {
            eval_fn(move |ctx| rel.apply_any(&r(ctx), &l(ctx)))
        }
        (Evaluator::String(l), Evaluator::StringArray(r)) if eq => {
            eval_fn(move |ctx| rel.apply_any(&r(ctx), &l(ctx)))
        }
        (Evaluator::IntArray(l), Evaluator::IntArray(r)) if eq => {
            eval_fn(move |ctx| rel.apply(l(ctx), r(ctx)))
        }
        (Evaluator::StringArray(l), Evaluator::StringArray(r)) if eq => {
            eval_fn(move |ctx| rel.apply(l(ctx), r(ctx)))
        }
        (l, r) => {
            return Err(EvalError::operator_not_allowed(
                rel,
                l.value_type(),
                r.value_type(),
            ))
        }
    };
    Ok(Evaluator::Bool(f))
}

fn compile_multi<E: Event>(
    left: Evaluator<E>,
    multi: MultiOperator,
    right: Evaluator<E>,
) -> Result<Evaluator<E>, EvalError> {
    let f = match (left, right) {
        (Evaluator::Int(l), Evaluator::IntArray(r)) => {
            eval_fn(move |ctx| multi.apply(&r(ctx), &l(ctx)))
        }
        (Evaluator::String(l), Evaluator::StringArray(r)) => {
            eval_fn(move |ctx| multi.apply(&r(ctx), &l(ctx)))
        }
        (l, r) => {
            return Err(EvalError::operator_not_allowed(
                multi,
                l.value_type(),
                r.value_type(),
            ))
        }
    };
    Ok(Evaluator::Bool(f))
}

#[cfg(test)]
mod tests {
    use crate::{parse_expression, GlobalVariable, Macro};

    use super::*;

    struct TestEvent {
        kind: &'static str,
        name: String,
        filename: String,
        mode: i64,
        argv: Vec<String>,
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &str {
            self.kind
        }

        fn model() -> Model<Self> {
            Model::<Self>::builder()
                .add_field("process.name", "", |e| e.name.clone())
                .add_field("process.argv", "", |e| e.argv.clone())
                .add_field("open.filename", "open", |e| e.filename.clone())
                .add_field("open.mode", "open", |e| e.mode)
                .add_field("exec.filename", "exec", |e| e.filename.clone())
                .build()
        }
    }

    fn open(filename: &str, mode: i64) -> TestEvent {
        TestEvent {
            kind: "open",
            name: "bash".to_string(),
            filename: filename.to_string(),
            mode,
            argv: vec!["-c".to_string(), "ls".to_string()],
        }
    }

    struct Fixture {
        model: Model<TestEvent>,
        constants: HashMap<String, Value>,
        macros: MacroStore,
        variables: VariableMap<TestEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut constants = HashMap::new();
            constants.insert("O_CREAT".to_string(), Value::Int(64));
            Self {
                model: TestEvent::model(),
                constants,
                macros: MacroStore::new(),
                variables: VariableMap::new(),
            }
        }

        fn env(&self) -> CompileEnv<'_, TestEvent> {
            CompileEnv::new(&self.model, &self.constants, &self.macros, &self.variables)
        }

        fn predicate(&self, expression: &str) -> Result<Predicate<TestEvent>, EvalError> {
            let expr = parse_expression(expression)?;
            compile_predicate(&expr, &self.env())
        }

        fn matches(&self, expression: &str, event: &TestEvent) -> bool {
            self.predicate(expression)
                .unwrap()
                .is_match(&Context::new(event))
        }
    }

    #[test]
    fn string_equality() {
        let fixture = Fixture::new();
        assert!(fixture.matches(r#"open.filename == "/tmp/test""#, &open("/tmp/test", 0)));
        assert!(!fixture.matches(r#"open.filename == "/tmp/test""#, &open("/tmp/other", 0)));
        assert!(fixture.matches(r#"open.filename != "/tmp/test""#, &open("/tmp/other", 0)));
    }

    #[test]
    fn logical_operators() {
        let fixture = Fixture::new();
        let event = open("/tmp/test", 3);
        assert!(fixture.matches(r#"open.mode > 2 && process.name == "bash""#, &event));
        assert!(fixture.matches(r#"open.mode > 5 || process.name == "bash""#, &event));
        assert!(fixture.matches(r#"not (open.mode > 5)"#, &event));
    }

    #[test]
    fn bitwise_with_constant() {
        let fixture = Fixture::new();
        assert!(fixture.matches(r#"open.mode & O_CREAT > 0"#, &open("/tmp/test", 65)));
        assert!(!fixture.matches(r#"open.mode & O_CREAT > 0"#, &open("/tmp/test", 1)));
    }

    #[test]
    fn glob_and_regex() {
        let fixture = Fixture::new();
        let event = open("/tmp/test", 0);
        assert!(fixture.matches(r#"open.filename =~ "/tmp/*""#, &event));
        assert!(fixture.matches(r#"open.filename !~ "/etc/*""#, &event));
        assert!(fixture.matches(r#"open.filename =~ r"^/tmp/t.st$""#, &event));
        assert!(fixture.matches(r#"open.filename == r"te""#, &event));
        assert!(fixture.matches(r#"process.argv =~ ["-x", "l*"]"#, &event));
    }

    #[test]
    fn pattern_needs_literal() {
        let fixture = Fixture::new();
        let err = fixture
            .predicate(r#"open.filename =~ process.name"#)
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::PatternExpected(_)));
    }

    #[test]
    fn in_array_and_macro() {
        let mut fixture = Fixture::new();
        let r#macro = Macro::from_expression("macro1", "[1, 2]", &fixture.env()).unwrap();
        fixture.macros.add(r#macro);

        assert!(fixture.matches(r#"open.mode in macro1"#, &open("/tmp/test", 1)));
        assert!(fixture.matches(r#"open.mode in macro1"#, &open("/tmp/test", 2)));
        assert!(!fixture.matches(r#"open.mode in macro1"#, &open("/tmp/test", 3)));
        assert!(fixture.matches(r#"open.mode not in macro1"#, &open("/tmp/test", 3)));
    }

    #[test]
    fn array_field_equality() {
        let fixture = Fixture::new();
        let event = open("/tmp/test", 0);
        assert!(fixture.matches(r#"process.argv == "ls""#, &event));
        assert!(fixture.matches(r#"process.argv != "rm""#, &event));
        assert!(!fixture.matches(r#"process.argv != "ls""#, &event));
    }

    #[test]
    fn macro_fields_are_tracked() {
        let mut fixture = Fixture::new();
        let r#macro = Macro::from_expression(
            "is_tmp",
            r#"open.filename =~ "/tmp/*""#,
            &fixture.env(),
        )
        .unwrap();
        fixture.macros.add(r#macro);

        let predicate = fixture.predicate(r#"is_tmp && process.name == "bash""#).unwrap();
        assert_eq!(predicate.fields(), ["open.filename", "process.name"]);
        assert_eq!(predicate.event_types(), ["open"]);
    }

    #[test]
    fn multiple_event_types_collected() {
        let fixture = Fixture::new();
        let predicate = fixture
            .predicate(r#"open.filename == "a" && exec.filename == "b""#)
            .unwrap();
        assert_eq!(predicate.event_types(), ["exec", "open"]);
    }

    #[test]
    fn type_errors() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.predicate(r#"open.filename == 3"#).err().unwrap(),
            EvalError::OperatorNotAllowed { .. }
        ));
        assert!(matches!(
            fixture.predicate(r#"open.filename > "a""#).err().unwrap(),
            EvalError::OperatorNotAllowed { .. }
        ));
        assert!(matches!(
            fixture.predicate(r#"open.mode"#).err().unwrap(),
            EvalError::TypeMismatch {
                expected: ValueType::Bool,
                got: ValueType::Int
            }
        ));
        assert!(matches!(
            fixture.predicate(r#"open.mode in []"#).err().unwrap(),
            EvalError::EmptyArray
        ));
        assert!(matches!(
            fixture.predicate(r#"open.mode in [1, "a"]"#).err().unwrap(),
            EvalError::HeterogeneousArray
        ));
        assert!(matches!(
            fixture.predicate(r#"unknown.field == 1"#).err().unwrap(),
            EvalError::UnknownIdentifier(_)
        ));
        assert!(matches!(
            fixture.predicate(r#"${missing} == 1"#).err().unwrap(),
            EvalError::UnknownVariable(_)
        ));
    }

    #[test]
    fn variables_and_interpolation() {
        let mut fixture = Fixture::new();
        let var1: Arc<dyn Variable<TestEvent>> = Arc::new(GlobalVariable::new(ValueType::Bool));
        let var2: Arc<dyn Variable<TestEvent>> =
            Arc::new(GlobalVariable::with_value(Value::from("value")));
        fixture.variables.insert("var1".to_string(), Arc::clone(&var1));
        fixture.variables.insert("var2".to_string(), var2);

        let event = open("/tmp/value", 0);
        assert!(!fixture.matches(r#"${var1} == true"#, &event));
        var1.set(&Context::new(&event), Value::Bool(true)).unwrap();
        assert!(fixture.matches(r#"${var1} == true"#, &event));
        assert!(fixture.matches(r#"open.filename == "/tmp/${var2}""#, &event));
        assert!(fixture.matches(r#""${var2}" == "value""#, &event));
    }
}
