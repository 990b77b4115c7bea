//! Compiled rules and the evaluation of events against them.
//!
//! Every load builds a new immutable [RuleSetState] from scratch: variables
//! are declared from the rule actions, macros and rules are compiled, then
//! rules are grouped by event type. The new state replaces the active one
//! in a single pointer swap, evaluations in flight keep the state they
//! started with.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use secl_eval::{
    compile_predicate, parse_expression, CompileEnv, Context, EvalOpts, Event, GlobalVariable,
    Macro, MacroStore, Model, Predicate, Value, Variable, VariableMap, VariableProvider,
    VariableProviderFactory, WILDCARD_EVENT_TYPE,
};

use crate::{
    action::{ActionError, ResolvedSet, SetAction, SetSource},
    error::{DefinitionError, DefinitionErrorKind, LoadError, MultiError},
    loader::{LoadedPolicies, PolicyLoader, PolicyLoaderOpts},
    policy::PolicyInfo,
    MacroDefinition, RuleDefinition,
};

/// Options of a [RuleSet].
pub struct Opts<E> {
    event_type_enabled: HashMap<String, bool>,
    state_scopes: HashMap<String, VariableProviderFactory<E>>,
}

impl<E> Default for Opts<E> {
    fn default() -> Self {
        Self {
            event_type_enabled: HashMap::from([(WILDCARD_EVENT_TYPE.to_string(), true)]),
            state_scopes: HashMap::new(),
        }
    }
}

impl<E> Opts<E> {
    /// Event types rules can be loaded for, `*` stands for every event type.
    pub fn with_event_type_enabled(mut self, enabled: HashMap<String, bool>) -> Self {
        self.event_type_enabled = enabled;
        self
    }

    /// Providers of scoped variables, by scope name.
    pub fn with_state_scopes(
        mut self,
        scopes: HashMap<String, VariableProviderFactory<E>>,
    ) -> Self {
        self.state_scopes = scopes;
        self
    }

    pub fn with_state_scope(mut self, scope: &str, factory: VariableProviderFactory<E>) -> Self {
        self.state_scopes.insert(scope.to_string(), factory);
        self
    }

    pub fn is_event_type_enabled(&self, event_type: &str) -> bool {
        self.event_type_enabled
            .get(event_type)
            .or_else(|| self.event_type_enabled.get(WILDCARD_EVENT_TYPE))
            .copied()
            .unwrap_or(false)
    }
}

/// A compiled rule.
pub struct Rule<E> {
    definition: RuleDefinition,
    event_type: String,
    predicate: Predicate<E>,
    actions: Vec<SetAction<E>>,
}

impl<E: Event> Rule<E> {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    /// Policy the rule was first defined in.
    pub fn policy(&self) -> &str {
        &self.definition.policy
    }

    /// Event type of the rule, `*` when it applies to every event.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Fields read by the rule expression.
    pub fn fields(&self) -> &[String] {
        self.predicate.fields()
    }

    pub fn actions(&self) -> &[SetAction<E>] {
        &self.actions
    }

    /// Evaluate the expression alone, without running actions.
    pub fn is_match(&self, event: &E) -> bool {
        self.predicate.is_match(&Context::new(event))
    }
}

/// Notified of every rule match.
pub trait RuleSetListener<E>: Send + Sync {
    fn rule_match(&self, rule: &Rule<E>, event: &E);
}

struct RuleSetState<E> {
    rules: Vec<Arc<Rule<E>>>,
    rule_index: HashMap<String, usize>,
    buckets: HashMap<String, Vec<usize>>,
    wildcard: Vec<usize>,
    macros: MacroStore,
    globals: HashMap<String, Arc<GlobalVariable>>,
    variables: VariableMap<E>,
    policies: Vec<PolicyInfo>,
}

impl<E> Default for RuleSetState<E> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            rule_index: HashMap::new(),
            buckets: HashMap::new(),
            wildcard: Vec::new(),
            macros: MacroStore::new(),
            globals: HashMap::new(),
            variables: VariableMap::new(),
            policies: Vec::new(),
        }
    }
}

/// The set of rules evaluated against events.
pub struct RuleSet<E: Event> {
    model: Arc<Model<E>>,
    eval_opts: EvalOpts,
    opts: Opts<E>,
    providers: HashMap<String, Box<dyn VariableProvider<E>>>,
    state: RwLock<Arc<RuleSetState<E>>>,
    reload_lock: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn RuleSetListener<E>>>>,
}

impl<E: Event> RuleSet<E> {
    pub fn new(opts: Opts<E>, eval_opts: EvalOpts) -> Self {
        let providers = opts
            .state_scopes
            .iter()
            .map(|(scope, factory)| (scope.clone(), factory()))
            .collect();

        Self {
            model: Arc::new(E::model()),
            eval_opts,
            opts,
            providers,
            state: RwLock::new(Arc::default()),
            reload_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn model(&self) -> &Model<E> {
        &self.model
    }

    fn snapshot(&self) -> Arc<RuleSetState<E>> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Forget the scoped variables of the instances `event` belongs to, in
    /// every scope.
    pub fn release_scopes(&self, event: &E) {
        for provider in self.providers.values() {
            provider.release_instance(event);
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn RuleSetListener<E>>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Load policies and replace the active rules.
    ///
    /// When a provider fails nothing changes. Otherwise the new rules are
    /// active on return, even if some definitions were rejected: those are
    /// returned as [LoadError::Definitions].
    pub fn load_policies(
        &self,
        loader: &PolicyLoader,
        opts: &PolicyLoaderOpts,
    ) -> Result<(), LoadError> {
        let _reload = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let loaded = loader.load_policies(opts)?;
        let previous = self.snapshot();
        let (state, errors) = self.build_state(loaded, &previous);

        log::debug!(
            "{} rules and {} macros loaded, {} definition errors",
            state.rules.len(),
            state.macros.len(),
            errors.len()
        );

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoadError::Definitions(errors))
        }
    }

    fn build_state(
        &self,
        loaded: LoadedPolicies,
        previous: &RuleSetState<E>,
    ) -> (RuleSetState<E>, MultiError) {
        let LoadedPolicies {
            policies,
            macros: macro_definitions,
            rules: rule_definitions,
            mut errors,
        } = loaded;

        let mut state = RuleSetState {
            policies,
            ..Default::default()
        };

        let mut rule_sets = HashMap::new();
        let mut excluded = HashSet::new();
        for definition in rule_definitions.iter().filter(|rule| !rule.disabled) {
            match self.declare_variables(definition, &mut state, previous) {
                Ok(sets) => {
                    rule_sets.insert(definition.id.clone(), sets);
                }
                Err(kind) => {
                    errors.push(DefinitionError::rule(&definition.id, &definition.policy, kind));
                    excluded.insert(definition.id.clone());
                }
            }
        }

        for definition in &macro_definitions {
            match self.compile_macro(definition, &state) {
                Ok(r#macro) => state.macros.add(r#macro),
                Err(kind) => {
                    errors.push(DefinitionError::r#macro(&definition.id, &definition.policy, kind))
                }
            }
        }

        for definition in rule_definitions {
            if excluded.contains(&definition.id) {
                continue;
            }
            if definition.disabled {
                log::debug!("rule {} is disabled", definition.id);
                continue;
            }

            let sets = rule_sets.remove(&definition.id).unwrap_or_default();
            match self.compile_rule(&definition, sets, &state) {
                Ok(Some(rule)) => {
                    state.rule_index.insert(rule.id().to_string(), state.rules.len());
                    state.rules.push(Arc::new(rule));
                }
                Ok(None) => {}
                Err(kind) => {
                    errors.push(DefinitionError::rule(&definition.id, &definition.policy, kind))
                }
            }
        }

        for (index, rule) in state.rules.iter().enumerate() {
            if rule.event_type == WILDCARD_EVENT_TYPE {
                state.wildcard.push(index);
            }
        }
        for event_type in self.model.event_types() {
            let bucket = state
                .rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| {
                    rule.event_type == event_type || rule.event_type == WILDCARD_EVENT_TYPE
                })
                .map(|(index, _)| index)
                .collect();
            state.buckets.insert(event_type.to_string(), bucket);
        }

        (state, errors)
    }

    /// Declare the variables written by the actions of a rule.
    ///
    /// Every action is checked before any variable is declared, a rule with
    /// a single invalid action declares nothing.
    fn declare_variables(
        &self,
        definition: &RuleDefinition,
        state: &mut RuleSetState<E>,
        previous: &RuleSetState<E>,
    ) -> Result<Vec<ResolvedSet>, DefinitionErrorKind> {
        let sets = definition
            .actions
            .iter()
            .filter_map(|action| action.set.as_ref())
            .map(|set| set.resolve(&self.model))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pending: Vec<&ResolvedSet> = Vec::new();
        for set in &sets {
            let key = set.key();

            if self.model.field(&key).is_some() || self.eval_opts.constants().contains_key(&key) {
                return Err(DefinitionErrorKind::VariableNameConflict(key));
            }
            if let Some(scope) = &set.scope {
                if !self.providers.contains_key(scope) {
                    return Err(ActionError::UnknownScope(scope.clone()).into());
                }
            }

            let existing = state
                .variables
                .get(&key)
                .map(|variable| variable.value_type())
                .or_else(|| {
                    pending
                        .iter()
                        .find(|declared| declared.key() == key)
                        .map(|declared| declared.value_type)
                });

            match existing {
                Some(existing) if existing != set.value_type => {
                    return Err(DefinitionErrorKind::VariableTypeConflict {
                        name: key,
                        existing,
                        new: set.value_type,
                    });
                }
                Some(_) => {}
                None => pending.push(set),
            }
        }

        for set in pending {
            let key = set.key();
            let variable: Arc<dyn Variable<E>> = match &set.scope {
                Some(scope) => {
                    let provider = self
                        .providers
                        .get(scope)
                        .ok_or_else(|| ActionError::UnknownScope(scope.clone()))?;
                    provider.get_variable(&set.name, set.value_type)?
                }
                None => {
                    let global = previous
                        .globals
                        .get(&key)
                        .filter(|global| {
                            Variable::<E>::value_type(global.as_ref()) == set.value_type
                        })
                        .cloned()
                        .unwrap_or_else(|| Arc::new(GlobalVariable::new(set.value_type)));
                    state.globals.insert(key.clone(), Arc::clone(&global));
                    global
                }
            };
            state.variables.insert(key, variable);
        }

        Ok(sets)
    }

    fn compile_macro(
        &self,
        definition: &MacroDefinition,
        state: &RuleSetState<E>,
    ) -> Result<Macro, DefinitionErrorKind> {
        let env = CompileEnv::new(
            &self.model,
            self.eval_opts.constants(),
            &state.macros,
            &state.variables,
        );

        let r#macro = match (&definition.expression, definition.values.is_empty()) {
            (Some(expression), true) => Macro::from_expression(&definition.id, expression, &env)?,
            (None, false) => Macro::from_values(&definition.id, &definition.values)?,
            _ => return Err(DefinitionErrorKind::InvalidMacro),
        };

        Ok(r#macro)
    }

    /// Compile a rule, `None` when its event type isn't enabled.
    fn compile_rule(
        &self,
        definition: &RuleDefinition,
        sets: Vec<ResolvedSet>,
        state: &RuleSetState<E>,
    ) -> Result<Option<Rule<E>>, DefinitionErrorKind> {
        if definition.expression.trim().is_empty() {
            return Err(DefinitionErrorKind::NoExpression);
        }

        let expr = parse_expression(&definition.expression)?;
        let env = CompileEnv::new(
            &self.model,
            self.eval_opts.constants(),
            &state.macros,
            &state.variables,
        );
        let predicate = compile_predicate(&expr, &env)?;

        let event_type = match predicate.event_types() {
            [] => WILDCARD_EVENT_TYPE.to_string(),
            [event_type] => event_type.clone(),
            event_types => {
                return Err(DefinitionErrorKind::MultipleEventTypes(event_types.to_vec()));
            }
        };

        if !self.opts.is_event_type_enabled(&event_type) {
            log::info!(
                "rule {} skipped: event type {event_type} not enabled",
                definition.id
            );
            return Ok(None);
        }

        let mut actions = Vec::with_capacity(sets.len());
        for set in sets {
            if let SetSource::Field(field) = &set.source {
                let field_event_type = self
                    .model
                    .field(field)
                    .map(|field| field.event_type())
                    .unwrap_or_default();
                if !field_event_type.is_empty() && field_event_type != event_type {
                    return Err(DefinitionErrorKind::FieldEventType {
                        field: field.clone(),
                        event_type,
                    });
                }
            }

            let variable = state.variables.get(&set.key()).cloned().ok_or_else(|| {
                DefinitionErrorKind::Eval(secl_eval::EvalError::UnknownVariable(set.key()))
            })?;
            actions.push(SetAction::new(set, variable));
        }

        Ok(Some(Rule {
            definition: definition.clone(),
            event_type,
            predicate,
            actions,
        }))
    }

    /// Evaluate an event against the rules of its event type and the rules
    /// valid for every event type, in load order.
    ///
    /// The actions of a matching rule run before the next rule is evaluated.
    /// Returns true if at least one rule matched.
    pub fn evaluate(&self, event: &E) -> bool {
        let state = self.snapshot();
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let ctx = Context::new(event);
        let indexes = state
            .buckets
            .get(event.event_type())
            .unwrap_or(&state.wildcard);

        let mut matched = false;
        for &index in indexes {
            let rule = &state.rules[index];
            if !rule.predicate.is_match(&ctx) {
                continue;
            }

            log::trace!("rule {} matched {} event", rule.id(), event.event_type());
            matched = true;

            for action in &rule.actions {
                if let Err(err) = action.execute(&ctx, &self.model) {
                    log::warn!(
                        "rule {}: failed to set variable {}: {err}",
                        rule.id(),
                        action.key()
                    );
                }
            }

            for listener in &listeners {
                listener.rule_match(rule, event);
            }
        }

        matched
    }

    /// Active rules, in load order.
    pub fn rules(&self) -> Vec<Arc<Rule<E>>> {
        self.snapshot().rules.clone()
    }

    pub fn rule(&self, id: &str) -> Option<Arc<Rule<E>>> {
        let state = self.snapshot();
        state
            .rule_index
            .get(id)
            .map(|&index| Arc::clone(&state.rules[index]))
    }

    pub fn has_rule(&self, id: &str) -> bool {
        self.snapshot().rule_index.contains_key(id)
    }

    /// Sorted IDs of the active macros.
    pub fn macro_ids(&self) -> Vec<String> {
        self.snapshot()
            .macros
            .ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn has_macro(&self, id: &str) -> bool {
        self.snapshot().macros.contains(id)
    }

    /// Outcome of the last load, per policy.
    pub fn policies(&self) -> Vec<PolicyInfo> {
        self.snapshot().policies.clone()
    }

    /// Current value of a global variable.
    pub fn global_value(&self, name: &str) -> Option<Value> {
        self.snapshot().globals.get(name).and_then(|global| global.value())
    }
}
