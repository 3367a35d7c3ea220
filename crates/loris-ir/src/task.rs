use indexmap::IndexMap;
use std::fmt;

/// Declared value kind of a grounded fluent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluentKind {
    Bool,
    Int,
}

/// A concrete fluent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn kind(&self) -> FluentKind {
        match self {
            Value::Bool(_) => FluentKind::Bool,
            Value::Int(_) => FluentKind::Int,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
        }
    }
}

/// A boolean or arithmetic expression over named fluents.
///
/// Conditions (preconditions, goals, effect guards) and effect value
/// expressions share this one tree shape; the encoder decides at which
/// timestep each fluent reference is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    /// Reference to a grounded fluent by name.
    Fluent(String),

    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),

    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),

    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn fluent(name: impl Into<String>) -> Self {
        Expr::Fluent(name.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Const(Value::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Const(Value::Bool(b))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Expr) -> Self {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Expr) -> Self {
        Expr::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Expr) -> Self {
        Expr::Ge(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    /// Names of all fluents referenced by this expression.
    pub fn fluents(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fluents(&mut out);
        out
    }

    fn collect_fluents<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Const(_) => {}
            Expr::Fluent(name) => out.push(name),
            Expr::Not(inner) => inner.collect_fluents(out),
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.collect_fluents(out);
                }
            }
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Lt(lhs, rhs)
            | Expr::Le(lhs, rhs)
            | Expr::Gt(lhs, rhs)
            | Expr::Ge(lhs, rhs)
            | Expr::Eq(lhs, rhs) => {
                lhs.collect_fluents(out);
                rhs.collect_fluents(out);
            }
        }
    }
}

/// How an effect updates its target fluent across one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Post-state fluent equals the value expression (pre-state operands).
    Assign,
    /// Post-state fluent equals pre-state fluent plus the value expression.
    Increase,
    /// Post-state fluent equals pre-state fluent minus the value expression.
    Decrease,
}

/// One grounded effect, optionally guarded by a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub fluent: String,
    pub kind: EffectKind,
    pub value: Expr,
    pub condition: Option<Expr>,
}

impl Effect {
    pub fn assign(fluent: impl Into<String>, value: Expr) -> Self {
        Self {
            fluent: fluent.into(),
            kind: EffectKind::Assign,
            value,
            condition: None,
        }
    }

    pub fn increase(fluent: impl Into<String>, value: Expr) -> Self {
        Self {
            fluent: fluent.into(),
            kind: EffectKind::Increase,
            value,
            condition: None,
        }
    }

    pub fn decrease(fluent: impl Into<String>, value: Expr) -> Self {
        Self {
            fluent: fluent.into(),
            kind: EffectKind::Decrease,
            value,
            condition: None,
        }
    }

    /// Guard this effect with a condition.
    pub fn when(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    /// True when the effect sets a boolean fluent to a constant `true`.
    pub fn is_add(&self) -> bool {
        self.kind == EffectKind::Assign && self.value == Expr::Const(Value::Bool(true))
    }

    /// True when the effect sets a boolean fluent to a constant `false`.
    pub fn is_delete(&self) -> bool {
        self.kind == EffectKind::Assign && self.value == Expr::Const(Value::Bool(false))
    }
}

/// A fully instantiated action. Immutable after grounding.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedAction {
    pub name: String,
    pub cost: i64,
    pub preconditions: Vec<Expr>,
    pub effects: Vec<Effect>,
}

impl GroundedAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cost: 1,
            preconditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_cost(mut self, cost: i64) -> Self {
        self.cost = cost;
        self
    }

    pub fn pre(mut self, condition: Expr) -> Self {
        self.preconditions.push(condition);
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// A fully instantiated fluent. Immutable after grounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedFluent {
    pub name: String,
    pub kind: FluentKind,
}

/// A flattened, parameter-free planning task.
///
/// The `name_maps` chain carries the external grounder's reverse mapping:
/// each compilation stage that renamed actions contributes one map, and
/// [`GroundedTask::map_back`] applies them in reverse compilation order to
/// recover the caller's original action vocabulary.
#[derive(Debug, Clone, Default)]
pub struct GroundedTask {
    pub name: String,
    pub fluents: Vec<GroundedFluent>,
    pub initial_values: IndexMap<String, Value>,
    pub actions: Vec<GroundedAction>,
    pub goals: Vec<Expr>,
    pub name_maps: Vec<IndexMap<String, String>>,
}

impl GroundedTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn fluent(mut self, name: impl Into<String>, initial: Value) -> Self {
        let name = name.into();
        self.fluents.push(GroundedFluent {
            name: name.clone(),
            kind: initial.kind(),
        });
        self.initial_values.insert(name, initial);
        self
    }

    pub fn action(mut self, action: GroundedAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn goal(mut self, condition: Expr) -> Self {
        self.goals.push(condition);
        self
    }

    pub fn fluent_kind(&self, name: &str) -> Option<FluentKind> {
        self.fluents
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.kind)
    }

    pub fn find_action(&self, name: &str) -> Option<&GroundedAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Translate a grounded action name back into the original vocabulary by
    /// applying the compilation name maps in reverse order.
    pub fn map_back(&self, grounded_name: &str) -> String {
        let mut name = grounded_name.to_string();
        for map in self.name_maps.iter().rev() {
            if let Some(original) = map.get(&name) {
                name = original.clone();
            }
        }
        name
    }

    /// Inverse of [`GroundedTask::map_back`]: translate an action name from
    /// the caller's original vocabulary into the grounded one by walking the
    /// compilation name maps in order and inverting each.
    pub fn map_forward(&self, original_name: &str) -> String {
        let mut name = original_name.to_string();
        for map in &self.name_maps {
            if let Some((renamed, _)) = map.iter().find(|(_, original)| original.as_str() == name)
            {
                name = renamed.clone();
            }
        }
        name
    }
}
