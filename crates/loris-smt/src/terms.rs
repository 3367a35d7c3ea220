use std::collections::HashMap;

/// Abstract SMT term representation, solver-agnostic.
///
/// The pseudo-boolean atoms (`PbLe`, `PbGe`, `PbEq`) constrain how many of
/// the listed boolean terms are true; backends lower them to linear sums.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Comparison (Eq also covers boolean equivalence)
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),

    // Pseudo-boolean cardinality atoms over boolean terms
    PbLe(Vec<SmtTerm>, i64),
    PbGe(Vec<SmtTerm>, i64),
    PbEq(Vec<SmtTerm>, i64),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(self, then_term: SmtTerm, else_term: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(self), Box::new(then_term), Box::new(else_term))
    }

    /// "At most `k` of these boolean terms are true."
    pub fn pb_le(terms: Vec<SmtTerm>, k: i64) -> Self {
        SmtTerm::PbLe(terms, k)
    }

    /// "At least `k` of these boolean terms are true."
    pub fn pb_ge(terms: Vec<SmtTerm>, k: i64) -> Self {
        SmtTerm::PbGe(terms, k)
    }

    /// "Exactly `k` of these boolean terms are true."
    pub fn pb_eq(terms: Vec<SmtTerm>, k: i64) -> Self {
        SmtTerm::PbEq(terms, k)
    }

    /// Fold a list of integer terms into a sum (`0` when empty).
    pub fn sum(terms: Vec<SmtTerm>) -> Self {
        let mut iter = terms.into_iter();
        match iter.next() {
            None => SmtTerm::IntLit(0),
            Some(first) => iter.fold(first, |acc, t| acc.add(t)),
        }
    }

    /// Rename variables according to `renames`, leaving unmapped variables
    /// untouched. This is the primitive behind step-template
    /// re-instantiation: the per-step formula template is built once and
    /// copied to step `t` by pure substitution.
    pub fn substitute(&self, renames: &HashMap<String, String>) -> SmtTerm {
        match self {
            SmtTerm::Var(name) => match renames.get(name) {
                Some(target) => SmtTerm::Var(target.clone()),
                None => SmtTerm::Var(name.clone()),
            },
            SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => self.clone(),
            SmtTerm::Add(lhs, rhs) => SmtTerm::Add(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Sub(lhs, rhs) => SmtTerm::Sub(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Mul(lhs, rhs) => SmtTerm::Mul(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Eq(lhs, rhs) => SmtTerm::Eq(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Lt(lhs, rhs) => SmtTerm::Lt(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Le(lhs, rhs) => SmtTerm::Le(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Gt(lhs, rhs) => SmtTerm::Gt(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Ge(lhs, rhs) => SmtTerm::Ge(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::And(terms) => {
                SmtTerm::And(terms.iter().map(|t| t.substitute(renames)).collect())
            }
            SmtTerm::Or(terms) => {
                SmtTerm::Or(terms.iter().map(|t| t.substitute(renames)).collect())
            }
            SmtTerm::Not(inner) => SmtTerm::Not(Box::new(inner.substitute(renames))),
            SmtTerm::Implies(lhs, rhs) => SmtTerm::Implies(
                Box::new(lhs.substitute(renames)),
                Box::new(rhs.substitute(renames)),
            ),
            SmtTerm::Ite(cond, then_term, else_term) => SmtTerm::Ite(
                Box::new(cond.substitute(renames)),
                Box::new(then_term.substitute(renames)),
                Box::new(else_term.substitute(renames)),
            ),
            SmtTerm::PbLe(terms, k) => {
                SmtTerm::PbLe(terms.iter().map(|t| t.substitute(renames)).collect(), *k)
            }
            SmtTerm::PbGe(terms, k) => {
                SmtTerm::PbGe(terms.iter().map(|t| t.substitute(renames)).collect(), *k)
            }
            SmtTerm::PbEq(terms, k) => {
                SmtTerm::PbEq(terms.iter().map(|t| t.substitute(renames)).collect(), *k)
            }
        }
    }

    /// Names of all variables referenced by this term.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SmtTerm::Var(name) => out.push(name),
            SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => {}
            SmtTerm::Add(lhs, rhs)
            | SmtTerm::Sub(lhs, rhs)
            | SmtTerm::Mul(lhs, rhs)
            | SmtTerm::Eq(lhs, rhs)
            | SmtTerm::Lt(lhs, rhs)
            | SmtTerm::Le(lhs, rhs)
            | SmtTerm::Gt(lhs, rhs)
            | SmtTerm::Ge(lhs, rhs)
            | SmtTerm::Implies(lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            SmtTerm::And(terms)
            | SmtTerm::Or(terms)
            | SmtTerm::PbLe(terms, _)
            | SmtTerm::PbGe(terms, _)
            | SmtTerm::PbEq(terms, _) => {
                for term in terms {
                    term.collect_variables(out);
                }
            }
            SmtTerm::Not(inner) => inner.collect_variables(out),
            SmtTerm::Ite(cond, then_term, else_term) => {
                cond.collect_variables(out);
                then_term.collect_variables(out);
                else_term.collect_variables(out);
            }
        }
    }
}
