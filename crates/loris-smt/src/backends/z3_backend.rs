use std::collections::HashMap;

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, QueryLimits, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    bool_vars: HashMap<String, z3::ast::Bool>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
        }
    }

    /// Apply per-call budgets. Unset limits are restored to the solver
    /// defaults so a tight budget on one call does not leak into the next.
    fn apply_limits(&mut self, limits: &QueryLimits) {
        let mut params = z3::Params::new();
        let timeout_ms = limits.timeout_ms.unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout_ms);
        params.set_u32("solver2_timeout", timeout_ms);
        params.set_u32("max_memory", limits.memory_mb.unwrap_or(u32::MAX));
        self.solver.set_params(&params);
    }

    /// Lower a pseudo-boolean atom to a linear sum over 0/1 ITEs.
    fn pb_sum(&self, terms: &[SmtTerm]) -> Result<z3::ast::Int, Z3Error> {
        let mut sum = z3::ast::Int::from_i64(0);
        for term in terms {
            let b = self.translate_term(term)?.into_bool()?;
            let indicator = b.ite(&z3::ast::Int::from_i64(1), &z3::ast::Int::from_i64(0));
            sum = &sum + &indicator;
        }
        Ok(sum)
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Int(&l - &r))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Int(&l * &r))
            }
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(li.eq(&ri))),
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
                }
            }
            SmtTerm::Lt(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.gt(&r)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_int()?;
                let r = self.translate_term(rhs)?.into_int()?;
                Ok(Z3Term::Bool(l.ge(&r)))
            }
            SmtTerm::And(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools: Result<Vec<_>, _> = terms
                    .iter()
                    .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
                    .collect();
                let bools = bools?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Int(ti), Z3Term::Int(ei)) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                }
            }
            SmtTerm::PbLe(terms, k) => {
                let sum = self.pb_sum(terms)?;
                Ok(Z3Term::Bool(sum.le(&z3::ast::Int::from_i64(*k))))
            }
            SmtTerm::PbGe(terms, k) => {
                let sum = self.pb_sum(terms)?;
                Ok(Z3Term::Bool(sum.ge(&z3::ast::Int::from_i64(*k))))
            }
            SmtTerm::PbEq(terms, k) => {
                let sum = self.pb_sum(terms)?;
                Ok(Z3Term::Bool(sum.eq(&z3::ast::Int::from_i64(*k))))
            }
        }
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_int(self) -> Result<z3::ast::Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(Z3Error::Internal("Expected Int, got Bool".into())),
        }
    }

    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::Internal("Expected Bool, got Int".into())),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                let v = z3::ast::Int::new_const(name);
                self.int_vars.insert(name.to_string(), v);
            }
            SmtSort::Bool => {
                let v = z3::ast::Bool::new_const(name);
                self.bool_vars.insert(name.to_string(), v);
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn check(&mut self, limits: &QueryLimits) -> Result<SatResult, Z3Error> {
        self.apply_limits(limits);
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown("Z3 returned unknown".into())),
        }
    }

    fn check_assuming(
        &mut self,
        assumptions: &[SmtTerm],
        limits: &QueryLimits,
    ) -> Result<SatResult, Z3Error> {
        self.apply_limits(limits);
        let mut asts = Vec::with_capacity(assumptions.len());
        for term in assumptions {
            asts.push(self.translate_term(term)?.into_bool()?);
        }
        match self.solver.check_assumptions(&asts) {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown("Z3 returned unknown".into())),
        }
    }

    fn model(&mut self, vars: &[(&str, &SmtSort)]) -> Result<Option<Model>, Z3Error> {
        let Some(z3_model) = self.solver.get_model() else {
            return Ok(None);
        };
        let mut values = HashMap::new();
        for &(name, sort) in vars {
            match sort {
                SmtSort::Int => {
                    if let Some(v) = self.int_vars.get(name) {
                        if let Some(val) = z3_model.eval::<z3::ast::Int>(v, true) {
                            if let Some(n) = val.as_i64() {
                                values.insert(name.to_string(), ModelValue::Int(n));
                            }
                        }
                    }
                }
                SmtSort::Bool => {
                    if let Some(v) = self.bool_vars.get(name) {
                        if let Some(val) = z3_model.eval::<z3::ast::Bool>(v, true) {
                            if let Some(b) = val.as_bool() {
                                values.insert(name.to_string(), ModelValue::Bool(b));
                            }
                        }
                    }
                }
            }
        }
        Ok(Some(Model { values }))
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        self.int_vars.clear();
        self.bool_vars.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn z3_basic_sat() -> TestResult {
        let mut solver = Z3Solver::new();

        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("y", &SmtSort::Int)?;

        // x > 0 && y > 0 && x + y == 10
        let term = SmtTerm::and(vec![
            SmtTerm::var("x").gt(SmtTerm::int(0)),
            SmtTerm::var("y").gt(SmtTerm::int(0)),
            SmtTerm::var("x")
                .add(SmtTerm::var("y"))
                .eq(SmtTerm::int(10)),
        ]);
        solver.assert(&term)?;
        assert_eq!(solver.check(&QueryLimits::UNLIMITED)?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_basic_unsat() -> TestResult {
        let mut solver = Z3Solver::new();

        solver.declare_var("x", &SmtSort::Int)?;

        // x > 0 && x < 0
        let term = SmtTerm::and(vec![
            SmtTerm::var("x").gt(SmtTerm::int(0)),
            SmtTerm::var("x").lt(SmtTerm::int(0)),
        ]);
        solver.assert(&term)?;
        assert_eq!(solver.check(&QueryLimits::UNLIMITED)?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_model_extraction_after_check() -> TestResult {
        let mut solver = Z3Solver::new();

        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("done", &SmtSort::Bool)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(42)))?;
        solver.assert(&SmtTerm::var("done"))?;

        assert_eq!(solver.check(&QueryLimits::UNLIMITED)?, SatResult::Sat);
        let model = solver
            .model(&[("x", &SmtSort::Int), ("done", &SmtSort::Bool)])?
            .ok_or_else(|| std::io::Error::other("expected model after SAT check"))?;
        assert_eq!(model.get_int("x"), Some(42));
        assert_eq!(model.get_bool("done"), Some(true));
        Ok(())
    }

    #[test]
    fn z3_assumptions_do_not_stick() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").gt(SmtTerm::int(0)))?;

        // Assumption contradicts the formula; the formula itself survives.
        let blocked = solver.check_assuming(
            &[SmtTerm::var("x").lt(SmtTerm::int(0))],
            &QueryLimits::UNLIMITED,
        )?;
        assert_eq!(blocked, SatResult::Unsat);
        assert_eq!(solver.check(&QueryLimits::UNLIMITED)?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_pseudo_boolean_lowering() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("a", &SmtSort::Bool)?;
        solver.declare_var("b", &SmtSort::Bool)?;
        solver.declare_var("c", &SmtSort::Bool)?;
        let vars = vec![SmtTerm::var("a"), SmtTerm::var("b"), SmtTerm::var("c")];

        solver.assert(&SmtTerm::pb_eq(vars.clone(), 2))?;
        assert_eq!(solver.check(&QueryLimits::UNLIMITED)?, SatResult::Sat);
        let model = solver
            .model(&[
                ("a", &SmtSort::Bool),
                ("b", &SmtSort::Bool),
                ("c", &SmtSort::Bool),
            ])?
            .ok_or_else(|| std::io::Error::other("expected model for pb_eq"))?;
        let true_count = ["a", "b", "c"]
            .iter()
            .filter(|name| model.get_bool(name) == Some(true))
            .count();
        assert_eq!(true_count, 2);

        // pb_le 1 on top of pb_eq 2 is contradictory.
        let blocked =
            solver.check_assuming(&[SmtTerm::pb_le(vars, 1)], &QueryLimits::UNLIMITED)?;
        assert_eq!(blocked, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_reset_drops_declarations() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(1)))?;
        solver.reset()?;

        let err = solver.assert(&SmtTerm::var("x").eq(SmtTerm::int(2)));
        assert!(matches!(err, Err(Z3Error::UnknownVariable(_))));
        Ok(())
    }
}
