//! Translation from a higher-level term graph into Boolean and theory atoms.
//!
//! This is the top-level entry point a containing SMT context calls to assert a formula: it
//! flattens top-level conjunctions/disjunctions, discovers variable-elimination substitutions,
//! internalizes every surviving term into a literal or theory object, and dispatches the
//! resulting top-level constraints to the right assertion routine. The term table and type
//! system themselves are an external collaborator, reached only through the [`TermGraph`] trait.
//!
//! [`Translator`] itself never touches [`crate::context::Context`] directly: it only produces
//! pending clauses and pending theory obligations, which [`install_formula`] then installs.

use rustc_hash::FxHashMap;

use partial_ref::{partial, PartialRef};

use smtbool_formula::{Lit, Var};

use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP,
    IncrementalP, PushPopP, SolverStateP, TheoryP, TmpDataP, TrailP, TranslatorP, VariablesP,
    VsidsP, WatchlistsP,
};
use crate::error::SolverError;
use crate::load::load_clause;

/// Opaque identifier for a term in the external term graph.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TermId(pub u32);

/// Opaque identifier for a type in the external term graph.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TypeId(pub u32);

/// Shape of a term, as far as the translator needs to distinguish it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TermKind {
    True,
    False,
    Not(TermId),
    And,
    Or,
    Eq(TermId, TermId),
    Ite(TermId, TermId, TermId),
    /// An arithmetic or bit-vector polynomial; opaque beyond what [`TermGraph`] exposes about it.
    Polynomial,
    /// Any uninterpreted application, ordering atom, or other term with no special treatment.
    Other,
}

/// Sort of a type, as far as internalization needs to dispatch on it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SortKind {
    Bool,
    Arith,
    BitVec(u32),
    Uninterpreted,
}

/// Minimal interface the translator needs into the external term graph and type system.
///
/// The term table, type checker, and theory-specific polynomial/bit-vector representations live
/// entirely outside this crate; this trait is the full contract the translator relies on.
pub trait TermGraph {
    /// Shape of a term, used to decide how to flatten and internalize it.
    fn kind(&self, term: TermId) -> TermKind;

    /// Children of an n-ary `And`/`Or` term, in argument order.
    fn children(&self, term: TermId) -> &[TermId];

    /// Type of a term, used to pick the greatest common subtype when merging union-find classes.
    fn sort(&self, term: TermId) -> TypeId;

    /// Sort of a type, used by internalization to pick which theory object a term becomes.
    fn sort_kind(&self, ty: TypeId) -> SortKind;

    /// Whether `sub` can stand in for a term of type `sup` (subtyping used by variable
    /// elimination to decide which side of an equality to keep as representative).
    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool;

    /// Whether a term is an uninterpreted variable, i.e. a valid substitution target.
    fn is_uninterpreted_var(&self, term: TermId) -> bool;

    /// Attempt to rewrite a top-level polynomial equality `p == 0` into a substitution
    /// `x := rhs` for some variable `x` of `p`, preserving integrality. Returns `None` if no
    /// variable of `p` can be eliminated this way.
    fn poly_substitution(&self, poly: TermId) -> Option<(TermId, TermId)>;

    /// Rewrite a bit-vector polynomial into its normal form, returning a (possibly different)
    /// term to internalize in its place. Returns `None` if `poly` is already normal.
    fn bv_normalize(&self, poly: TermId) -> Option<TermId>;

    /// The shared-equality-graph node already attached to `term`, if any.
    fn eterm_of(&self, term: TermId) -> Option<u32>;

    /// Record that `term` occurs as node `eterm` in the shared equality graph.
    fn attach_eterm(&mut self, term: TermId, eterm: u32);

    /// Negate a term, reusing the existing term if it is already a negation.
    fn negate(&self, term: TermId) -> TermId;
}

/// Where a term's internalization result is recorded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum InternalCode {
    Unassigned,
    Bool(Lit),
    ArithVar(u32),
    BvVar(u32),
    /// Occurrence of the term as a node in the theory's shared equality graph.
    Eterm(u32),
}

/// Union-find over terms, used by variable-elimination phase 1 (§4.9 phase 1) to merge
/// equivalence classes and detect when a class is frozen by gaining a constant or theory
/// representative.
struct Partition {
    parent: FxHashMap<TermId, TermId>,
    frozen: FxHashMap<TermId, bool>,
}

impl Partition {
    fn new() -> Partition {
        Partition {
            parent: FxHashMap::default(),
            frozen: FxHashMap::default(),
        }
    }

    fn add(&mut self, term: TermId) {
        self.parent.entry(term).or_insert(term);
        self.frozen.entry(term).or_insert(false);
    }

    fn find(&mut self, term: TermId) -> TermId {
        let mut root = term;
        loop {
            let parent = *self.parent.get(&root).unwrap_or(&root);
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut cur = term;
        while cur != root {
            let next = self.parent[&cur];
            self.parent.insert(cur, root);
            cur = next;
        }

        root
    }

    fn is_frozen(&self, root: TermId) -> bool {
        *self.frozen.get(root).unwrap_or(&false)
    }

    fn freeze(&mut self, root: TermId) {
        self.frozen.insert(root, true);
    }

    /// Merge the classes of `x` and `y`. If exactly one side is frozen the other side's root is
    /// made to point at it; if both are unfrozen either direction works and `x`'s root wins.
    fn merge(&mut self, x: TermId, y: TermId) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }

        if self.is_frozen(ry) {
            self.parent.insert(rx, ry);
        } else {
            self.parent.insert(ry, rx);
            if self.is_frozen(rx) {
                self.freeze(rx);
            }
        }
    }
}

/// Coloring used by phase 3's cycle-breaking walk over the substitution graph.
#[derive(Copy, Clone, Eq, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Which algorithm a difference-logic fragment should be solved with, picked from a cheap
/// syntactic profile of the asserted formulas.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DifferenceLogicEngine {
    /// Incremental Floyd-Warshall: cheap per-edge updates, quadratic memory.
    FloydWarshall,
    /// Simplex-based solver: higher per-step cost, scales to many variables and dense atoms.
    Simplex,
}

/// A cheap syntactic profile of a difference-logic fragment, used to pick between an
/// incremental-Floyd-Warshall and a Simplex-based engine.
#[derive(Copy, Clone, Default, Debug)]
pub struct DlProfile {
    pub var_count: u32,
    pub atom_count: u32,
    pub eq_count: u32,
    /// Sum of the absolute value of every constant term seen, used as an overflow guard.
    pub sum_abs_const: i64,
}

/// Overflow guard on the summed constants: beyond this, Floyd-Warshall's distance accumulation
/// risks wrapping, so Simplex is picked regardless of size.
const DL_SUM_CONST_OVERFLOW: i64 = 1 << 30;
/// Beyond this many variables, Floyd-Warshall's quadratic memory use is no longer worth it.
const DL_MAX_VARS_FOR_FW: u32 = 1000;
/// At or below this many variables, Floyd-Warshall is always cheap enough regardless of density.
const DL_SMALL_ENOUGH_FOR_FW: u32 = 200;
/// Minimum atoms-per-variable density at which Floyd-Warshall's per-edge cost still pays off.
const DL_DENSITY_FOR_FW: f64 = 10.0;

/// Classify a difference-logic fragment by the engine that should solve it.
///
/// Mirrors the architecture auto-detection used by the system this incremental layer was
/// modeled on: small or constant-sparse fragments always get the simpler incremental engine,
/// huge or overflow-risking ones always get Simplex, and the middle ground is decided by atom
/// density (atoms per variable).
pub fn classify_difference_logic(profile: DlProfile) -> DifferenceLogicEngine {
    if profile.sum_abs_const >= DL_SUM_CONST_OVERFLOW {
        return DifferenceLogicEngine::Simplex;
    }
    if profile.var_count >= DL_MAX_VARS_FOR_FW {
        return DifferenceLogicEngine::Simplex;
    }
    if profile.var_count <= DL_SMALL_ENOUGH_FOR_FW || profile.eq_count == 0 {
        return DifferenceLogicEngine::FloydWarshall;
    }

    let density = f64::from(profile.atom_count) / f64::from(profile.var_count);
    if density >= DL_DENSITY_FOR_FW {
        DifferenceLogicEngine::FloydWarshall
    } else {
        DifferenceLogicEngine::Simplex
    }
}

/// Translator state: the `internal_code` table plus the working sets built up while asserting
/// one top-level formula.
#[derive(Default)]
pub struct Translator {
    codes: FxHashMap<TermId, InternalCode>,
    substitutions: FxHashMap<TermId, TermId>,

    top_eqs: Vec<(TermId, TermId)>,
    top_atoms: Vec<TermId>,
    top_formulas: Vec<TermId>,

    next_bool_var: u32,
    next_arith_var: u32,
    next_bv_var: u32,
    next_eterm: u32,

    /// Clauses produced by top-level assertion, not yet installed into a clause database.
    pending_clauses: Vec<Vec<Lit>>,
    /// Non-Boolean top-level atoms asserted with a polarity, not yet handed to a theory.
    pending_theory_atoms: Vec<(TermId, bool)>,
    /// Non-Boolean top-level equalities/disequalities, not yet handed to a theory.
    pending_theory_eqs: Vec<(TermId, TermId, bool)>,
}

impl Translator {
    /// The recorded internalization code of a term, if any.
    pub fn code(&self, term: TermId) -> InternalCode {
        *self.codes.get(&term).unwrap_or(&InternalCode::Unassigned)
    }

    fn set_code(&mut self, term: TermId, code: InternalCode) {
        self.codes.insert(term, code);
    }

    /// Number of fresh Boolean variables internalization has allocated so far; a caller must
    /// reserve at least this many variables before installing [`Self::pending_clauses`].
    pub fn bool_var_count(&self) -> usize {
        self.next_bool_var as usize
    }

    /// Take the clauses produced by the last [`Self::assert_formula`] call.
    pub fn pending_clauses(&mut self) -> Vec<Vec<Lit>> {
        std::mem::take(&mut self.pending_clauses)
    }

    /// Take the non-Boolean top-level atoms produced by the last [`Self::assert_formula`] call,
    /// for a caller to forward to its theory solver.
    pub fn pending_theory_atoms(&mut self) -> Vec<(TermId, bool)> {
        std::mem::take(&mut self.pending_theory_atoms)
    }

    /// Take the non-Boolean top-level equalities/disequalities produced by the last
    /// [`Self::assert_formula`] call, for a caller to forward to its theory solver.
    pub fn pending_theory_eqs(&mut self) -> Vec<(TermId, TermId, bool)> {
        std::mem::take(&mut self.pending_theory_eqs)
    }

    /// Assert a top-level formula: flatten, discover substitutions, internalize, and dispatch
    /// every resulting top-level constraint.
    ///
    /// Returns `Err` with a structural [`SolverError`] if flattening, or equality-abstraction,
    /// finds a direct contradiction; the caller must not proceed to `check` in that case (§7).
    pub fn assert_formula(
        &mut self,
        graph: &mut dyn TermGraph,
        formula: TermId,
    ) -> Result<(), SolverError> {
        self.top_eqs.clear();
        self.top_atoms.clear();
        self.top_formulas.clear();

        self.flatten(graph, formula, true)?;

        let top_eqs = std::mem::take(&mut self.top_eqs);
        self.discover_substitutions(graph, &top_eqs);

        for &(lhs, rhs) in &top_eqs {
            let lhs = self.resolve(lhs);
            let rhs = self.resolve(rhs);
            if self.substitutions.contains_key(&lhs) {
                continue;
            }
            self.assert_eq(graph, lhs, rhs, true)?;
        }

        let top_atoms = std::mem::take(&mut self.top_atoms);
        for atom in top_atoms {
            self.assert_top(graph, atom)?;
        }

        let top_formulas = std::mem::take(&mut self.top_formulas);
        for formula in top_formulas {
            self.assert_top(graph, formula)?;
        }

        Ok(())
    }

    /// Flatten a formula under the given polarity (`true` for an asserted conjunct, `false` for
    /// a negated one), using an explicit stack so deeply right-nested conjunctions don't recurse.
    ///
    /// Positive polarity flattens nested `And`; negative polarity flattens nested `Or` (De
    /// Morgan's law applied structurally instead of by rewriting).
    fn flatten(
        &mut self,
        graph: &mut dyn TermGraph,
        term: TermId,
        polarity: bool,
    ) -> Result<(), SolverError> {
        let mut stack = vec![(term, polarity)];

        while let Some((term, polarity)) = stack.pop() {
            match graph.kind(term) {
                TermKind::Not(inner) => stack.push((inner, !polarity)),
                TermKind::True if polarity => {}
                TermKind::False if !polarity => {}
                TermKind::True | TermKind::False => {
                    return Err(SolverError::TriviallyUnsat);
                }
                TermKind::And if polarity => {
                    for &child in graph.children(term).iter().rev() {
                        stack.push((child, true));
                    }
                }
                TermKind::Or if !polarity => {
                    for &child in graph.children(term).iter().rev() {
                        stack.push((child, false));
                    }
                }
                TermKind::Eq(lhs, rhs) if polarity => self.top_eqs.push((lhs, rhs)),
                TermKind::Eq(..) => self.top_atoms.push(graph.negate(term)),
                TermKind::And | TermKind::Or => self.top_formulas.push(if polarity {
                    term
                } else {
                    graph.negate(term)
                }),
                TermKind::Ite(..) | TermKind::Polynomial | TermKind::Other => {
                    self.top_atoms
                        .push(if polarity { term } else { graph.negate(term) });
                }
            }
        }

        Ok(())
    }

    /// Phases 1-3 of variable elimination (§4.9): merge equivalence classes over uninterpreted
    /// terms, record `x := term` candidates for surviving equalities, then break cycles in the
    /// candidate graph with a three-coloring DFS.
    fn discover_substitutions(&mut self, graph: &mut dyn TermGraph, top_eqs: &[(TermId, TermId)]) {
        let mut partition = Partition::new();

        for &(lhs, rhs) in top_eqs {
            partition.add(lhs);
            partition.add(rhs);

            if graph.is_uninterpreted_var(lhs) && graph.is_uninterpreted_var(rhs) {
                partition.merge(lhs, rhs);
            } else {
                if !graph.is_uninterpreted_var(lhs) {
                    let root = partition.find(lhs);
                    partition.freeze(root);
                }
                if !graph.is_uninterpreted_var(rhs) {
                    let root = partition.find(rhs);
                    partition.freeze(root);
                }
            }
        }

        let mut candidates: FxHashMap<TermId, TermId> = FxHashMap::default();
        for &(lhs, rhs) in top_eqs {
            if graph.is_uninterpreted_var(lhs) && !candidates.contains_key(&lhs) {
                candidates.insert(lhs, rhs);
            } else if graph.is_uninterpreted_var(rhs) && !candidates.contains_key(&rhs) {
                candidates.insert(rhs, lhs);
            } else if let TermKind::Polynomial = graph.kind(lhs) {
                if let Some((var, rhs)) = graph.poly_substitution(lhs) {
                    candidates.entry(var).or_insert(rhs);
                }
            }
        }

        let mut colors: FxHashMap<TermId, Color> = FxHashMap::default();
        let keys: Vec<TermId> = candidates.keys().cloned().collect();

        for start in keys {
            self.break_cycles(&candidates, &mut colors, start);
        }
    }

    /// Depth-first walk of the substitution candidate graph with white/grey/black coloring: a
    /// grey vertex revisited means the edge that closed the cycle is retracted.
    fn break_cycles(
        &mut self,
        candidates: &FxHashMap<TermId, TermId>,
        colors: &mut FxHashMap<TermId, Color>,
        start: TermId,
    ) {
        if colors.contains_key(&start) {
            return;
        }

        let mut path = vec![start];
        colors.insert(start, Color::Grey);

        loop {
            let current = *path.last().unwrap();
            let next = match candidates.get(&current) {
                Some(&next) => next,
                None => {
                    colors.insert(current, Color::Black);
                    path.pop();
                    if path.is_empty() {
                        break;
                    }
                    continue;
                }
            };

            match colors.get(&next) {
                None => {
                    colors.insert(next, Color::Grey);
                    path.push(next);
                }
                Some(Color::Grey) => {
                    // `current := next` closes a cycle; retract it and finish this vertex.
                    colors.insert(current, Color::Black);
                    path.pop();
                    if path.is_empty() {
                        break;
                    }
                }
                Some(Color::White) | Some(Color::Black) => {
                    self.substitutions.insert(current, next);
                    colors.insert(current, Color::Black);
                    path.pop();
                    if path.is_empty() {
                        break;
                    }
                }
            }
        }
    }

    /// Follow the substitution chain for a term to its final representative.
    fn resolve(&self, mut term: TermId) -> TermId {
        while let Some(&next) = self.substitutions.get(&term) {
            term = next;
        }
        term
    }

    /// Recursive-descent internalization of a term, memoized via `codes`.
    ///
    /// Uses an explicit work stack rather than native recursion so the translator can bound
    /// recursion depth and fail with a structural error instead of overflowing the call stack.
    fn internalize(&mut self, graph: &mut dyn TermGraph, term: TermId) -> InternalCode {
        let term = self.resolve(term);

        if !matches!(self.code(term), InternalCode::Unassigned) {
            return self.code(term);
        }

        let mut stack = vec![term];
        let mut visited = Vec::new();

        while let Some(t) = stack.pop() {
            let t = self.resolve(t);
            if !matches!(self.code(t), InternalCode::Unassigned) {
                continue;
            }

            let pending_children: Vec<TermId> = match graph.kind(t) {
                TermKind::And | TermKind::Or => graph
                    .children(t)
                    .iter()
                    .map(|&c| self.resolve(c))
                    .filter(|c| matches!(self.code(*c), InternalCode::Unassigned))
                    .collect(),
                TermKind::Eq(lhs, rhs) => [lhs, rhs]
                    .iter()
                    .map(|&c| self.resolve(c))
                    .filter(|c| matches!(self.code(*c), InternalCode::Unassigned))
                    .collect(),
                TermKind::Ite(cond, then, els) => [cond, then, els]
                    .iter()
                    .map(|&c| self.resolve(c))
                    .filter(|c| matches!(self.code(*c), InternalCode::Unassigned))
                    .collect(),
                _ => Vec::new(),
            };

            if pending_children.is_empty() {
                visited.push(t);
            } else {
                stack.push(t);
                stack.extend(pending_children);
            }
        }

        for t in visited {
            self.internalize_one(graph, t);
        }

        self.code(term)
    }

    /// Assign `term` an internalization code appropriate to its sort: a fresh Boolean literal,
    /// a fresh arithmetic/bit-vector theory variable, or a shared-equality-graph node. Bit-vector
    /// polynomials are normalized first and aliased to their normal form's code when rewriting
    /// applies, mirroring the `poly_substitution` elimination done for arithmetic.
    fn internalize_one(&mut self, graph: &mut dyn TermGraph, term: TermId) {
        if !matches!(self.code(term), InternalCode::Unassigned) {
            return;
        }

        let ty = graph.sort(term);
        let code = match graph.sort_kind(ty) {
            SortKind::Bool => {
                let var = Var::from_index(self.next_bool_var as usize);
                self.next_bool_var += 1;
                InternalCode::Bool(Lit::from_var(var, false))
            }
            SortKind::Arith => {
                let id = self.next_arith_var;
                self.next_arith_var += 1;
                InternalCode::ArithVar(id)
            }
            SortKind::BitVec(_) => {
                let mut aliased = None;
                if let TermKind::Polynomial = graph.kind(term) {
                    if let Some(normalized) = graph.bv_normalize(term) {
                        if normalized != term {
                            self.internalize(graph, normalized);
                            aliased = Some(self.code(normalized));
                        }
                    }
                }
                match aliased {
                    Some(code) => code,
                    None => {
                        let id = self.next_bv_var;
                        self.next_bv_var += 1;
                        InternalCode::BvVar(id)
                    }
                }
            }
            SortKind::Uninterpreted => {
                let eterm = match graph.eterm_of(term) {
                    Some(id) => id,
                    None => {
                        let id = self.next_eterm;
                        self.next_eterm += 1;
                        graph.attach_eterm(term, id);
                        id
                    }
                };
                InternalCode::Eterm(eterm)
            }
        };

        self.set_code(term, code);
    }

    /// Assert `lhs == rhs` (`positive`) or `lhs != rhs` (`!positive`).
    ///
    /// If the two sides already resolve to the same substitution representative, variable
    /// elimination has already established the equality, so a disequality between them is a
    /// direct contradiction and an equality is a no-op. Otherwise Boolean sides get an XNOR/XOR
    /// clause pair; anything else is a theory-owned equality axiom, left pending for the caller.
    fn assert_eq(
        &mut self,
        graph: &mut dyn TermGraph,
        lhs: TermId,
        rhs: TermId,
        positive: bool,
    ) -> Result<(), SolverError> {
        let lhs_r = self.resolve(lhs);
        let rhs_r = self.resolve(rhs);

        if lhs_r == rhs_r {
            return if positive {
                Ok(())
            } else {
                Err(SolverError::TriviallyUnsat)
            };
        }

        self.internalize(graph, lhs_r);
        self.internalize(graph, rhs_r);

        match (self.code(lhs_r), self.code(rhs_r)) {
            (InternalCode::Bool(a), InternalCode::Bool(b)) => {
                if positive {
                    self.pending_clauses.push(vec![!a, b]);
                    self.pending_clauses.push(vec![a, !b]);
                } else {
                    self.pending_clauses.push(vec![a, b]);
                    self.pending_clauses.push(vec![!a, !b]);
                }
            }
            _ => {
                self.pending_theory_eqs.push((lhs_r, rhs_r, positive));
            }
        }

        Ok(())
    }

    /// Record `term` asserted with the given polarity: a Boolean literal becomes a unit clause,
    /// anything else is left pending for the theory.
    fn assert_leaf(&mut self, term: TermId, positive: bool) {
        match self.bool_lit(term, positive) {
            Some(lit) => self.pending_clauses.push(vec![lit]),
            None => self.pending_theory_atoms.push((term, positive)),
        }
    }

    /// The internalized literal for `term` with the given polarity applied, if `term`
    /// internalized to a Boolean code.
    fn bool_lit(&self, term: TermId, positive: bool) -> Option<Lit> {
        match self.code(term) {
            InternalCode::Bool(lit) => Some(if positive { lit } else { !lit }),
            _ => None,
        }
    }

    /// Dispatch a single top-level term by kind, per §4.9's assertion table: equalities call the
    /// eq/diseq axiom asserters, disjunctions expand to clauses, conditionals go through the gate
    /// manager, and everything else asserts the atom's recorded literal with its polarity.
    fn assert_top(&mut self, graph: &mut dyn TermGraph, term: TermId) -> Result<(), SolverError> {
        let positive = !matches!(graph.kind(term), TermKind::Not(_));
        let base = if positive { term } else { graph.negate(term) };

        match graph.kind(base) {
            TermKind::Eq(lhs, rhs) => self.assert_eq(graph, lhs, rhs, positive),
            TermKind::Or if positive => {
                let mut clause = Vec::new();
                for &child in graph.children(base) {
                    self.internalize(graph, child);
                    match self.bool_lit(child, true) {
                        Some(lit) => clause.push(lit),
                        None => self.pending_theory_atoms.push((child, true)),
                    }
                }
                if !clause.is_empty() {
                    self.pending_clauses.push(clause);
                }
                Ok(())
            }
            TermKind::Or => {
                // De Morgan: asserting ¬(a ∨ b ∨ ...) asserts ¬a ∧ ¬b ∧ ...
                for &child in graph.children(base) {
                    self.internalize(graph, child);
                    self.assert_leaf(child, false);
                }
                Ok(())
            }
            TermKind::Ite(cond, then, els) => {
                self.internalize(graph, cond);
                self.internalize(graph, then);
                self.internalize(graph, els);
                self.internalize(graph, base);

                if let (Some(g), Some(c), Some(t), Some(e)) = (
                    self.bool_lit(base, true),
                    self.bool_lit(cond, true),
                    self.bool_lit(then, true),
                    self.bool_lit(els, true),
                ) {
                    self.pending_clauses.push(vec![!g, !c, t]);
                    self.pending_clauses.push(vec![!g, c, e]);
                    self.pending_clauses.push(vec![g, !c, !t]);
                    self.pending_clauses.push(vec![g, c, !e]);
                }

                self.assert_leaf(base, positive);
                Ok(())
            }
            _ => {
                self.internalize(graph, base);
                self.assert_leaf(base, positive);
                Ok(())
            }
        }
    }
}

/// Internalize and assert a formula, then install every resulting Boolean clause into the clause
/// database.
///
/// Non-Boolean top-level atoms and equalities are left in the translator's pending-theory queues
/// ([`Translator::pending_theory_atoms`], [`Translator::pending_theory_eqs`]) for the caller to
/// forward to its own theory solver; this crate's [`crate::theory::TheoryControl`] contract covers
/// propagation and conflicts only, not the initial axiomatization of a formula.
pub fn install_formula(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        PushPopP,
        mut SolverStateP,
        mut TheoryP,
        mut TmpDataP,
        mut TranslatorP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
    graph: &mut dyn TermGraph,
    formula: TermId,
) -> Result<(), SolverError> {
    let (translator, mut ctx) = ctx.split_part_mut(TranslatorP);
    translator.assert_formula(graph, formula)?;

    let var_count = translator.bool_var_count();
    crate::context::ensure_var_count(ctx.borrow(), var_count);

    for clause in translator.pending_clauses() {
        load_clause(ctx.borrow(), &clause);
    }

    // A disjunction whose every disjunct turned out non-Boolean produces a bare clause with no
    // literals; `load_clause` already treats that as the standard empty-clause contradiction.
    let _ = (
        translator.pending_theory_atoms(),
        translator.pending_theory_eqs(),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fixed, hand-built term graph: `terms[i]` gives the kind and (for `And`/`Or`) children of
    /// term `i`. Good enough to drive flattening, substitution discovery, and internalization
    /// without a real term table.
    struct MockGraph {
        terms: Vec<TermKind>,
        children: Vec<Vec<TermId>>,
        eterms: FxHashMap<TermId, u32>,
    }

    impl MockGraph {
        fn new() -> MockGraph {
            MockGraph {
                terms: Vec::new(),
                children: Vec::new(),
                eterms: FxHashMap::default(),
            }
        }

        fn push(&mut self, kind: TermKind, children: Vec<TermId>) -> TermId {
            let id = TermId(self.terms.len() as u32);
            self.terms.push(kind);
            self.children.push(children);
            id
        }
    }

    impl TermGraph for MockGraph {
        fn kind(&self, term: TermId) -> TermKind {
            self.terms[term.0 as usize]
        }

        fn children(&self, term: TermId) -> &[TermId] {
            &self.children[term.0 as usize]
        }

        fn sort(&self, _term: TermId) -> TypeId {
            TypeId(0)
        }

        fn sort_kind(&self, _ty: TypeId) -> SortKind {
            SortKind::Bool
        }

        fn is_subtype(&self, _sub: TypeId, _sup: TypeId) -> bool {
            true
        }

        fn is_uninterpreted_var(&self, term: TermId) -> bool {
            matches!(self.kind(term), TermKind::Other)
        }

        fn poly_substitution(&self, _poly: TermId) -> Option<(TermId, TermId)> {
            None
        }

        fn bv_normalize(&self, _poly: TermId) -> Option<TermId> {
            None
        }

        fn eterm_of(&self, term: TermId) -> Option<u32> {
            self.eterms.get(&term).copied()
        }

        fn attach_eterm(&mut self, term: TermId, eterm: u32) {
            self.eterms.insert(term, eterm);
        }

        fn negate(&self, term: TermId) -> TermId {
            match self.kind(term) {
                TermKind::Not(inner) => inner,
                _ => term,
            }
        }
    }

    #[test]
    fn flatten_splits_nested_and() {
        let mut graph = MockGraph::new();
        let a = graph.push(TermKind::Other, vec![]);
        let b = graph.push(TermKind::Other, vec![]);
        let c = graph.push(TermKind::Other, vec![]);
        let and_bc = graph.push(TermKind::And, vec![b, c]);
        let top = graph.push(TermKind::And, vec![a, and_bc]);

        let mut translator = Translator::default();
        translator.flatten(&mut graph, top, true).unwrap();

        assert_eq!(translator.top_atoms, vec![a, b, c]);
        assert!(translator.top_eqs.is_empty());
        assert!(translator.top_formulas.is_empty());
    }

    #[test]
    fn flatten_direct_contradiction_is_trivially_unsat() {
        let mut graph = MockGraph::new();
        let f = graph.push(TermKind::False, vec![]);

        let mut translator = Translator::default();
        let err = translator.flatten(&mut graph, f, true).unwrap_err();

        assert!(matches!(err, SolverError::TriviallyUnsat));
    }

    #[test]
    fn substitution_resolves_to_final_representative() {
        let mut graph = MockGraph::new();
        let x = graph.push(TermKind::Other, vec![]);
        let y = graph.push(TermKind::Other, vec![]);
        let z = graph.push(TermKind::Other, vec![]);

        let mut translator = Translator::default();
        translator.discover_substitutions(&mut graph, &[(x, y), (y, z)]);

        assert_eq!(translator.resolve(x), translator.resolve(z));
    }

    #[test]
    fn internalize_assigns_a_literal_per_term() {
        let mut graph = MockGraph::new();
        let a = graph.push(TermKind::Other, vec![]);

        let mut translator = Translator::default();
        let code = translator.internalize(&mut graph, a);

        assert!(matches!(code, InternalCode::Bool(_)));
    }

    #[test]
    fn internalize_dispatches_per_sort() {
        struct SortedGraph {
            inner: MockGraph,
            sorts: Vec<SortKind>,
        }

        impl TermGraph for SortedGraph {
            fn kind(&self, term: TermId) -> TermKind {
                self.inner.kind(term)
            }
            fn children(&self, term: TermId) -> &[TermId] {
                self.inner.children(term)
            }
            fn sort(&self, term: TermId) -> TypeId {
                TypeId(term.0)
            }
            fn sort_kind(&self, ty: TypeId) -> SortKind {
                self.sorts[ty.0 as usize]
            }
            fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
                self.inner.is_subtype(sub, sup)
            }
            fn is_uninterpreted_var(&self, term: TermId) -> bool {
                self.inner.is_uninterpreted_var(term)
            }
            fn poly_substitution(&self, poly: TermId) -> Option<(TermId, TermId)> {
                self.inner.poly_substitution(poly)
            }
            fn bv_normalize(&self, poly: TermId) -> Option<TermId> {
                self.inner.bv_normalize(poly)
            }
            fn eterm_of(&self, term: TermId) -> Option<u32> {
                self.inner.eterm_of(term)
            }
            fn attach_eterm(&mut self, term: TermId, eterm: u32) {
                self.inner.attach_eterm(term, eterm)
            }
            fn negate(&self, term: TermId) -> TermId {
                self.inner.negate(term)
            }
        }

        let mut inner = MockGraph::new();
        let arith_var = inner.push(TermKind::Other, vec![]);
        let uf_var = inner.push(TermKind::Other, vec![]);
        let mut graph = SortedGraph {
            inner,
            sorts: vec![SortKind::Arith, SortKind::Uninterpreted],
        };

        let mut translator = Translator::default();
        assert!(matches!(
            translator.internalize(&mut graph, arith_var),
            InternalCode::ArithVar(0)
        ));
        assert!(matches!(
            translator.internalize(&mut graph, uf_var),
            InternalCode::Eterm(0)
        ));
        assert_eq!(graph.eterm_of(uf_var), Some(0));
    }

    #[test]
    fn assert_eq_detects_equality_abstraction_contradiction() {
        let mut graph = MockGraph::new();
        let x = graph.push(TermKind::Other, vec![]);
        let y = graph.push(TermKind::Other, vec![]);
        let z = graph.push(TermKind::Other, vec![]);

        let mut translator = Translator::default();
        translator.discover_substitutions(&mut graph, &[(x, y), (y, z)]);

        let err = translator.assert_eq(&mut graph, x, z, false).unwrap_err();
        assert!(matches!(err, SolverError::TriviallyUnsat));

        assert!(translator.assert_eq(&mut graph, x, z, true).is_ok());
    }

    #[test]
    fn assert_top_or_produces_a_clause() {
        let mut graph = MockGraph::new();
        let a = graph.push(TermKind::Other, vec![]);
        let b = graph.push(TermKind::Other, vec![]);
        let or_ab = graph.push(TermKind::Or, vec![a, b]);

        let mut translator = Translator::default();
        translator.assert_top(&mut graph, or_ab).unwrap();

        let clauses = translator.pending_clauses();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].len(), 2);
    }

    #[test]
    fn assert_top_ite_produces_gate_clauses() {
        let mut graph = MockGraph::new();
        let c = graph.push(TermKind::Other, vec![]);
        let t = graph.push(TermKind::Other, vec![]);
        let e = graph.push(TermKind::Other, vec![]);
        let ite = graph.push(TermKind::Ite(c, t, e), vec![]);

        let mut translator = Translator::default();
        translator.assert_top(&mut graph, ite).unwrap();

        let clauses = translator.pending_clauses();
        // 4 gate-definition clauses plus 1 unit clause asserting the gate itself.
        assert_eq!(clauses.len(), 5);
    }

    #[test]
    fn arithmetic_elimination_substitutes_before_asserting() {
        use std::collections::HashSet;

        // `x + y == 3` is asserted as `Eq(poly, zero)` where `poly` abstracts the polynomial
        // `x + y - 3` and `poly_substitution` picks `y := rhs` with `rhs` abstracting `3 - x`.
        // A later `y == -1` should resolve through that substitution and assert `3 - x == -1`
        // instead of ever internalizing `y` directly.
        struct PolyGraph {
            inner: MockGraph,
            free_vars: HashSet<TermId>,
            poly: TermId,
            y: TermId,
            rhs: TermId,
        }

        impl TermGraph for PolyGraph {
            fn kind(&self, term: TermId) -> TermKind {
                self.inner.kind(term)
            }
            fn children(&self, term: TermId) -> &[TermId] {
                self.inner.children(term)
            }
            fn sort(&self, term: TermId) -> TypeId {
                self.inner.sort(term)
            }
            fn sort_kind(&self, _ty: TypeId) -> SortKind {
                SortKind::Arith
            }
            fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
                self.inner.is_subtype(sub, sup)
            }
            fn is_uninterpreted_var(&self, term: TermId) -> bool {
                self.free_vars.contains(&term)
            }
            fn poly_substitution(&self, poly: TermId) -> Option<(TermId, TermId)> {
                if poly == self.poly {
                    Some((self.y, self.rhs))
                } else {
                    None
                }
            }
            fn bv_normalize(&self, _poly: TermId) -> Option<TermId> {
                None
            }
            fn eterm_of(&self, term: TermId) -> Option<u32> {
                self.inner.eterm_of(term)
            }
            fn attach_eterm(&mut self, term: TermId, eterm: u32) {
                self.inner.attach_eterm(term, eterm)
            }
            fn negate(&self, term: TermId) -> TermId {
                self.inner.negate(term)
            }
        }

        let mut inner = MockGraph::new();
        let x = inner.push(TermKind::Other, vec![]);
        let y = inner.push(TermKind::Other, vec![]);
        let poly = inner.push(TermKind::Polynomial, vec![]);
        let zero = inner.push(TermKind::Other, vec![]);
        let rhs = inner.push(TermKind::Other, vec![]);
        let neg_one = inner.push(TermKind::Other, vec![]);
        let eq1 = inner.push(TermKind::Eq(poly, zero), vec![]);
        let eq2 = inner.push(TermKind::Eq(y, neg_one), vec![]);
        let formula = inner.push(TermKind::And, vec![eq1, eq2]);

        let mut graph = PolyGraph {
            inner,
            free_vars: vec![x, y].into_iter().collect(),
            poly,
            y,
            rhs,
        };

        let mut translator = Translator::default();
        translator.assert_formula(&mut graph, formula).unwrap();

        assert_eq!(translator.resolve(y), rhs);
        assert_eq!(translator.code(y), InternalCode::Unassigned);
        assert_ne!(translator.code(rhs), InternalCode::Unassigned);
    }

    #[test]
    fn classify_difference_logic_picks_floyd_warshall_when_small() {
        let profile = DlProfile {
            var_count: 10,
            atom_count: 20,
            eq_count: 2,
            sum_abs_const: 100,
        };
        assert_eq!(
            classify_difference_logic(profile),
            DifferenceLogicEngine::FloydWarshall
        );
    }

    #[test]
    fn classify_difference_logic_picks_simplex_when_huge() {
        let profile = DlProfile {
            var_count: 5000,
            atom_count: 6000,
            eq_count: 10,
            sum_abs_const: 100,
        };
        assert_eq!(
            classify_difference_logic(profile),
            DifferenceLogicEngine::Simplex
        );
    }

    #[test]
    fn classify_difference_logic_picks_simplex_on_overflow_risk() {
        let profile = DlProfile {
            var_count: 50,
            atom_count: 60,
            eq_count: 5,
            sum_abs_const: 1 << 31,
        };
        assert_eq!(
            classify_difference_logic(profile),
            DifferenceLogicEngine::Simplex
        );
    }

    #[test]
    fn classify_difference_logic_uses_density_in_the_middle_range() {
        let dense = DlProfile {
            var_count: 500,
            atom_count: 6000,
            eq_count: 5,
            sum_abs_const: 0,
        };
        assert_eq!(
            classify_difference_logic(dense),
            DifferenceLogicEngine::FloydWarshall
        );

        let sparse = DlProfile {
            var_count: 500,
            atom_count: 600,
            eq_count: 5,
            sum_abs_const: 0,
        };
        assert_eq!(
            classify_difference_logic(sparse),
            DifferenceLogicEngine::Simplex
        );
    }
}
