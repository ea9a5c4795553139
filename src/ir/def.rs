use rustc_hash::FxHashMap;

pub type Ident = String;

// Declared types of kernel symbols. The table itself comes from the front-end.
pub type SymbolTable = FxHashMap<Ident, ScalarTy>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarTy {
    Int,
    Float,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

// One subscript position of an array reference: either an iteration variable
// (with a constant shift, used by unroll-and-jam) or a literal extent/index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subscript {
    Var { name: Ident, off: i64 },
    Lit(i64),
}

impl Subscript {
    pub fn var(name: &str) -> Self {
        Self::Var {
            name: name.to_string(),
            off: 0,
        }
    }

    pub fn lit(n: i64) -> Self {
        Self::Lit(n)
    }

    pub fn mentions(&self, v: &str) -> bool {
        matches!(self, Self::Var { name, .. } if name == v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: Ident,
    pub rank: Vec<Subscript>,
}

impl Symbol {
    pub fn scalar(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rank: Vec::new(),
        }
    }

    pub fn indexed(name: &str, rank: Vec<Subscript>) -> Self {
        Self {
            name: name.to_string(),
            rank,
        }
    }

    pub fn mentions(&self, v: &str) -> bool {
        self.rank.iter().any(|s| s.mentions(v))
    }

    // Subset of the nest's iteration variables appearing in the subscript,
    // kept in nest order so the last element is the fastest-varying one.
    pub fn loop_dep(&self, nest_vars: &[Ident]) -> Vec<Ident> {
        nest_vars
            .iter()
            .filter(|v| self.mentions(v))
            .cloned()
            .collect()
    }
}

// Loop bounds. Affine bounds appear on tiled inner loops: the value is
// `var * scale + offset` in the enclosing tile variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Const(i64),
    Affine { var: Ident, scale: i64, offset: i64 },
}

impl Bound {
    pub fn offset_by(&self, d: i64) -> Bound {
        match self {
            Self::Const(n) => Self::Const(n + d),
            Self::Affine { var, scale, offset } => Self::Affine {
                var: var.clone(),
                scale: *scale,
                offset: offset + d,
            },
        }
    }

    pub fn mentions(&self, v: &str) -> bool {
        matches!(self, Self::Affine { var, .. } if var == v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct For {
    pub var: Ident,
    pub start: Bound,
    pub end: Bound, // exclusive
    pub step: i64,
    // Set by the peeler; the emitter renders it as a simd pragma.
    pub vectorize: bool,
    pub body: Vec<Stmt>,
}

impl For {
    pub fn new(var: &str, start: i64, end: i64, body: Vec<Stmt>) -> Self {
        Self::with_bounds(var, Bound::Const(start), Bound::Const(end), 1, body)
    }

    pub fn with_bounds(var: &str, start: Bound, end: Bound, step: i64, body: Vec<Stmt>) -> Self {
        Self {
            var: var.to_string(),
            start,
            end,
            step,
            vectorize: false,
            body,
        }
    }

    // Statically known trip count, when both bounds are constant or affine in
    // the same variable with the same scale.
    pub fn trip_count(&self) -> Option<i64> {
        if self.step <= 0 {
            return None;
        }
        let span = match (&self.start, &self.end) {
            (Bound::Const(s), Bound::Const(e)) => e - s,
            (
                Bound::Affine {
                    var: sv,
                    scale: ss,
                    offset: so,
                },
                Bound::Affine {
                    var: ev,
                    scale: es,
                    offset: eo,
                },
            ) if sv == ev && ss == es => eo - so,
            _ => return None,
        };
        if span <= 0 {
            Some(0)
        } else {
            Some((span + self.step - 1) / self.step)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decl {
    pub ty: ScalarTy,
    pub sym: Symbol, // rank entries are literal extents
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub open_scope: bool,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            open_scope: false,
        }
    }

    pub fn scoped(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            open_scope: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Symbol(Symbol),
    // Transparent wrapper, pass-through for analysis.
    Par(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    // Opaque to the analyzer; hitting one aborts the statement's analysis.
    Call {
        name: Ident,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn sym(s: Symbol) -> Self {
        Self::Symbol(s)
    }

    pub fn par(e: Expr) -> Self {
        Self::Par(Box::new(e))
    }

    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn mentions(&self, v: &str) -> bool {
        match self {
            Self::Symbol(s) => s.mentions(v),
            Self::Par(e) => e.mentions(v),
            Self::Binary { lhs, rhs, .. } => lhs.mentions(v) || rhs.mentions(v),
            Self::Call { args, .. } => args.iter().any(|a| a.mentions(v)),
        }
    }

    pub fn each_symbol(&self, f: &mut impl FnMut(&Symbol)) {
        match self {
            Self::Symbol(s) => f(s),
            Self::Par(e) => e.each_symbol(f),
            Self::Binary { lhs, rhs, .. } => {
                lhs.each_symbol(f);
                rhs.each_symbol(f);
            }
            Self::Call { args, .. } => {
                for a in args {
                    a.each_symbol(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    Decl(Decl),
    Assign { lhs: Symbol, rhs: Expr },
    Incr { lhs: Symbol, rhs: Expr },
    Block(Block),
    For(For),
}

impl Stmt {
    pub fn write_target(&self) -> Option<&Symbol> {
        match self {
            Self::Assign { lhs, .. } | Self::Incr { lhs, .. } => Some(lhs),
            _ => None,
        }
    }

    pub fn mentions(&self, v: &str) -> bool {
        match self {
            Self::Decl(d) => d.sym.mentions(v),
            Self::Assign { lhs, rhs } | Self::Incr { lhs, rhs } => {
                lhs.mentions(v) || rhs.mentions(v)
            }
            Self::Block(b) => b.stmts.iter().any(|s| s.mentions(v)),
            Self::For(f) => {
                f.start.mentions(v)
                    || f.end.mentions(v)
                    || f.body.iter().any(|s| s.mentions(v))
            }
        }
    }
}
