// C-like rendering of IR nodes, used for error diagnostics and the pass
// trace hook. The real code emitter lives outside this crate.

use crate::ir::def::*;
use std::fmt;

impl fmt::Display for ScalarTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
        })
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        })
    }
}

impl fmt::Display for Subscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var { name, off } if *off == 0 => write!(f, "{}", name),
            Self::Var { name, off } if *off > 0 => write!(f, "{}+{}", name, off),
            Self::Var { name, off } => write!(f, "{}{}", name, off),
            Self::Lit(n) => write!(f, "{}", n),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for s in &self.rank {
            write!(f, "[{}]", s)?;
        }
        Ok(())
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(n) => write!(f, "{}", n),
            Self::Affine { var, scale, offset } => {
                if *scale == 1 {
                    write!(f, "{}", var)?;
                } else {
                    write!(f, "{}*{}", var, scale)?;
                }
                if *offset > 0 {
                    write!(f, "+{}", offset)?;
                } else if *offset < 0 {
                    write!(f, "{}", offset)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(s) => write!(f, "{}", s),
            Self::Par(e) => write!(f, "({})", e),
            Self::Binary { op, lhs, rhs } => write!(f, "{}{}{}", lhs, op, rhs),
            Self::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {};", self.ty, self.sym)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl fmt::Display for For {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_for(f, self, 0)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, self, 0)
    }
}

fn pad(f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, s: &Stmt, indent: usize) -> fmt::Result {
    match s {
        Stmt::Decl(d) => {
            pad(f, indent)?;
            writeln!(f, "{}", d)
        }
        Stmt::Assign { lhs, rhs } => {
            pad(f, indent)?;
            writeln!(f, "{} = {};", lhs, rhs)
        }
        Stmt::Incr { lhs, rhs } => {
            pad(f, indent)?;
            writeln!(f, "{} += {};", lhs, rhs)
        }
        Stmt::Block(b) => write_block(f, b, indent),
        Stmt::For(l) => write_for(f, l, indent),
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, b: &Block, indent: usize) -> fmt::Result {
    pad(f, indent)?;
    f.write_str("{\n")?;
    for s in &b.stmts {
        write_stmt(f, s, indent + 1)?;
    }
    pad(f, indent)?;
    f.write_str("}\n")
}

fn write_for(f: &mut fmt::Formatter<'_>, l: &For, indent: usize) -> fmt::Result {
    if l.vectorize {
        pad(f, indent)?;
        f.write_str("#pragma simd\n")?;
    }
    pad(f, indent)?;
    if l.step == 1 {
        writeln!(
            f,
            "for (int {v} = {}; {v} < {}; {v}++)",
            l.start,
            l.end,
            v = l.var
        )?;
    } else {
        writeln!(
            f,
            "for (int {v} = {}; {v} < {}; {v} += {})",
            l.start,
            l.end,
            l.step,
            v = l.var
        )?;
    }
    pad(f, indent)?;
    f.write_str("{\n")?;
    for s in &l.body {
        write_stmt(f, s, indent + 1)?;
    }
    pad(f, indent)?;
    f.write_str("}\n")
}
