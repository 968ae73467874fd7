use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::alpha1;
use nom::character::complete::alphanumeric1;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::combinator::all_consuming;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::recognize;
use nom::multi::many0;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::sequence::pair;
use nom::sequence::preceded;
use nom::sequence::terminated;
use serde::Deserialize;
use serde::Serialize;

/// Yields the per-axis block size used to partition the spatial axes of
/// an array. The indexer reads it once, at construction, so the result
/// must not change over the lifetime of an indexer.
///
/// Plain sizes are the simplest policy. A [`DynamicShape`] describes the
/// family of input shapes a model accepts and contributes its smallest
/// member (all variables zero) as the block shape.
pub trait BlockShapePolicy {
    fn block_shape(&self) -> Vec<usize>;
}

impl BlockShapePolicy for Vec<usize> {
    fn block_shape(&self) -> Vec<usize> {
        self.clone()
    }
}

impl BlockShapePolicy for [usize] {
    fn block_shape(&self) -> Vec<usize> {
        self.to_vec()
    }
}

impl<const N: usize> BlockShapePolicy for [usize; N] {
    fn block_shape(&self) -> Vec<usize> {
        self.to_vec()
    }
}

impl<P: BlockShapePolicy + ?Sized> BlockShapePolicy for &P {
    fn block_shape(&self) -> Vec<usize> {
        (**self).block_shape()
    }
}

impl<P: BlockShapePolicy + ?Sized> BlockShapePolicy for Box<P> {
    fn block_shape(&self) -> Vec<usize> {
        (**self).block_shape()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShapeExprError {
    #[error("invalid shape expression `{code}`")]
    Syntax { code: String },

    #[error("unbound variable `{name}` in shape expression")]
    UnboundVariable { name: String },

    #[error("division by zero in shape expression")]
    DivisionByZero,

    #[error("integer overflow in shape expression")]
    Overflow,

    #[error("axis {axis} evaluates to non-positive extent {extent}")]
    NonPositiveExtent { axis: usize, extent: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Int(i64),
    Var(String),
    Neg(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn binary(op: &str, lhs: Expr, rhs: Expr) -> Expr {
        let op = match op {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "%" => Op::Rem,
            _ => Op::FloorDiv,
        };
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    fn eval(&self, bindings: &dyn Fn(&str) -> Option<i64>) -> Result<i64, ShapeExprError> {
        match self {
            Expr::Int(value) => Ok(*value),
            Expr::Var(name) => bindings(name).ok_or_else(|| ShapeExprError::UnboundVariable {
                name: name.clone(),
            }),
            Expr::Neg(inner) => inner
                .eval(bindings)?
                .checked_neg()
                .ok_or(ShapeExprError::Overflow),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(bindings)?;
                let rhs = rhs.eval(bindings)?;
                match op {
                    Op::Add => lhs.checked_add(rhs).ok_or(ShapeExprError::Overflow),
                    Op::Sub => lhs.checked_sub(rhs).ok_or(ShapeExprError::Overflow),
                    Op::Mul => lhs.checked_mul(rhs).ok_or(ShapeExprError::Overflow),
                    Op::FloorDiv | Op::Rem if rhs == 0 => Err(ShapeExprError::DivisionByZero),
                    Op::FloorDiv => Ok(floor_div(lhs, rhs)),
                    Op::Rem => Ok(lhs - rhs * floor_div(lhs, rhs)),
                }
            }
        }
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Int(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }
}

/// Integer division rounding towards negative infinity.
fn floor_div(lhs: i64, rhs: i64) -> i64 {
    let quotient = lhs / rhs;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

fn integer(input: &str) -> IResult<&str, Expr> {
    map(map_res(digit1, str::parse::<i64>), Expr::Int)(input)
}

fn variable(input: &str) -> IResult<&str, Expr> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |name: &str| Expr::Var(name.to_string()),
    )(input)
}

fn factor(input: &str) -> IResult<&str, Expr> {
    alt((
        integer,
        variable,
        delimited(char('('), expression, char(')')),
        map(preceded(char('-'), factor), |inner| Expr::Neg(Box::new(inner))),
    ))(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(alt((tag("//"), tag("*"), tag("/"), tag("%"))), factor))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |lhs, (op, rhs)| Expr::binary(op, lhs, rhs));
    Ok((input, expr))
}

fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(alt((tag("+"), tag("-"))), term))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |lhs, (op, rhs)| Expr::binary(op, lhs, rhs));
    Ok((input, expr))
}

fn shape_tuple(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        char('('),
        terminated(separated_list1(char(','), expression), opt(char(','))),
        char(')'),
    )(input)
}

/// A symbolic shape: one integer expression per axis over free variables.
///
/// ```
/// use ndtile::BlockShapePolicy;
/// use ndtile::DynamicShape;
///
/// let shape = DynamicShape::parse("(32 * (nH + 1), 32 * (nW + 1))").unwrap();
/// assert_eq!(shape.base_shape(), &[32, 32]);
/// assert_eq!(shape.block_shape(), vec![32, 32]);
/// assert_eq!(shape.eval(&[("nH", 1), ("nW", 3)]).unwrap(), vec![64, 128]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DynamicShape {
    code: String,
    axes: Vec<Expr>,
    base_shape: Vec<usize>,
}

impl DynamicShape {
    /// Parse a shape code. The base shape (every variable zero) must be
    /// positive on every axis.
    pub fn parse(code: &str) -> Result<Self, ShapeExprError> {
        let input: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        let (_, axes) = all_consuming(shape_tuple)(&input).map_err(|_| ShapeExprError::Syntax {
            code: code.to_string(),
        })?;
        let base_shape = evaluate(&axes, &|_: &str| Some(0))?;
        Ok(Self {
            code: code.to_string(),
            axes,
            base_shape,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn num_dim(&self) -> usize {
        self.axes.len()
    }

    /// The shape with every variable bound to zero.
    pub fn base_shape(&self) -> &[usize] {
        &self.base_shape
    }

    /// The free variables of the shape, sorted.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for axis in &self.axes {
            axis.collect_variables(&mut out);
        }
        out
    }

    /// Evaluate the shape with the given variable bindings. Every free
    /// variable must be bound.
    pub fn eval(&self, bindings: &[(&str, i64)]) -> Result<Vec<usize>, ShapeExprError> {
        let bindings: HashMap<&str, i64> = bindings.iter().copied().collect();
        evaluate(&self.axes, &|name: &str| bindings.get(name).copied())
    }
}

fn evaluate(
    axes: &[Expr],
    bindings: &dyn Fn(&str) -> Option<i64>,
) -> Result<Vec<usize>, ShapeExprError> {
    axes.iter()
        .enumerate()
        .map(|(axis, expr)| {
            let extent = expr.eval(bindings)?;
            if extent <= 0 {
                return Err(ShapeExprError::NonPositiveExtent { axis, extent });
            }
            usize::try_from(extent).map_err(|_| ShapeExprError::Overflow)
        })
        .collect()
}

impl BlockShapePolicy for DynamicShape {
    fn block_shape(&self) -> Vec<usize> {
        self.base_shape.clone()
    }
}

impl fmt::Display for DynamicShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl TryFrom<String> for DynamicShape {
    type Error = ShapeExprError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        DynamicShape::parse(&code)
    }
}

impl From<DynamicShape> for String {
    fn from(shape: DynamicShape) -> Self {
        shape.code
    }
}

impl std::str::FromStr for DynamicShape {
    type Err = ShapeExprError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        DynamicShape::parse(code)
    }
}
