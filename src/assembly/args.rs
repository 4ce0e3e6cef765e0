// Binding loosely typed specification values to typed constructor parameters.
// Selection only looks at the shape of an argument, value checks happen when
// the chosen signature is bound.

use crate::distributions::Distribution;
use crate::error::{Result, SimError};
use crate::spec::ArgValue;

// Largest integer an f64 holds exactly.
const F64_EXACT_INT: i64 = 1 << 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Distribution,
    Real,
    Integer,
    Unsigned,
    Text,
    // Enum parsed by variant name, case-insensitive.
    Choice(&'static [&'static str]),
    // Nullable wrapping of the inner kind.
    Optional(&'static ParamKind),
}

// An argument on its way to a constructor. The nested distribution, when an
// `AgentSpec` carries one, is built first and travels as the leading argument.
#[derive(Debug)]
pub enum Arg {
    Value(ArgValue),
    Distribution(Box<dyn Distribution>),
}

#[derive(Debug)]
pub enum Bound {
    Distribution(Box<dyn Distribution>),
    Real(f64),
    Integer(i64),
    Unsigned(u64),
    Text(String),
    // Index into the choice list.
    Choice(usize),
    Absent,
}

impl ParamKind {
    pub fn accepts(&self, arg: &Arg) -> bool {
        match (self, arg) {
            (ParamKind::Distribution, Arg::Distribution(_)) => true,
            (ParamKind::Distribution, Arg::Value(_)) | (_, Arg::Distribution(_)) => false,
            (ParamKind::Optional(_), Arg::Value(ArgValue::Null)) => true,
            (ParamKind::Optional(inner), arg) => inner.accepts(arg),
            (ParamKind::Real | ParamKind::Integer | ParamKind::Unsigned, Arg::Value(v)) => {
                matches!(v, ArgValue::Int(_) | ArgValue::Float(_))
            }
            (ParamKind::Text | ParamKind::Choice(_), Arg::Value(v)) => matches!(v, ArgValue::Str(_)),
        }
    }

    pub fn bind(&self, arg: Arg) -> std::result::Result<Bound, String> {
        let value = match (self, arg) {
            (ParamKind::Distribution, Arg::Distribution(d)) => return Ok(Bound::Distribution(d)),
            (_, Arg::Distribution(d)) => {
                return Err(format!("expected {self:?}, got a {} distribution", d.name()));
            }
            (_, Arg::Value(v)) => v,
        };

        match (self, value) {
            (ParamKind::Optional(_), ArgValue::Null) => Ok(Bound::Absent),
            (ParamKind::Optional(inner), v) => inner.bind(Arg::Value(v)),
            (ParamKind::Real, ArgValue::Float(f)) => Ok(Bound::Real(f)),
            (ParamKind::Real, ArgValue::Int(i)) if i.unsigned_abs() <= F64_EXACT_INT as u64 => Ok(Bound::Real(i as f64)),
            (ParamKind::Integer, ArgValue::Int(i)) => Ok(Bound::Integer(i)),
            (ParamKind::Integer, ArgValue::Float(f)) => integral(f).map(Bound::Integer),
            (ParamKind::Unsigned, ArgValue::Int(i)) => {
                u64::try_from(i).map(Bound::Unsigned).map_err(|_| format!("{i} is negative"))
            }
            (ParamKind::Unsigned, ArgValue::Float(f)) => {
                let i = integral(f)?;
                u64::try_from(i).map(Bound::Unsigned).map_err(|_| format!("{f} is negative"))
            }
            (ParamKind::Text, ArgValue::Str(s)) => Ok(Bound::Text(s)),
            (ParamKind::Choice(names), ArgValue::Str(s)) => names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(s.trim()))
                .map(Bound::Choice)
                .ok_or_else(|| format!("'{s}' is not one of {}", names.join(", "))),
            (kind, v) => Err(format!("cannot convert {v:?} to {kind:?}")),
        }
    }
}

fn integral(f: f64) -> std::result::Result<i64, String> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= F64_EXACT_INT as f64 {
        Ok(f as i64)
    } else {
        Err(format!("{f} is not a whole number"))
    }
}

// One constructor: its parameter list and the function that builds from it.
#[derive(Debug)]
pub struct Signature<F> {
    pub params: &'static [ParamKind],
    pub build: F,
}

// First signature whose arity matches and whose every parameter accepts the
// corresponding argument.
pub fn select<'a, F>(type_name: &str, signatures: &'a [Signature<F>], args: &[Arg]) -> Result<&'a Signature<F>> {
    signatures
        .iter()
        .filter(|sig| sig.params.len() == args.len())
        .find(|sig| sig.params.iter().zip(args).all(|(p, a)| p.accepts(a)))
        .ok_or_else(|| SimError::NoMatchingConstructor {
            type_name: type_name.to_string(),
            arity: args.len(),
        })
}

pub fn bind_all(type_name: &str, params: &[ParamKind], args: Vec<Arg>) -> Result<Bindings> {
    let mut bound = Vec::with_capacity(args.len());
    for (position, (param, arg)) in params.iter().zip(args).enumerate() {
        let value = param.bind(arg).map_err(|reason| SimError::ArgumentConversionFailed {
            type_name: type_name.to_string(),
            position,
            reason,
        })?;
        bound.push(value);
    }
    Ok(Bindings {
        type_name: type_name.to_string(),
        items: bound.into_iter(),
        position: 0,
    })
}

// Bound arguments, consumed front to back by a constructor.
#[derive(Debug)]
pub struct Bindings {
    type_name: String,
    items: std::vec::IntoIter<Bound>,
    position: usize,
}

impl Bindings {
    fn next(&mut self, expected: &str) -> Result<Bound> {
        let position = self.position;
        self.position += 1;
        self.items.next().ok_or_else(|| SimError::ArgumentConversionFailed {
            type_name: self.type_name.clone(),
            position,
            reason: format!("missing {expected} argument"),
        })
    }

    fn mismatch(&self, expected: &str, got: &Bound) -> SimError {
        SimError::ArgumentConversionFailed {
            type_name: self.type_name.clone(),
            position: self.position - 1,
            reason: format!("expected {expected}, got {got:?}"),
        }
    }

    pub fn distribution(&mut self) -> Result<Box<dyn Distribution>> {
        match self.next("distribution")? {
            Bound::Distribution(d) => Ok(d),
            other => Err(self.mismatch("distribution", &other)),
        }
    }

    pub fn real(&mut self) -> Result<f64> {
        match self.next("real")? {
            Bound::Real(v) => Ok(v),
            other => Err(self.mismatch("real", &other)),
        }
    }

    pub fn integer(&mut self) -> Result<i64> {
        match self.next("integer")? {
            Bound::Integer(v) => Ok(v),
            other => Err(self.mismatch("integer", &other)),
        }
    }

    pub fn unsigned(&mut self) -> Result<u64> {
        match self.next("unsigned")? {
            Bound::Unsigned(v) => Ok(v),
            other => Err(self.mismatch("unsigned", &other)),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        match self.next("text")? {
            Bound::Text(v) => Ok(v),
            other => Err(self.mismatch("text", &other)),
        }
    }

    pub fn choice(&mut self) -> Result<usize> {
        match self.next("choice")? {
            Bound::Choice(v) => Ok(v),
            other => Err(self.mismatch("choice", &other)),
        }
    }

    pub fn optional_unsigned(&mut self) -> Result<Option<u64>> {
        match self.next("optional unsigned")? {
            Bound::Absent => Ok(None),
            Bound::Unsigned(v) => Ok(Some(v)),
            other => Err(self.mismatch("optional unsigned", &other)),
        }
    }
}
