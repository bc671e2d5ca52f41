//! Animatable data model
//!
//! Anything Rebound animates is one of three forms: a number, a flat array
//! of numbers, or a record whose fields are themselves animatable. The
//! integrator never sees these forms directly. A [`Shape`] is captured once
//! when an animated value is created and converts between the structured
//! [`Animatable`] and a flat list of scalar [`Components`], in a fixed order.
//!
//! ```
//! use rebound_core::{Animatable, Shape};
//!
//! let point = Animatable::record([("x", 1.0), ("y", 2.0)]);
//! let shape = Shape::of(&point);
//!
//! let components = shape.flatten(&point).unwrap();
//! assert_eq!(components.as_slice(), &[1.0, 2.0]);
//! assert_eq!(shape.unflatten(&components), point);
//! ```

use crate::error::{AnimationError, Result};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;

/// Flat scalar components of an animatable value, in shape order
pub type Components = SmallVec<[f64; 4]>;

/// A value that can be animated
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Animatable {
    /// A single scalar
    Number(f64),
    /// A fixed-length list of scalars
    Array(Vec<f64>),
    /// Named fields, each animatable; field order is preserved
    Record(IndexMap<String, Animatable>),
}

impl Animatable {
    /// Build a record from `(name, value)` pairs
    pub fn record<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Animatable>,
        I: IntoIterator<Item = (K, V)>,
    {
        Animatable::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Animatable::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Animatable::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a record field
    pub fn field(&self, name: &str) -> Option<&Animatable> {
        match self {
            Animatable::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// The shape of this value
    pub fn shape(&self) -> Shape {
        Shape::of(self)
    }

    /// Scalar components in declared order
    pub fn components(&self) -> Components {
        let mut out = Components::new();
        self.push_components(&mut out);
        out
    }

    fn push_components(&self, out: &mut Components) {
        match self {
            Animatable::Number(n) => out.push(*n),
            Animatable::Array(items) => out.extend_from_slice(items),
            Animatable::Record(fields) => {
                for value in fields.values() {
                    value.push_components(out);
                }
            }
        }
    }
}

impl From<f64> for Animatable {
    fn from(value: f64) -> Self {
        Animatable::Number(value)
    }
}

impl From<f32> for Animatable {
    fn from(value: f32) -> Self {
        Animatable::Number(value as f64)
    }
}

impl From<Vec<f64>> for Animatable {
    fn from(value: Vec<f64>) -> Self {
        Animatable::Array(value)
    }
}

impl<const N: usize> From<[f64; N]> for Animatable {
    fn from(value: [f64; N]) -> Self {
        Animatable::Array(value.to_vec())
    }
}

impl From<IndexMap<String, Animatable>> for Animatable {
    fn from(value: IndexMap<String, Animatable>) -> Self {
        Animatable::Record(value)
    }
}

impl fmt::Display for Animatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Animatable::Number(n) => write!(f, "{n:.3}"),
            Animatable::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item:.3}")?;
                }
                write!(f, "]")
            }
            Animatable::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// The structure of an [`Animatable`], fixed for the lifetime of an animated value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Number,
    Array(usize),
    Record(Vec<(String, Shape)>),
}

impl Shape {
    /// Capture the shape of a value
    pub fn of(value: &Animatable) -> Self {
        match value {
            Animatable::Number(_) => Shape::Number,
            Animatable::Array(items) => Shape::Array(items.len()),
            Animatable::Record(fields) => Shape::Record(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Shape::of(value)))
                    .collect(),
            ),
        }
    }

    /// Number of scalar components
    pub fn len(&self) -> usize {
        match self {
            Shape::Number => 1,
            Shape::Array(len) => *len,
            Shape::Record(fields) => fields.iter().map(|(_, shape)| shape.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that `value` has this shape
    ///
    /// Record fields match by name, so a record with the same fields in a
    /// different order is accepted.
    pub fn check(&self, value: &Animatable) -> Result<()> {
        let mut scratch = Components::new();
        if self.collect(value, &mut scratch) {
            Ok(())
        } else {
            Err(self.mismatch(value))
        }
    }

    /// Flatten a value into its scalar components
    pub fn flatten(&self, value: &Animatable) -> Result<Components> {
        let mut out = Components::with_capacity(self.len());
        if self.collect(value, &mut out) {
            Ok(out)
        } else {
            Err(self.mismatch(value))
        }
    }

    /// Rebuild a value from scalar components
    ///
    /// Missing trailing components read as `0.0`.
    pub fn unflatten(&self, components: &[f64]) -> Animatable {
        let mut iter = components.iter().copied();
        self.build(&mut iter)
    }

    fn collect(&self, value: &Animatable, out: &mut Components) -> bool {
        match (self, value) {
            (Shape::Number, Animatable::Number(n)) => {
                out.push(*n);
                true
            }
            (Shape::Array(len), Animatable::Array(items)) if items.len() == *len => {
                out.extend_from_slice(items);
                true
            }
            (Shape::Record(fields), Animatable::Record(values)) if values.len() == fields.len() => {
                fields.iter().all(|(name, shape)| {
                    values
                        .get(name)
                        .is_some_and(|value| shape.collect(value, out))
                })
            }
            _ => false,
        }
    }

    fn build(&self, iter: &mut impl Iterator<Item = f64>) -> Animatable {
        match self {
            Shape::Number => Animatable::Number(iter.next().unwrap_or(0.0)),
            Shape::Array(len) => {
                Animatable::Array((0..*len).map(|_| iter.next().unwrap_or(0.0)).collect())
            }
            Shape::Record(fields) => Animatable::Record(
                fields
                    .iter()
                    .map(|(name, shape)| (name.clone(), shape.build(iter)))
                    .collect(),
            ),
        }
    }

    fn mismatch(&self, value: &Animatable) -> AnimationError {
        AnimationError::ShapeMismatch {
            expected: self.clone(),
            found: Shape::of(value),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Number => write!(f, "number"),
            Shape::Array(len) => write!(f, "array[{len}]"),
            Shape::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {shape}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
