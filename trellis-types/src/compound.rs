//! Compound type expressions: one or more type tokens joined with `|`.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::TypeError;
use crate::types::{ColumnType, ValueType};
use crate::Value;

/// One alternative inside a compound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberType {
    Value(ValueType),
    Column(ColumnType),
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::Value(vt) => vt.as_str(),
            MemberType::Column(ct) => ct.as_str(),
        }
    }
}

/// A parsed `|`-joined type expression such as `FLOAT|INT` or
/// `INT_COLUMN|FLOAT_COLUMN`.
///
/// Member order is preserved because literal casting tries members in
/// declaration order, but equality and hashing ignore it: `INT|FLOAT` and
/// `FLOAT|INT` name the same set of alternatives.
#[derive(Debug, Clone)]
pub struct CompoundType {
    members: Vec<MemberType>,
    declared: String,
}

impl CompoundType {
    /// Parses a type token expression. All tokens must be known, distinct,
    /// and drawn from a single family (all scalar or all column).
    pub fn parse(declared: &str) -> Result<Self, TypeError> {
        let mut members = Vec::new();
        for token in declared.split('|') {
            let member = if let Some(vt) = ValueType::parse(token) {
                MemberType::Value(vt)
            } else if let Some(ct) = ColumnType::parse(token) {
                MemberType::Column(ct)
            } else {
                return Err(TypeError::UnknownType {
                    token: token.to_string(),
                });
            };
            if members.contains(&member) {
                return Err(TypeError::DuplicateTypeToken {
                    declared: declared.to_string(),
                    token: token.to_string(),
                });
            }
            members.push(member);
        }
        let has_value = members.iter().any(|m| matches!(m, MemberType::Value(_)));
        let has_column = members.iter().any(|m| matches!(m, MemberType::Column(_)));
        if has_value && has_column {
            return Err(TypeError::MixedTypeFamilies {
                declared: declared.to_string(),
            });
        }
        Ok(CompoundType {
            members,
            declared: declared.to_string(),
        })
    }

    pub fn single_value(vt: ValueType) -> Self {
        CompoundType {
            members: vec![MemberType::Value(vt)],
            declared: vt.as_str().to_string(),
        }
    }

    pub fn single_column(ct: ColumnType) -> Self {
        CompoundType {
            members: vec![MemberType::Column(ct)],
            declared: ct.as_str().to_string(),
        }
    }

    pub fn members(&self) -> &[MemberType] {
        &self.members
    }

    pub fn is_scalar_only(&self) -> bool {
        self.members.iter().all(|m| matches!(m, MemberType::Value(_)))
    }

    pub fn is_column_only(&self) -> bool {
        self.members.iter().all(|m| matches!(m, MemberType::Column(_)))
    }

    /// The single scalar member, if this compound is exactly one scalar token.
    pub fn as_single_value_type(&self) -> Option<ValueType> {
        match self.members.as_slice() {
            [MemberType::Value(vt)] => Some(*vt),
            _ => None,
        }
    }

    pub fn supports_value_type(&self, vt: ValueType) -> bool {
        self.members.contains(&MemberType::Value(vt))
    }

    pub fn supports_column_type(&self, ct: ColumnType) -> bool {
        self.members.contains(&MemberType::Column(ct))
    }

    /// Casts a scalar literal against the compound.
    ///
    /// Two passes over the members in declaration order: first exact scalar
    /// matches, then the INT-to-FLOAT widening. `FLOAT|INT` therefore keeps
    /// an int literal as INT, while a bare `FLOAT` widens it.
    pub fn cast_value(&self, value: &Value) -> Option<Value> {
        let literal = ValueType::of_value(value)?;
        for member in &self.members {
            if let MemberType::Value(vt) = member {
                if *vt == literal {
                    return vt.cast_value(value);
                }
            }
        }
        for member in &self.members {
            if let MemberType::Value(vt) = member {
                if *vt == ValueType::Float && literal == ValueType::Int {
                    return vt.cast_value(value);
                }
            }
        }
        None
    }
}

impl PartialEq for CompoundType {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.members.clone();
        let mut b = other.members.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl Eq for CompoundType {}

impl Hash for CompoundType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sorted = self.members.clone();
        sorted.sort();
        sorted.hash(state);
    }
}

impl fmt::Display for CompoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declared)
    }
}
