use std::fmt;
use std::str::FromStr;

use crate::error::{LookoutError, Result};

/// The scope a condition's field is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Host,
    Container,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Host => write!(f, "host"),
            Scope::Container => write!(f, "container"),
        }
    }
}

impl FromStr for Scope {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "host" => Ok(Scope::Host),
            "container" => Ok(Scope::Container),
            other => Err(LookoutError::InvalidCondition(format!(
                "unknown scope {other:?}"
            ))),
        }
    }
}

/// The fixed, per-scope set of recognized fields.
///
/// `DiskPercent` is the one field that fans out per-mountpoint at evaluation time even
/// though it is carried in the `host` scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CpuPercent,
    MemPercent,
    DiskPercent,
    LoadAvg1,
    State,
    Health,
    RestartCount,
}

impl Field {
    /// Whether this field only accepts string comparisons (`==`/`!=`).
    pub fn is_string_field(&self) -> bool {
        matches!(self, Field::State | Field::Health)
    }

    fn parse_for_scope(scope: Scope, s: &str) -> Result<Self> {
        let field = match s {
            "cpu_percent" => Field::CpuPercent,
            "mem_percent" => Field::MemPercent,
            "disk_percent" => Field::DiskPercent,
            "load1" => Field::LoadAvg1,
            "state" => Field::State,
            "health" => Field::Health,
            "restart_count" => Field::RestartCount,
            other => {
                return Err(LookoutError::InvalidCondition(format!(
                    "unknown field {other:?}"
                )))
            }
        };

        let valid_for_scope = match scope {
            Scope::Host => matches!(
                field,
                Field::CpuPercent | Field::MemPercent | Field::DiskPercent | Field::LoadAvg1
            ),
            Scope::Container => matches!(
                field,
                Field::CpuPercent
                    | Field::MemPercent
                    | Field::State
                    | Field::Health
                    | Field::RestartCount
            ),
        };

        if !valid_for_scope {
            return Err(LookoutError::InvalidCondition(format!(
                "field {s:?} is not valid for scope {scope}"
            )));
        }

        Ok(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::CpuPercent => "cpu_percent",
            Field::MemPercent => "mem_percent",
            Field::DiskPercent => "disk_percent",
            Field::LoadAvg1 => "load1",
            Field::State => "state",
            Field::Health => "health",
            Field::RestartCount => "restart_count",
        };
        write!(f, "{s}")
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
}

impl Op {
    fn is_equality(&self) -> bool {
        matches!(self, Op::Eq | Op::Ne)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Gte => ">=",
            Op::Lte => "<=",
            Op::Eq => "==",
            Op::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Op {
    type Err = LookoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ">" => Ok(Op::Gt),
            "<" => Ok(Op::Lt),
            ">=" => Ok(Op::Gte),
            "<=" => Ok(Op::Lte),
            "==" => Ok(Op::Eq),
            "!=" => Ok(Op::Ne),
            other => Err(LookoutError::InvalidCondition(format!(
                "unknown operator {other:?}"
            ))),
        }
    }
}

/// The value side of a condition: exactly one of a number or a string.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Num(f64),
    Str(String),
}

/// A parsed, typed predicate: `scope.field OP value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub scope: Scope,
    pub field: Field,
    pub op: Op,
    pub value: ConditionValue,
}

impl Condition {
    /// Parse the three-token condition grammar: `scope.field OP value`.
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(LookoutError::InvalidCondition(format!(
                "expected 3 tokens, got {}: {expr:?}",
                tokens.len()
            )));
        }

        let (scope_str, field_str) = tokens[0]
            .split_once('.')
            .ok_or_else(|| LookoutError::InvalidCondition(format!("missing '.' in {:?}", tokens[0])))?;
        let scope: Scope = scope_str.parse()?;
        let field = Field::parse_for_scope(scope, field_str)?;
        let op: Op = tokens[1].parse()?;

        let value_tok = tokens[2];
        let value = if let Some(inner) = value_tok
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
        {
            ConditionValue::Str(inner.to_string())
        } else {
            let n: f64 = value_tok.parse().map_err(|_| {
                LookoutError::InvalidCondition(format!("invalid numeric literal {value_tok:?}"))
            })?;
            ConditionValue::Num(n)
        };

        if field.is_string_field() {
            if !matches!(value, ConditionValue::Str(_)) {
                return Err(LookoutError::InvalidCondition(format!(
                    "field {field} requires a string literal"
                )));
            }
            if !op.is_equality() {
                return Err(LookoutError::InvalidCondition(format!(
                    "field {field} only supports == and !="
                )));
            }
        } else if !matches!(value, ConditionValue::Num(_)) {
            return Err(LookoutError::InvalidCondition(format!(
                "field {field} requires a numeric literal"
            )));
        }

        Ok(Condition {
            scope,
            field,
            op,
            value,
        })
    }

    /// Render back to canonical `scope.field OP value` text. Reparsing this text must
    /// produce an equal `Condition`.
    pub fn render(&self) -> String {
        let value = match &self.value {
            ConditionValue::Num(n) => format_number(*n),
            ConditionValue::Str(s) => format!("'{s}'"),
        };
        format!("{}.{} {} {}", self.scope, self.field, self.op, value)
    }

    /// Evaluate a numeric sample against this condition. Panics if the condition is string-typed.
    pub fn evaluate_num(&self, sample: f64) -> bool {
        let threshold = match self.value {
            ConditionValue::Num(n) => n,
            ConditionValue::Str(_) => {
                unreachable!("evaluate_num called on a string-typed condition")
            }
        };
        match self.op {
            Op::Gt => sample > threshold,
            Op::Lt => sample < threshold,
            Op::Gte => sample >= threshold,
            Op::Lte => sample <= threshold,
            Op::Eq => sample == threshold,
            Op::Ne => sample != threshold,
        }
    }

    /// Evaluate a string sample against this condition. Panics if the condition is numeric.
    pub fn evaluate_str(&self, sample: &str) -> bool {
        let expected = match &self.value {
            ConditionValue::Str(s) => s.as_str(),
            ConditionValue::Num(_) => {
                unreachable!("evaluate_str called on a numeric-typed condition")
            }
        };
        match self.op {
            Op::Eq => sample == expected,
            Op::Ne => sample != expected,
            _ => unreachable!("string fields only admit == and !="),
        }
    }
}

/// Render a float without a trailing `.0` for whole numbers, matching how a human would write
/// a threshold in config.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{n}");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_condition() {
        let c = Condition::parse("host.cpu_percent > 90").unwrap();
        assert_eq!(c.scope, Scope::Host);
        assert_eq!(c.field, Field::CpuPercent);
        assert_eq!(c.op, Op::Gt);
        assert_eq!(c.value, ConditionValue::Num(90.0));
        assert!(c.evaluate_num(95.0));
        assert!(!c.evaluate_num(50.0));
    }

    #[test]
    fn parses_string_condition() {
        let c = Condition::parse("container.state == 'exited'").unwrap();
        assert_eq!(c.scope, Scope::Container);
        assert_eq!(c.field, Field::State);
        assert!(c.evaluate_str("exited"));
        assert!(!c.evaluate_str("running"));
    }

    #[test]
    fn rejects_string_field_with_inequality_operator() {
        assert!(Condition::parse("container.state > 'exited'").is_err());
    }

    #[test]
    fn rejects_numeric_field_with_string_value() {
        assert!(Condition::parse("host.cpu_percent > 'high'").is_err());
    }

    #[test]
    fn rejects_field_not_valid_for_scope() {
        assert!(Condition::parse("host.state == 'down'").is_err());
    }

    #[test]
    fn round_trips_through_render() {
        let exprs = [
            "host.cpu_percent > 90",
            "host.disk_percent >= 80",
            "container.state == 'exited'",
            "container.health != 'healthy'",
        ];
        for expr in exprs {
            let parsed = Condition::parse(expr).unwrap();
            let rendered = parsed.render();
            let reparsed = Condition::parse(&rendered).unwrap();
            assert_eq!(parsed, reparsed, "round-trip mismatch for {expr:?}");
        }
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(Condition::parse("host.cpu_percent > 90 extra").is_err());
        assert!(Condition::parse("host.cpu_percent90").is_err());
    }
}
