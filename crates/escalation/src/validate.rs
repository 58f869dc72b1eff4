use std::fmt;

use serde::{Deserialize, Serialize};

use crate::severity::SignalInputs;

/// Allowed ranges for decision inputs. A decision whose inputs fall outside
/// these bounds is aborted rather than applied, and the abort is itself
/// recorded in the decision chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputBounds {
    pub anomaly_max: f64,
    pub pressure_max: f64,
    pub severity_max: f64,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            anomaly_max: 1.0e6,
            pressure_max: 1.0e6,
            severity_max: 1.0e6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Violation {
    NonFinite { field: &'static str, value: f64 },
    OutOfBounds { field: &'static str, value: f64, min: f64, max: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { field, value } => {
                write!(f, "{} is not finite: {}", field, value)
            }
            Self::OutOfBounds { field, value, min, max } => {
                write!(f, "{} = {} outside [{}, {}]", field, value, min, max)
            }
        }
    }
}

fn check(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), Violation> {
    if !value.is_finite() {
        return Err(Violation::NonFinite { field, value });
    }
    if value < min || value > max {
        return Err(Violation::OutOfBounds { field, value, min, max });
    }
    Ok(())
}

/// Validate all numeric decision inputs. Quorum and integrity are signals in
/// [0, 1]; anomaly and pressure are non-negative and bounded by config.
pub fn validate_inputs(inputs: &SignalInputs, bounds: &InputBounds) -> Result<(), Violation> {
    check("anomaly", inputs.anomaly, 0.0, bounds.anomaly_max)?;
    check("quorum", inputs.quorum, 0.0, 1.0)?;
    check("integrity", inputs.integrity, 0.0, 1.0)?;
    check("pressure", inputs.pressure, 0.0, bounds.pressure_max)?;
    Ok(())
}

pub fn validate_severity(severity: f64, bounds: &InputBounds) -> Result<(), Violation> {
    check("severity", severity, 0.0, bounds.severity_max)
}
