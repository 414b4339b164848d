use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Opaque identifier of a custom formula, assigned by the dashboard's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormulaId(pub u64);

impl From<u64> for FormulaId {
    fn from(raw: u64) -> Self { Self(raw) }
}

/// How a formula's value is meant to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Currency,
    Percentage,
    #[default]
    Number,
}

/// A free-form project detail. Only details whose `raw_value` parses as a
/// number ever become variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailVariable {
    pub name: String,
    #[serde(rename = "value")]
    pub raw_value: String,
}

impl DetailVariable {
    pub fn new(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self { name: name.into(), raw_value: raw_value.into() }
    }
}

/// A user-authored formula. `expression` may reference details, tax rates,
/// overrides, and other formulas by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDefinition {
    pub id: FormulaId,
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub result_kind: ResultKind,
}

impl FormulaDefinition {
    pub fn new(id: u64, name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: FormulaId(id),
            name: name.into(),
            expression: expression.into(),
            result_kind: ResultKind::Number,
        }
    }

    pub fn with_kind(mut self, kind: ResultKind) -> Self {
        self.result_kind = kind;
        self
    }
}

/// A row of the tax-rate table. `rate` is in percentage units (2.1 means 2.1%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    pub county: String,
    #[serde(default)]
    pub state: Option<String>,
    pub rate: f64,
}

impl TaxRate {
    pub fn new(county: impl Into<String>, state: Option<&str>, rate: f64) -> Self {
        Self { county: county.into(), state: state.map(str::to_owned), rate }
    }

    /// `"{County} Tax Rate"`, or `"{County} ({State}) Tax Rate"` when a
    /// non-blank state is present.
    pub fn variable_name(&self) -> String {
        match self.state.as_deref().map(str::trim) {
            Some(state) if !state.is_empty() => format!("{} ({}) Tax Rate", self.county, state),
            _ => format!("{} Tax Rate", self.county),
        }
    }
}

/// Caller-injected values with top precedence (e.g. KPI inputs).
pub type Overrides = BTreeMap<String, f64>;

/// One immutable view of every variable source, supplied fresh for each call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub details: Vec<DetailVariable>,
    pub formulas: Vec<FormulaDefinition>,
    pub tax_rates: Vec<TaxRate>,
    pub overrides: Overrides,
}

impl Snapshot {
    pub fn new() -> Self { Self::default() }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_detail(mut self, name: &str, raw_value: &str) -> Self {
        self.details.push(DetailVariable::new(name, raw_value));
        self
    }

    pub fn with_formula(mut self, formula: FormulaDefinition) -> Self {
        self.formulas.push(formula);
        self
    }

    pub fn with_tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rates.push(rate);
        self
    }

    pub fn with_override(mut self, name: &str, value: f64) -> Self {
        self.overrides.insert(name.to_owned(), value);
        self
    }
}
