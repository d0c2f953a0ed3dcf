//! Discount carried by a coupon

use std::fmt;
use std::io::Write;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;

/// Discount offered by a coupon. Percentage values are in (0, 100],
/// absolute values are an amount off in the shop currency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Discount {
    Percentage(f64),
    Absolute(f64),
}

/// Column representation of the discount tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
pub enum DiscountKind {
    Percentage,
    Absolute,
}

impl Discount {
    pub fn from_parts(kind: DiscountKind, value: f64) -> Self {
        match kind {
            DiscountKind::Percentage => Discount::Percentage(value),
            DiscountKind::Absolute => Discount::Absolute(value),
        }
    }

    pub fn into_parts(self) -> (DiscountKind, f64) {
        match self {
            Discount::Percentage(value) => (DiscountKind::Percentage, value),
            Discount::Absolute(value) => (DiscountKind::Absolute, value),
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Discount::Percentage(value) | Discount::Absolute(value) => value,
        }
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Discount::Percentage(value) => write!(f, "{}%", value),
            Discount::Absolute(value) => write!(f, "{:.2} off", value),
        }
    }
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Absolute => "absolute",
        }
    }
}

impl ToSql<Text, Pg> for DiscountKind {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for DiscountKind {
    fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_ref() {
            "percentage" => Ok(DiscountKind::Percentage),
            "absolute" => Ok(DiscountKind::Absolute),
            other => Err(format!("Unrecognized discount kind: {}", other).into()),
        }
    }
}
