//! Strongly typed identifiers shared by models, repos and services.
//! Every newtype maps transparently onto its postgres column type and
//! serializes as the inner value.

use std::fmt;
use std::io::Write;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Integer, Text};

macro_rules! integer_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
        #[sql_type = "Integer"]
        pub struct $name(pub i32);

        impl ToSql<Integer, Pg> for $name {
            fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
                <i32 as ToSql<Integer, Pg>>::to_sql(&self.0, out)
            }
        }

        impl FromSql<Integer, Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
                <i32 as FromSql<Integer, Pg>>::from_sql(bytes).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                $name(value)
            }
        }
    };
}

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
        #[sql_type = "Text"]
        pub struct $name(pub String);

        impl ToSql<Text, Pg> for $name {
            fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.0.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
                <String as FromSql<Text, Pg>>::from_sql(bytes).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl<'a> From<&'a str> for $name {
            fn from(value: &'a str) -> Self {
                $name(value.to_string())
            }
        }
    };
}

integer_newtype!(CouponId);
integer_newtype!(ClaimId);
integer_newtype!(UserId);
integer_newtype!(DistributionOrder);
integer_newtype!(RoleId);

string_newtype!(CouponCode);
string_newtype!(SessionMarker);

impl CouponCode {
    /// Codes are stored and compared upper-cased.
    pub fn normalized(&self) -> CouponCode {
        CouponCode(self.0.trim().to_uppercase())
    }
}

impl DistributionOrder {
    pub fn first() -> Self {
        DistributionOrder(1)
    }

    pub fn next(self) -> Self {
        DistributionOrder(self.0 + 1)
    }
}

/// Roles an account can hold in the coupons service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "lowercase")]
pub enum CouponsRole {
    Superuser,
    User,
}

impl CouponsRole {
    pub fn as_str(&self) -> &'static str {
        match *self {
            CouponsRole::Superuser => "superuser",
            CouponsRole::User => "user",
        }
    }
}

impl ToSql<Text, Pg> for CouponsRole {
    fn to_sql<W: Write>(&self, out: &mut Output<W, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for CouponsRole {
    fn from_sql(bytes: Option<&[u8]>) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_ref() {
            "superuser" => Ok(CouponsRole::Superuser),
            "user" => Ok(CouponsRole::User),
            other => Err(format!("Unrecognized role: {}", other).into()),
        }
    }
}

impl fmt::Display for CouponsRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
