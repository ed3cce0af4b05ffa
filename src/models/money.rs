use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency-tagged decimal amount.
///
/// Monetary values are always `Decimal`, never floats, so that sums and
/// comparisons are exact across parsing, persistence, and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<Currency>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<Currency>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn abs(&self) -> Money {
        Money::new(self.amount.abs(), self.currency)
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// ISO-4217-ish currency code. Stored uppercase; comparisons are
/// case-insensitive at construction time so `"usd"` and `"USD"` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency([u8; 3]);

impl Currency {
    pub fn new(code: &str) -> Self {
        let upper = code.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        let mut buf = [b'?'; 3];
        for (i, b) in bytes.iter().take(3).enumerate() {
            buf[i] = *b;
        }
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    pub const USD: Currency = Currency(*b"USD");
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Currency::new(value)
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Currency::new(&value)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
