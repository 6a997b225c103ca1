use crate::error::FlowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies the wallet can pay out in, with the locale conventions used to
/// read and print amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Brl,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
            Currency::Usd => "USD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Brl => "R$",
            Currency::Usd => "$",
        }
    }

    pub fn decimal_separator(&self) -> char {
        match self {
            Currency::Brl => ',',
            Currency::Usd => '.',
        }
    }

    /// Number of fraction digits in the smallest unit of the currency.
    pub fn minor_units(&self) -> u32 {
        match self {
            Currency::Brl | Currency::Usd => 2,
        }
    }

    pub fn grouping_separator(&self) -> char {
        match self {
            Currency::Brl => '.',
            Currency::Usd => ',',
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Funds available to the operator, as reported by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Whether this balance can pay for `amount`.
    pub fn covers(&self, amount: Amount) -> bool {
        amount.value() <= self.0
    }
}

/// A strictly positive monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, FlowError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(FlowError::InvalidAmount(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Parses operator input using the separators of `currency`.
    ///
    /// An optional currency symbol is accepted. When the input contains the
    /// locale decimal separator, grouping separators are dropped; otherwise
    /// the input is read with `.` as the decimal point. Amounts finer than
    /// the currency's minor unit are rejected.
    pub fn parse(input: &str, currency: Currency) -> Result<Self, FlowError> {
        let trimmed = input.trim();
        let unprefixed = trimmed
            .strip_prefix(currency.symbol())
            .unwrap_or(trimmed)
            .trim();
        if unprefixed.is_empty() {
            return Err(FlowError::InvalidAmount("amount is empty".to_string()));
        }

        let decimal = currency.decimal_separator();
        let grouping = currency.grouping_separator();
        let normalized: String = if unprefixed.contains(decimal) {
            if unprefixed.matches(decimal).count() > 1 {
                return Err(invalid(input));
            }
            unprefixed
                .chars()
                .filter(|c| *c != grouping)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        } else if grouping == ',' {
            unprefixed.chars().filter(|c| *c != ',').collect()
        } else {
            unprefixed.to_string()
        };

        let well_formed = normalized
            .char_indices()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (c == '-' && i == 0));
        if !well_formed {
            return Err(invalid(input));
        }

        let value = Decimal::from_str(&normalized)
            .map_err(|_| invalid(input))?
            .normalize();
        if value.scale() > currency.minor_units() {
            return Err(FlowError::InvalidAmount(format!(
                "'{}' has more than {} decimal places",
                input.trim(),
                currency.minor_units()
            )));
        }
        Self::new(value)
    }

    /// Formats the amount the way the operator reads it, e.g. `R$ 1.234,56`.
    pub fn format(&self, currency: Currency) -> String {
        format_money(self.0, currency)
    }
}

fn invalid(input: &str) -> FlowError {
    FlowError::InvalidAmount(format!("'{}' is not a number", input.trim()))
}

impl TryFrom<Decimal> for Amount {
    type Error = FlowError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Renders `value` with the currency symbol, grouping and two fraction digits.
pub fn format_money(value: Decimal, currency: Currency) -> String {
    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((&digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(currency.grouping_separator());
        }
        grouped.push(c);
    }

    format!(
        "{}{} {}{}{}",
        sign,
        currency.symbol(),
        grouped,
        currency.decimal_separator(),
        frac_part
    )
}
