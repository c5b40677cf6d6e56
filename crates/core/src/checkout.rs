//! Checkout rules: delivery address, coupons, delivery area and order quoting.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{PaymentMethod, Price};

/// Errors raised while validating a checkout.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("O carrinho está vazio")]
    EmptyCart,

    #[error("O valor mínimo do pedido é {min}")]
    BelowMinimum { min: Price },

    #[error("Infelizmente não entregamos no CEP {0}")]
    ZipcodeUnavailable(Zipcode),

    #[error("CEP inválido: {0}")]
    InvalidZipcode(String),

    #[error("Campo obrigatório: {0}")]
    MissingField(&'static str),

    #[error("Cupom inválido ou expirado")]
    InvalidCoupon,

    #[error("O valor para troco deve ser maior que o total do pedido")]
    InsufficientChange,
}

/// Brazilian postal code (CEP), normalized to `NNNNN-NNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zipcode(String);

impl Zipcode {
    /// Parse `01310-100` or `01310100`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidZipcode`] unless the input is eight
    /// digits, optionally with a dash after the fifth.
    pub fn parse(s: &str) -> Result<Self, CheckoutError> {
        let trimmed = s.trim();
        let digits: String = match trimmed.split_once('-') {
            Some((head, tail)) if head.len() == 5 && tail.len() == 3 => format!("{head}{tail}"),
            Some(_) => return Err(CheckoutError::InvalidZipcode(trimmed.to_owned())),
            None => trimmed.to_owned(),
        };

        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CheckoutError::InvalidZipcode(trimmed.to_owned()));
        }

        let (head, tail) = digits.split_at(5);
        Ok(Self(format!("{head}-{tail}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zipcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Zipcode {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Zipcode {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Zipcode> for String {
    fn from(zipcode: Zipcode) -> Self {
        zipcode.0
    }
}

/// Delivery address as entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub zipcode: Zipcode,
}

impl DeliveryAddress {
    /// Build an address from raw form fields, trimming values and rejecting
    /// missing required fields. An empty complement is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingField`] for the first empty required
    /// field, or [`CheckoutError::InvalidZipcode`].
    pub fn new(
        street: &str,
        number: &str,
        complement: Option<&str>,
        neighborhood: &str,
        city: &str,
        zipcode: &str,
    ) -> Result<Self, CheckoutError> {
        let required = |value: &str, field: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(CheckoutError::MissingField(field))
            } else {
                Ok(value.to_owned())
            }
        };

        let street = required(street, "endereço")?;
        let number = required(number, "número")?;
        let neighborhood = required(neighborhood, "bairro")?;
        let city = required(city, "cidade")?;
        if zipcode.trim().is_empty() {
            return Err(CheckoutError::MissingField("CEP"));
        }
        let zipcode = Zipcode::parse(zipcode)?;
        let complement = complement
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned);

        Ok(Self {
            street,
            number,
            complement,
            neighborhood,
            city,
            zipcode,
        })
    }

    /// Single-line address stored on the order.
    ///
    /// ```
    /// use hortifruti_core::checkout::DeliveryAddress;
    ///
    /// let address = DeliveryAddress::new(
    ///     "Rua das Frutas", "123", Some("Apto 4"), "Centro", "São Paulo", "01310100",
    /// ).unwrap();
    /// assert_eq!(
    ///     address.full_address(),
    ///     "Rua das Frutas, 123, Apto 4 - Centro, São Paulo - 01310-100"
    /// );
    /// ```
    #[must_use]
    pub fn full_address(&self) -> String {
        let complement = self
            .complement
            .as_deref()
            .map(|c| format!(", {c}"))
            .unwrap_or_default();
        format!(
            "{}, {}{} - {}, {} - {}",
            self.street, self.number, complement, self.neighborhood, self.city, self.zipcode
        )
    }
}

/// Promotional coupons accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Coupon {
    /// 10% off the subtotal.
    Frutas10,
    /// Free delivery.
    Frete,
    /// 20% off the subtotal for new customers.
    Novo20,
}

impl Coupon {
    pub const ALL: [Self; 3] = [Self::Frutas10, Self::Frete, Self::Novo20];

    /// Case-insensitive lookup by code.
    #[must_use]
    pub fn lookup(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|coupon| coupon.code().eq_ignore_ascii_case(code))
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Frutas10 => "FRUTAS10",
            Self::Frete => "FRETE",
            Self::Novo20 => "NOVO20",
        }
    }

    /// Message shown when the coupon is applied.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Frutas10 => "10% de desconto aplicado!",
            Self::Frete => "Frete grátis aplicado!",
            Self::Novo20 => "20% de desconto para novos clientes!",
        }
    }

    /// Percentage taken off the subtotal.
    #[must_use]
    pub const fn percent_off(&self) -> i32 {
        match self {
            Self::Frutas10 => 10,
            Self::Frete => 0,
            Self::Novo20 => 20,
        }
    }

    #[must_use]
    pub const fn waives_delivery(&self) -> bool {
        matches!(self, Self::Frete)
    }
}

impl fmt::Display for Coupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<String> for Coupon {
    type Error = CheckoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::lookup(&value).ok_or(CheckoutError::InvalidCoupon)
    }
}

impl From<Coupon> for String {
    fn from(coupon: Coupon) -> Self {
        coupon.code().to_owned()
    }
}

/// Zipcodes outside the delivery area.
pub const UNAVAILABLE_ZIPCODES: [&str; 3] = ["00000-000", "11111-111", "22222-222"];

/// Fees and limits applied when quoting an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRules {
    pub delivery_fee: Price,
    pub min_order_value: Price,
    pub unavailable_zipcodes: Vec<String>,
}

impl Default for StoreRules {
    fn default() -> Self {
        Self {
            delivery_fee: Price::from_cents(599),
            min_order_value: Price::from_cents(2000),
            unavailable_zipcodes: UNAVAILABLE_ZIPCODES.iter().map(|z| (*z).to_owned()).collect(),
        }
    }
}

impl StoreRules {
    #[must_use]
    pub fn delivers_to(&self, zipcode: &Zipcode) -> bool {
        !self
            .unavailable_zipcodes
            .iter()
            .any(|z| z == zipcode.as_str())
    }
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: Price,
    pub discount: Price,
    pub delivery_fee: Price,
    pub total: Price,
    pub coupon: Option<Coupon>,
    /// Minimum order value the quote was computed against.
    #[serde(skip)]
    min_order_value: Price,
}

impl Quote {
    /// Quote from `(unit price, quantity)` lines.
    ///
    /// `total = subtotal - discount + delivery_fee`, where the discount is
    /// the coupon percentage of the subtotal and `FRETE` zeroes the fee.
    #[must_use]
    pub fn compute(
        lines: impl IntoIterator<Item = (Price, i32)>,
        coupon: Option<Coupon>,
        rules: &StoreRules,
    ) -> Self {
        let subtotal: Price = lines
            .into_iter()
            .map(|(price, quantity)| price.times(quantity))
            .sum();

        let discount = coupon.map_or(Price::ZERO, |c| {
            subtotal.saturating_sub(subtotal.discounted_by(c.percent_off()))
        });
        let delivery_fee = if coupon.is_some_and(|c| c.waives_delivery()) {
            Price::ZERO
        } else {
            rules.delivery_fee
        };

        Self {
            subtotal,
            discount,
            delivery_fee,
            total: subtotal.saturating_sub(discount) + delivery_fee,
            coupon,
            min_order_value: rules.min_order_value,
        }
    }

    /// Validate the quote before placing the order.
    ///
    /// # Errors
    ///
    /// Rejects empty carts, subtotals below the store minimum and zipcodes
    /// outside the delivery area.
    pub fn check(&self, zipcode: &Zipcode, rules: &StoreRules) -> Result<(), CheckoutError> {
        if self.subtotal.is_zero() {
            return Err(CheckoutError::EmptyCart);
        }
        if self.subtotal < self.min_order_value {
            return Err(CheckoutError::BelowMinimum {
                min: self.min_order_value,
            });
        }
        if !rules.delivers_to(zipcode) {
            return Err(CheckoutError::ZipcodeUnavailable(zipcode.clone()));
        }
        Ok(())
    }

    /// How much more the customer needs to reach the minimum order value.
    #[must_use]
    pub fn missing_for_minimum(&self) -> Price {
        self.min_order_value.saturating_sub(self.subtotal)
    }
}

/// Payment method chosen at checkout, plus cash change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChoice {
    pub method: PaymentMethod,
    /// Amount the customer pays in cash, when change is needed.
    pub change_for: Option<Price>,
}

impl PaymentChoice {
    /// Cash change only applies to cash payments and is ignored otherwise.
    #[must_use]
    pub fn new(method: PaymentMethod, change_for: Option<Price>) -> Self {
        let change_for = match method {
            PaymentMethod::Cash => change_for.filter(|amount| !amount.is_zero()),
            _ => None,
        };
        Self { method, change_for }
    }

    /// Ensure the cash handed over covers the order total.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InsufficientChange`] when the change amount
    /// is below `total`.
    pub fn check(&self, total: Price) -> Result<(), CheckoutError> {
        match self.change_for {
            Some(amount) if amount < total => Err(CheckoutError::InsufficientChange),
            _ => Ok(()),
        }
    }

    /// Stored payment description, e.g. `money (Troco para R$ 50.00)`.
    #[must_use]
    pub fn description(&self) -> String {
        match self.change_for {
            Some(amount) => format!("{} (Troco para {amount})", self.method),
            None => self.method.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines() -> Vec<(Price, i32)> {
        // 2 kg de maçã + 3 alfaces = 11.98 + 8.97
        vec![(Price::from_cents(599), 2), (Price::from_cents(299), 3)]
    }

    #[test]
    fn test_zipcode_accepts_both_formats() {
        assert_eq!(Zipcode::parse("01310-100").unwrap().as_str(), "01310-100");
        assert_eq!(Zipcode::parse(" 01310100 ").unwrap().as_str(), "01310-100");
    }

    #[test]
    fn test_zipcode_rejects_malformed() {
        for bad in ["", "0131-0100", "1234567", "abcde-fgh", "013101000"] {
            assert!(Zipcode::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_full_address_without_complement() {
        let address =
            DeliveryAddress::new("Rua A", "10", Some("  "), "Centro", "Campinas", "13010-000")
                .unwrap();
        assert_eq!(address.complement, None);
        assert_eq!(address.full_address(), "Rua A, 10 - Centro, Campinas - 13010-000");
    }

    #[test]
    fn test_address_requires_fields() {
        let err = DeliveryAddress::new("", "10", None, "Centro", "Campinas", "13010-000");
        assert_eq!(err, Err(CheckoutError::MissingField("endereço")));
        let err = DeliveryAddress::new("Rua A", "10", None, "Centro", "Campinas", "");
        assert_eq!(err, Err(CheckoutError::MissingField("CEP")));
    }

    #[test]
    fn test_coupon_lookup_is_case_insensitive() {
        assert_eq!(Coupon::lookup("frutas10"), Some(Coupon::Frutas10));
        assert_eq!(Coupon::lookup(" Frete "), Some(Coupon::Frete));
        assert_eq!(Coupon::lookup("DESCONTO50"), None);
    }

    #[test]
    fn test_quote_without_coupon() {
        let quote = Quote::compute(lines(), None, &StoreRules::default());
        assert_eq!(quote.subtotal, Price::from_cents(2095));
        assert_eq!(quote.discount, Price::ZERO);
        assert_eq!(quote.delivery_fee, Price::from_cents(599));
        assert_eq!(quote.total, Price::from_cents(2694));
    }

    #[test]
    fn test_quote_with_percentage_coupon() {
        let quote = Quote::compute(lines(), Some(Coupon::Novo20), &StoreRules::default());
        assert_eq!(quote.discount, Price::from_cents(419));
        assert_eq!(quote.total, Price::from_cents(2095 - 419 + 599));
    }

    #[test]
    fn test_quote_with_free_delivery() {
        let quote = Quote::compute(lines(), Some(Coupon::Frete), &StoreRules::default());
        assert_eq!(quote.discount, Price::ZERO);
        assert_eq!(quote.delivery_fee, Price::ZERO);
        assert_eq!(quote.total, quote.subtotal);
    }

    #[test]
    fn test_check_rejects_empty_cart() {
        let rules = StoreRules::default();
        let quote = Quote::compute(Vec::new(), None, &rules);
        let zip = Zipcode::parse("01310-100").unwrap();
        assert_eq!(quote.check(&zip, &rules), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_check_rejects_below_minimum() {
        let rules = StoreRules::default();
        let quote = Quote::compute(vec![(Price::from_cents(599), 1)], None, &rules);
        let zip = Zipcode::parse("01310-100").unwrap();
        assert!(matches!(
            quote.check(&zip, &rules),
            Err(CheckoutError::BelowMinimum { .. })
        ));
        assert_eq!(quote.missing_for_minimum(), Price::from_cents(1401));
    }

    #[test]
    fn test_check_rejects_unavailable_zipcode() {
        let rules = StoreRules::default();
        let quote = Quote::compute(lines(), None, &rules);
        let zip = Zipcode::parse("11111111").unwrap();
        assert!(matches!(
            quote.check(&zip, &rules),
            Err(CheckoutError::ZipcodeUnavailable(_))
        ));
        assert!(quote.check(&Zipcode::parse("01310-100").unwrap(), &rules).is_ok());
    }

    #[test]
    fn test_payment_description_with_change() {
        let cash = PaymentChoice::new(PaymentMethod::Cash, Some(Price::from_cents(5000)));
        assert_eq!(cash.description(), "money (Troco para R$ 50.00)");

        let pix = PaymentChoice::new(PaymentMethod::Pix, Some(Price::from_cents(5000)));
        assert_eq!(pix.change_for, None);
        assert_eq!(pix.description(), "pix");
    }

    #[test]
    fn test_change_must_cover_total() {
        let cash = PaymentChoice::new(PaymentMethod::Cash, Some(Price::from_cents(2000)));
        assert_eq!(
            cash.check(Price::from_cents(2694)),
            Err(CheckoutError::InsufficientChange)
        );
        assert!(cash.check(Price::from_cents(1500)).is_ok());
    }
}
