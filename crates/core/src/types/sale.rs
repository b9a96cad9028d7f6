//! Sale records for the spreadsheet ledger.
//!
//! [`SaleInput`] holds what staff type in. [`SaleFigures`] is a pure function
//! of the four numeric inputs, and [`SaleRecord`] computes it on
//! construction, so the derived amounts can never drift from their inputs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};

use super::id::SaleId;
use super::staff::StaffMember;

/// Sale validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// A required text field is blank.
    #[error("{0} is required.")]
    MissingField(&'static str),
    /// Quantity must be at least one.
    #[error("Quantity must be at least 1.")]
    ZeroQuantity,
    /// A money amount is negative.
    #[error("{0} cannot be negative.")]
    NegativeAmount(&'static str),
    /// The discount is larger than the subtotal.
    #[error("Discount cannot exceed the subtotal.")]
    DiscountExceedsSubtotal,
    /// The amounts are too large to compute.
    #[error("Amounts are too large to compute.")]
    AmountOutOfRange,
}

/// Fields entered on the sale form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaleInput {
    pub client: String,
    pub contact: String,
    pub client_type: String,
    pub product: String,
    pub product_code: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total_cost: Decimal,
    pub payment_method: String,
    pub notes: String,
}

/// Amounts derived from a [`SaleInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFigures {
    pub subtotal: Decimal,
    pub total: Decimal,
    pub profit: Decimal,
}

impl SaleFigures {
    /// `subtotal = quantity × unit_price`, `total = subtotal − discount`,
    /// `profit = total − total_cost`.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::AmountOutOfRange`] if any step overflows.
    pub fn compute(input: &SaleInput) -> Result<Self, SaleError> {
        let subtotal = Decimal::from(input.quantity)
            .checked_mul(input.unit_price)
            .ok_or(SaleError::AmountOutOfRange)?;
        let total = subtotal
            .checked_sub(input.discount)
            .ok_or(SaleError::AmountOutOfRange)?;
        let profit = total
            .checked_sub(input.total_cost)
            .ok_or(SaleError::AmountOutOfRange)?;
        Ok(Self {
            subtotal,
            total,
            profit,
        })
    }
}

impl SaleInput {
    /// Derived amounts for the current field values.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::AmountOutOfRange`] if the amounts overflow.
    pub fn figures(&self) -> Result<SaleFigures, SaleError> {
        SaleFigures::compute(self)
    }

    /// Check the form before it is recorded.
    ///
    /// # Errors
    ///
    /// Returns the first rule that fails.
    pub fn validate(&self) -> Result<(), SaleError> {
        if self.client.trim().is_empty() {
            return Err(SaleError::MissingField("Client"));
        }
        if self.product.trim().is_empty() {
            return Err(SaleError::MissingField("Product"));
        }
        if self.quantity == 0 {
            return Err(SaleError::ZeroQuantity);
        }
        for (label, amount) in [
            ("Unit price", self.unit_price),
            ("Discount", self.discount),
            ("Total cost", self.total_cost),
        ] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(SaleError::NegativeAmount(label));
            }
        }
        if self.discount > self.figures()?.subtotal {
            return Err(SaleError::DiscountExceedsSubtotal);
        }
        Ok(())
    }
}

/// A validated sale, ready for the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    id: SaleId,
    input: SaleInput,
    figures: SaleFigures,
    staff: String,
    recorded_at: DateTime<Utc>,
}

impl SaleRecord {
    /// Validate the input and compute the derived amounts.
    ///
    /// # Errors
    ///
    /// Returns a [`SaleError`] if the input fails validation.
    pub fn new(
        input: SaleInput,
        staff: &StaffMember,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, SaleError> {
        input.validate()?;
        let figures = input.figures()?;
        Ok(Self {
            id: SaleId::generate(),
            input,
            figures,
            staff: staff.name.clone(),
            recorded_at,
        })
    }

    /// Idempotency key for the ledger submission.
    #[must_use]
    pub const fn id(&self) -> SaleId {
        self.id
    }

    /// Entered fields.
    #[must_use]
    pub const fn input(&self) -> &SaleInput {
        &self.input
    }

    /// Derived amounts.
    #[must_use]
    pub const fn figures(&self) -> SaleFigures {
        self.figures
    }

    /// Staff member who received the sale.
    #[must_use]
    pub fn staff(&self) -> &str {
        &self.staff
    }

    /// When the record was created.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

fn as_number<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(amount.to_f64().unwrap_or_default())
}

/// One ledger row, keyed by the spreadsheet's column names.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerRow<'a> {
    sale_id: SaleId,
    fecha: String,
    cliente: &'a str,
    contacto: &'a str,
    tipo_cliente: &'a str,
    producto: &'a str,
    codigo: &'a str,
    categoria: &'a str,
    cantidad: u32,
    #[serde(serialize_with = "as_number")]
    precio_unitario: Decimal,
    #[serde(serialize_with = "as_number")]
    subtotal: Decimal,
    #[serde(serialize_with = "as_number")]
    descuento: Decimal,
    #[serde(serialize_with = "as_number")]
    total: Decimal,
    #[serde(serialize_with = "as_number")]
    costo_total: Decimal,
    #[serde(serialize_with = "as_number")]
    ganancia: Decimal,
    metodo_pago: &'a str,
    observaciones: &'a str,
    recibe_venta: &'a str,
}

impl Serialize for SaleRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let input = &self.input;
        LedgerRow {
            sale_id: self.id,
            fecha: self.recorded_at.to_rfc3339(),
            cliente: input.client.trim(),
            contacto: input.contact.trim(),
            tipo_cliente: input.client_type.trim(),
            producto: input.product.trim(),
            codigo: input.product_code.trim(),
            categoria: input.category.trim(),
            cantidad: input.quantity,
            precio_unitario: input.unit_price,
            subtotal: self.figures.subtotal,
            descuento: input.discount,
            total: self.figures.total,
            costo_total: input.total_cost,
            ganancia: self.figures.profit,
            metodo_pago: input.payment_method.trim(),
            observaciones: input.notes.trim(),
            recibe_venta: &self.staff,
        }
        .serialize(serializer)
    }
}
