use serde::{Deserialize, Serialize};

/// The two invoice flavours handled by the ledger.
///
/// A purchase invoice receives stock from a supplier; a sale invoice consumes
/// stock on behalf of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Purchase,
    Sale,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Purchase => "purchase",
            InvoiceKind::Sale => "sale",
        }
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            InvoiceKind::Purchase => "purchase invoice",
            InvoiceKind::Sale => "sale invoice",
        }
    }

    /// The ledger entry type recorded when money changes hands on this kind of invoice.
    pub fn payment_type(&self) -> PaymentType {
        match self {
            InvoiceKind::Purchase => PaymentType::SupplierPayment,
            InvoiceKind::Sale => PaymentType::CustomerPayment,
        }
    }
}

impl std::fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(InvoiceKind::Purchase),
            "sale" => Ok(InvoiceKind::Sale),
            other => Err(format!("unknown invoice kind: {other}")),
        }
    }
}

/// Type of a payment ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    SupplierPayment,
    CustomerPayment,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::SupplierPayment => "SUPPLIER_PAYMENT",
            PaymentType::CustomerPayment => "CUSTOMER_PAYMENT",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPPLIER_PAYMENT" => Ok(PaymentType::SupplierPayment),
            "CUSTOMER_PAYMENT" => Ok(PaymentType::CustomerPayment),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}
