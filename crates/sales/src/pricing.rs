use serde::{Deserialize, Serialize};

use comptoir_core::{DomainError, Money, TaxRate};

use crate::SaleItem;

/// Cart totals: tax applies once over the whole cart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal: Money,
    pub total_ttc: Money,
}

pub fn price_lines(items: &[SaleItem], tax_rate: TaxRate) -> Result<Pricing, DomainError> {
    let overflow = || DomainError::validation("sale total overflows");

    let mut subtotal = Money::ZERO;
    for item in items {
        let line = item.unit_price.checked_mul(item.quantity).ok_or_else(overflow)?;
        subtotal = subtotal.checked_add(line).ok_or_else(overflow)?;
    }
    let total_ttc = subtotal.with_tax(tax_rate).ok_or_else(overflow)?;

    Ok(Pricing { subtotal, total_ttc })
}
