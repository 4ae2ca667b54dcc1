use serde::{Deserialize, Serialize};

use comptoir_core::Money;

use crate::{Sale, SaleItem};

/// Display percentages of a sale. Derived, never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRates {
    pub pay_rate: u8,
    pub deliv_rate: u8,
}

pub fn compute_rates(sale: &Sale) -> SaleRates {
    rates_of(sale.amount_paid(), sale.total_ttc(), sale.items())
}

pub(crate) fn rates_of(amount_paid: Money, total_ttc: Money, items: &[SaleItem]) -> SaleRates {
    let pay_rate = percent(amount_paid.amount().into(), total_ttc.amount().max(1).into());

    let (delivered, ordered) = items
        .iter()
        .filter(|i| !i.product.is_service())
        .fold((0u128, 0u128), |(d, q), i| {
            (d + u128::from(i.quantity_delivered), q + u128::from(i.quantity))
        });
    let deliv_rate = if ordered == 0 {
        100
    } else {
        // Both counts fit in i128 after the u64 sums.
        percent(delivered as i128, ordered as i128)
    };

    SaleRates { pay_rate, deliv_rate }
}

/// `round(num / den * 100)` half-up, clamped to `[0, 100]`. `den > 0`.
fn percent(num: i128, den: i128) -> u8 {
    let rounded = (num * 200 + den).div_euclid(den * 2);
    rounded.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use comptoir_inventory::StockItemId;

    use super::*;
    use crate::{ProductRef, ServiceId};

    fn stock(quantity: u64, delivered: u64) -> SaleItem {
        SaleItem {
            id: 1,
            product: ProductRef::Stock(StockItemId::generate()),
            quantity,
            unit_price: Money::new(100),
            quantity_delivered: delivered,
        }
    }

    fn service() -> SaleItem {
        SaleItem {
            id: 2,
            product: ProductRef::Service(ServiceId::new()),
            quantity: 3,
            unit_price: Money::new(100),
            quantity_delivered: 0,
        }
    }

    #[test]
    fn pay_rate_rounds_and_clamps() {
        let r = rates_of(Money::new(1), Money::new(3), &[]);
        assert_eq!(r.pay_rate, 33);
        let r = rates_of(Money::new(2), Money::new(3), &[]);
        assert_eq!(r.pay_rate, 67);
        let r = rates_of(Money::new(1), Money::new(200), &[]);
        assert_eq!(r.pay_rate, 1);
        let r = rates_of(Money::new(5), Money::ZERO, &[]);
        assert_eq!(r.pay_rate, 100);
        let r = rates_of(Money::ZERO, Money::ZERO, &[]);
        assert_eq!(r.pay_rate, 0);
    }

    #[test]
    fn deliv_rate_ignores_services() {
        let r = rates_of(Money::ZERO, Money::new(1), &[stock(10, 4), service()]);
        assert_eq!(r.deliv_rate, 40);
        let r = rates_of(Money::ZERO, Money::new(1), &[stock(3, 2)]);
        assert_eq!(r.deliv_rate, 67);
    }

    #[test]
    fn pure_service_sale_counts_as_delivered() {
        let r = rates_of(Money::ZERO, Money::new(1), &[service()]);
        assert_eq!(r.deliv_rate, 100);
    }

    #[test]
    fn rates_are_idempotent() {
        let items = [stock(7, 3), service()];
        let a = rates_of(Money::new(450), Money::new(1_000), &items);
        let b = rates_of(Money::new(450), Money::new(1_000), &items);
        assert_eq!(a, b);
        assert_eq!(a.pay_rate, 45);
    }
}
