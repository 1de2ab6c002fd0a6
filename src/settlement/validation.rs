//! Order validation
//!
//! Runs before the guard: a rejected order has no side effects at all.

use super::error::ValidationError;
use super::types::{SettlementOrder, ValidOrder};
use crate::market::ItemSnapshot;

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Check required fields in a fixed order and name the first one missing.
/// The seller id is not required here: a seller without one still gets the
/// sale recorded, only the stats credit fails.
pub fn validate(order: SettlementOrder) -> Result<ValidOrder, ValidationError> {
    if order.listing_id.is_blank() {
        return Err(ValidationError::missing("listing_id"));
    }
    if blank(&order.item_name) {
        return Err(ValidationError::missing("item.name"));
    }
    let Some(price) = order.price else {
        return Err(ValidationError::missing("item.price"));
    };
    if blank(&order.seller.email) {
        return Err(ValidationError::missing("seller.email"));
    }
    if blank(&order.seller.name) {
        return Err(ValidationError::missing("seller.name"));
    }
    if order.buyer.id.is_blank() {
        return Err(ValidationError::missing("buyer.id"));
    }
    if blank(&order.buyer.name) {
        return Err(ValidationError::missing("buyer.name"));
    }
    if blank(&order.buyer.email) {
        return Err(ValidationError::missing("buyer.email"));
    }

    Ok(ValidOrder {
        listing_id: order.listing_id,
        item: ItemSnapshot {
            name: order.item_name,
            category: order.category,
            price,
            description: order.description,
            picture: order.picture,
        },
        school: order.school,
        seller: order.seller,
        buyer: order.buyer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Category, Identity, ListingId, School};
    use crate::money::Price;

    fn order() -> SettlementOrder {
        SettlementOrder {
            listing_id: ListingId::from("l1"),
            item_name: "Desk chair".to_string(),
            category: Category::DormStuff,
            price: Some(Price::parse("20").unwrap()),
            description: String::new(),
            picture: None,
            school: School::new(School::DUKE),
            seller: Identity::new("s1", "Sam", "sam@duke.edu"),
            buyer: Identity::new("b1", "Bea", "bea@duke.edu"),
        }
    }

    #[test]
    fn test_valid_order_passes() {
        let valid = validate(order()).unwrap();
        assert_eq!(valid.listing_id().as_str(), "l1");
        assert_eq!(valid.item().name, "Desk chair");
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let cases: [(&str, fn(&mut SettlementOrder)); 8] = [
            ("listing_id", |o| o.listing_id = ListingId::from("")),
            ("item.name", |o| o.item_name = "   ".to_string()),
            ("item.price", |o| o.price = None),
            ("seller.email", |o| o.seller.email = String::new()),
            ("seller.name", |o| o.seller.name = "\t".to_string()),
            ("buyer.id", |o| o.buyer.id = "".into()),
            ("buyer.name", |o| o.buyer.name = String::new()),
            ("buyer.email", |o| o.buyer.email = " ".to_string()),
        ];

        for (field, mutate) in cases {
            let mut o = order();
            mutate(&mut o);
            assert_eq!(validate(o), Err(ValidationError::missing(field)), "{}", field);
        }
    }

    #[test]
    fn test_first_missing_field_wins() {
        let mut o = order();
        o.seller.email = String::new();
        o.buyer.email = String::new();
        assert_eq!(validate(o), Err(ValidationError::missing("seller.email")));
    }

    #[test]
    fn test_blank_seller_id_is_allowed() {
        let mut o = order();
        o.seller.id = "".into();
        assert!(validate(o).is_ok());
    }

    #[test]
    fn test_zero_price_is_allowed() {
        let mut o = order();
        o.price = Some(Price::ZERO);
        assert_eq!(validate(o).unwrap().price(), Price::ZERO);
    }
}
