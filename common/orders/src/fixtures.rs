use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::model::{BuyerProfile, Variant};

/// Catalog variant with a list price and stock level.
pub fn variant(variant_id: i64, price: &str, quantity_available: i32) -> Variant {
    Variant {
        variant_id,
        size: "M".into(),
        quantity_available,
        color_id: variant_id * 10,
        slug: format!("tee-{variant_id}"),
        title: format!("Футболка {variant_id}"),
        label: "Black".into(),
        hex: "#000000".into(),
        product_id: format!("P{variant_id}"),
        price: BigDecimal::from_str(price).unwrap_or_default(),
        discount_price: None,
        currency: "RUB".into(),
        weight_grams: Some(300),
    }
}

pub fn buyer() -> BuyerProfile {
    BuyerProfile {
        email: "buyer@example.ru".into(),
        first_name: "Иван".into(),
        last_name: "Петров".into(),
        phone: Some("+79991234567".into()),
        city: Some("Москва".into()),
        postal_code: Some("101000".into()),
        address: Some("ул. Тверская, 1".into()),
    }
}
