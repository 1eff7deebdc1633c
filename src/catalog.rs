use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

/// One sellable product. The catalog is static reference data compiled into
/// the binary: it prices nothing by itself (checkout trusts the submitted
/// line items) but grounds the storefront listing and the assistant prompt.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub price: Decimal,
    pub description: &'static str,
}

static CATALOG: Lazy<Vec<Product>> = Lazy::new(|| {
    vec![
        Product {
            id: "ramo-12-rosas",
            name: "Ramo de 12 rosas",
            price: dec!(1800),
            description: "Twelve long-stem red roses, kraft wrap and ribbon",
        },
        Product {
            id: "ramo-24-rosas",
            name: "Ramo de 24 rosas",
            price: dec!(3200),
            description: "Twenty-four long-stem red roses, premium wrap",
        },
        Product {
            id: "box-primaveral",
            name: "Box primaveral",
            price: dec!(2400),
            description: "Seasonal mixed flowers in a gift box",
        },
        Product {
            id: "box-dulce",
            name: "Box dulce",
            price: dec!(2900),
            description: "Flowers, chocolates and a handwritten card",
        },
        Product {
            id: "planta-suculenta",
            name: "Suculenta en maceta",
            price: dec!(950),
            description: "Potted succulent in a ceramic planter",
        },
        Product {
            id: "ramo-girasoles",
            name: "Ramo de girasoles",
            price: dec!(1500),
            description: "Sunflower bouquet with eucalyptus",
        },
    ]
});

/// Full product list, in display order.
pub fn products() -> &'static [Product] {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_non_empty_with_unique_ids() {
        let products = products();
        assert!(!products.is_empty());

        let mut ids: Vec<_> = products.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), products.len());
    }

    #[test]
    fn prices_are_positive() {
        assert!(products().iter().all(|p| p.price > Decimal::ZERO));
    }
}
