//! AliExpress listing configuration

use crate::traits::{IdSource, ListingConfig, SelectorStrategy};

fn item_link() -> IdSource {
    IdSource::PathSegment {
        attribute: "href".to_string(),
        marker: "/item/".to_string(),
    }
}

/// Default listing configuration for AliExpress wholesale search
///
/// Strategies go from most specific to most generic; the site markup changes
/// often enough that any one of them may stop matching.
pub fn listing_config() -> ListingConfig {
    ListingConfig {
        name: "AliExpress".to_string(),
        search_url_pattern:
            "https://www.aliexpress.com/wholesale?SearchText={query}&SortType=total_tranpro_desc"
                .to_string(),
        strategies: vec![
            SelectorStrategy {
                name: "product-id-attribute".to_string(),
                selector: "a[data-product-id]".to_string(),
                id_source: IdSource::Attribute {
                    name: "data-product-id".to_string(),
                },
            },
            SelectorStrategy {
                name: "item-list-container".to_string(),
                selector: r#"div[data-spm="itemlist"] a[href*="/item/"]"#.to_string(),
                id_source: item_link(),
            },
            SelectorStrategy {
                name: "generic-item-link".to_string(),
                selector: r#"a[href*="/item/"]"#.to_string(),
                id_source: item_link(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategies_are_ordered_specific_to_generic() {
        let config = listing_config();
        let names: Vec<_> = config.strategies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["product-id-attribute", "item-list-container", "generic-item-link"]
        );
    }

    #[test]
    fn test_search_url_sorts_by_orders() {
        let url = listing_config().build_search_url("phone case");
        assert_eq!(
            url,
            "https://www.aliexpress.com/wholesale?SearchText=phone%20case&SortType=total_tranpro_desc"
        );
    }
}
