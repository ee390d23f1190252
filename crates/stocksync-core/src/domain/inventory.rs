//! Inventory records (products, categories, suppliers).
//!
//! ストア上のフィールド名は Web クライアントと共有しているため camelCase です。

use serde::{Deserialize, Serialize};

use super::document::{Document, Fields, to_fields};

/// Collection names.
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const CATEGORIES: &str = "categories";
    pub const SUPPLIERS: &str = "suppliers";
}

/// Product field names used by queries.
pub mod fields {
    pub const SKU: &str = "sku";
    pub const CATEGORY: &str = "category";
    pub const SUPPLIER: &str = "supplier";
    pub const CURRENT_STOCK: &str = "currentStock";
    pub const MIN_STOCK: &str = "minStock";
    pub const UNIT_PRICE: &str = "unitPrice";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: String,
    pub name: String,
    /// Category document id.
    pub category: String,
    /// Supplier document id.
    pub supplier: String,
    pub current_stock: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
}

impl Product {
    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock == 0
    }

    /// `0 < stock <= threshold`
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.current_stock > 0 && self.current_stock <= threshold
    }

    pub fn stock_value(&self) -> f64 {
        self.current_stock as f64 * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Records that live in a named collection.
pub trait Record: Serialize + serde::de::DeserializeOwned {
    const COLLECTION: &'static str;

    fn to_fields(&self) -> Fields {
        to_fields(self)
    }

    /// Decode a document; `None` when the fields do not match the record shape.
    fn from_document(doc: &Document) -> Option<Self> {
        serde_json::from_value(serde_json::Value::Object(doc.fields.clone())).ok()
    }
}

impl Record for Product {
    const COLLECTION: &'static str = collections::PRODUCTS;
}

impl Record for Category {
    const COLLECTION: &'static str = collections::CATEGORIES;
}

impl Record for Supplier {
    const COLLECTION: &'static str = collections::SUPPLIERS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentId;
    use chrono::Utc;
    use rstest::rstest;

    fn product(stock: i64) -> Product {
        Product {
            sku: "TH-001".into(),
            name: "น้ำปลา".into(),
            category: "cat-1".into(),
            supplier: "sup-1".into(),
            current_stock: stock,
            min_stock: 5,
            unit_price: 25.0,
            barcode: None,
        }
    }

    #[rstest]
    #[case(0, false, true)]
    #[case(1, true, false)]
    #[case(10, true, false)]
    #[case(11, false, false)]
    fn stock_levels(#[case] stock: i64, #[case] low: bool, #[case] out: bool) {
        let p = product(stock);
        assert_eq!(p.is_low_stock(10), low);
        assert_eq!(p.is_out_of_stock(), out);
    }

    #[test]
    fn product_fields_use_camel_case() {
        let fields = product(3).to_fields();
        assert_eq!(fields[fields::CURRENT_STOCK], 3);
        assert_eq!(fields[fields::SKU], "TH-001");
        assert!(!fields.contains_key("barcode"));
    }

    #[test]
    fn product_decodes_from_document() {
        let doc = Document::new(DocumentId::new("p1"), Utc::now(), product(7).to_fields());
        let decoded = Product::from_document(&doc).unwrap();
        assert_eq!(decoded.current_stock, 7);
        assert_eq!(decoded.name, "น้ำปลา");
    }
}
